//! SPIKES: no vertex may form a needle-thin protrusion.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{in_order, store_failure, Validator};
use crate::algorithms::geometry::{find_spikes, SPIKE_ANGLE_THRESHOLD_DEGREES};
use crate::db::repository::{FullRepository, GeometryRepository};
use crate::error::{EngineError, EngineResult};
use crate::models::{PolygonUuid, PolygonVerdict, Ring, ValidationType, Verdict};

pub struct SpikesValidator {
    repository: Arc<dyn FullRepository>,
    threshold_degrees: f64,
}

impl SpikesValidator {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self {
            repository,
            threshold_degrees: SPIKE_ANGLE_THRESHOLD_DEGREES,
        }
    }

    fn check(&self, ring: &Ring) -> Verdict {
        let spikes = find_spikes(ring, self.threshold_degrees);
        if spikes.is_empty() {
            return Verdict::pass();
        }
        Verdict::fail(Some(json!({
            "spikes": spikes,
            "spikeCount": spikes.len(),
        })))
    }
}

#[async_trait]
impl Validator for SpikesValidator {
    fn validation_type(&self) -> ValidationType {
        ValidationType::Spikes
    }

    async fn validate_polygon(&self, polygon: PolygonUuid) -> EngineResult<Verdict> {
        let ring = self
            .repository
            .boundary(polygon)
            .await
            .map_err(store_failure(self.validation_type()))?
            .ok_or(EngineError::PolygonNotFound(polygon))?;
        Ok(self.check(&ring))
    }

    async fn validate_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> EngineResult<Vec<PolygonVerdict>> {
        let rings = self
            .repository
            .boundaries(polygons)
            .await
            .map_err(store_failure(self.validation_type()))?;
        Ok(in_order(polygons, &rings)?
            .into_iter()
            .map(|(p, ring)| PolygonVerdict::new(p, self.check(ring)))
            .collect())
    }
}
