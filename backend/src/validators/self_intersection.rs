//! SELF_INTERSECTION: the boundary must be a simple ring.

use std::sync::Arc;

use async_trait::async_trait;

use super::{in_order, store_failure, Validator};
use crate::db::repository::{FullRepository, GeometryRepository};
use crate::error::{EngineError, EngineResult};
use crate::models::{PolygonUuid, PolygonVerdict, ValidationType, Verdict};

pub struct SelfIntersectionValidator {
    repository: Arc<dyn FullRepository>,
}

impl SelfIntersectionValidator {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self { repository }
    }
}

fn verdict(is_simple: bool) -> Verdict {
    if is_simple {
        Verdict::pass()
    } else {
        Verdict::fail(None)
    }
}

#[async_trait]
impl Validator for SelfIntersectionValidator {
    fn validation_type(&self) -> ValidationType {
        ValidationType::SelfIntersection
    }

    async fn validate_polygon(&self, polygon: PolygonUuid) -> EngineResult<Verdict> {
        let simple = self
            .repository
            .is_simple(polygon)
            .await
            .map_err(store_failure(self.validation_type()))?
            .ok_or(EngineError::PolygonNotFound(polygon))?;
        Ok(verdict(simple))
    }

    async fn validate_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> EngineResult<Vec<PolygonVerdict>> {
        let simplicity = self
            .repository
            .simplicity(polygons)
            .await
            .map_err(store_failure(self.validation_type()))?;
        Ok(in_order(polygons, &simplicity)?
            .into_iter()
            .map(|(p, simple)| PolygonVerdict::new(p, verdict(*simple)))
            .collect())
    }
}
