//! POLYGON_SIZE: area must not exceed the configured maximum.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{in_order, store_failure, Validator};
use crate::db::repository::{FullRepository, GeometryRepository};
use crate::error::{EngineError, EngineResult};
use crate::models::{PolygonUuid, PolygonVerdict, ValidationType, Verdict};

pub const MAX_POLYGON_AREA_HECTARES: f64 = 1000.0;

pub struct PolygonSizeValidator {
    repository: Arc<dyn FullRepository>,
}

impl PolygonSizeValidator {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self { repository }
    }
}

// Area and limit are reported whether or not the check passes.
fn verdict(area_hectares: f64) -> Verdict {
    Verdict {
        valid: area_hectares <= MAX_POLYGON_AREA_HECTARES,
        extra_info: Some(json!({
            "areaHectares": area_hectares,
            "maxAllowedHectares": MAX_POLYGON_AREA_HECTARES,
        })),
    }
}

#[async_trait]
impl Validator for PolygonSizeValidator {
    fn validation_type(&self) -> ValidationType {
        ValidationType::PolygonSize
    }

    async fn validate_polygon(&self, polygon: PolygonUuid) -> EngineResult<Verdict> {
        let area = self
            .repository
            .area_hectares(polygon)
            .await
            .map_err(store_failure(self.validation_type()))?
            .ok_or(EngineError::PolygonNotFound(polygon))?;
        Ok(verdict(area))
    }

    async fn validate_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> EngineResult<Vec<PolygonVerdict>> {
        let areas = self
            .repository
            .areas_hectares(polygons)
            .await
            .map_err(store_failure(self.validation_type()))?;
        Ok(in_order(polygons, &areas)?
            .into_iter()
            .map(|(p, area)| PolygonVerdict::new(p, verdict(*area)))
            .collect())
    }
}
