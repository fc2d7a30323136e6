//! DATA_COMPLETENESS: the descriptive attributes field teams must fill in.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{in_order, store_failure, Validator};
use crate::db::repository::{FullRepository, SiteRepository};
use crate::error::{EngineError, EngineResult};
use crate::models::{PolygonAttributes, PolygonUuid, PolygonVerdict, ValidationType, Verdict};

pub struct DataCompletenessValidator {
    repository: Arc<dyn FullRepository>,
}

impl DataCompletenessValidator {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self { repository }
    }
}

fn text_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Required attributes paired with their human-readable labels, in report order.
fn missing_fields(attributes: &PolygonAttributes) -> Vec<Value> {
    let checks = [
        ("poly_name", "Polygon name", text_present(&attributes.poly_name)),
        ("practice", "Restoration practice", text_present(&attributes.practice)),
        ("target_sys", "Target land use system", text_present(&attributes.target_sys)),
        ("distr", "Tree distribution", text_present(&attributes.distr)),
        ("num_trees", "Number of trees", attributes.num_trees.is_some()),
        ("plantstart", "Plant start date", attributes.plantstart.is_some()),
    ];

    checks
        .into_iter()
        .filter(|(_, _, present)| !present)
        .map(|(field, label, _)| {
            json!({
                "field": field,
                "error": format!("{} is required", label),
                "exists": false,
            })
        })
        .collect()
}

fn verdict(attributes: &PolygonAttributes) -> Verdict {
    let missing = missing_fields(attributes);
    if missing.is_empty() {
        Verdict::pass()
    } else {
        Verdict::fail(Some(Value::Array(missing)))
    }
}

#[async_trait]
impl Validator for DataCompletenessValidator {
    fn validation_type(&self) -> ValidationType {
        ValidationType::DataCompleteness
    }

    async fn validate_polygon(&self, polygon: PolygonUuid) -> EngineResult<Verdict> {
        let details = self
            .repository
            .polygon_details(&[polygon])
            .await
            .map_err(store_failure(self.validation_type()))?;
        let d = details
            .get(&polygon)
            .ok_or(EngineError::PolygonNotFound(polygon))?;
        Ok(verdict(&d.attributes))
    }

    async fn validate_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> EngineResult<Vec<PolygonVerdict>> {
        let details = self
            .repository
            .polygon_details(polygons)
            .await
            .map_err(store_failure(self.validation_type()))?;
        Ok(in_order(polygons, &details)?
            .into_iter()
            .map(|(p, d)| PolygonVerdict::new(p, verdict(&d.attributes)))
            .collect())
    }
}
