//! Validation checks and the registry that resolves them.
//!
//! Every check implements [`Validator`]. Checks that can answer for many
//! polygons in one store round trip override
//! [`Validator::validate_polygons`]; the override must produce exactly the
//! verdicts the per-polygon method would.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::db::repository::RepositoryError;
use crate::error::{EngineError, EngineResult};
use crate::models::{PolygonUuid, PolygonVerdict, ValidationType, Verdict};

pub mod data_completeness;
pub mod estimated_area;
pub mod plant_start_date;
pub mod polygon_size;
pub mod registry;
pub mod self_intersection;
pub mod spikes;

pub use data_completeness::DataCompletenessValidator;
pub use estimated_area::EstimatedAreaValidator;
pub use plant_start_date::PlantStartDateValidator;
pub use polygon_size::PolygonSizeValidator;
pub use registry::{parse_validation_types, CriteriaRegistry};
pub use self_intersection::SelfIntersectionValidator;
pub use spikes::SpikesValidator;

/// One validation check.
///
/// Implementations only read from the stores; writing results is the
/// validation service's job.
#[async_trait]
pub trait Validator: Send + Sync {
    fn validation_type(&self) -> ValidationType;

    /// Run the check against one polygon.
    ///
    /// Fails with [`EngineError::PolygonNotFound`] when the polygon has no
    /// underlying data, and [`EngineError::ValidatorExecutionFailure`] when a
    /// store could not be read.
    async fn validate_polygon(&self, polygon: PolygonUuid) -> EngineResult<Verdict>;

    /// Run the check against many polygons, returning verdicts in input order.
    async fn validate_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> EngineResult<Vec<PolygonVerdict>> {
        let mut verdicts = Vec::with_capacity(polygons.len());
        for &polygon in polygons {
            let verdict = self.validate_polygon(polygon).await?;
            verdicts.push(PolygonVerdict::new(polygon, verdict));
        }
        Ok(verdicts)
    }
}

/// Map a store error raised inside a validator to an execution failure.
pub(crate) fn store_failure(validation_type: ValidationType) -> impl Fn(RepositoryError) -> EngineError {
    move |err| EngineError::validator_failure(validation_type, err)
}

/// Look up every requested polygon in a batch answer, failing on the first missing one.
pub(crate) fn in_order<'a, T>(
    polygons: &[PolygonUuid],
    found: &'a HashMap<PolygonUuid, T>,
) -> EngineResult<Vec<(PolygonUuid, &'a T)>> {
    polygons
        .iter()
        .map(|p| {
            found
                .get(p)
                .map(|v| (*p, v))
                .ok_or(EngineError::PolygonNotFound(*p))
        })
        .collect()
}
