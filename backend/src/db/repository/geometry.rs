//! Geometry store access.
//!
//! Polygon boundaries live outside the validation engine; this trait exposes
//! the read-only questions the geometric checks ask of them. Batch variants
//! return maps keyed by polygon id and simply omit ids that do not exist, so
//! callers decide how to report a missing polygon.

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{PolygonUuid, Ring};

#[async_trait]
pub trait GeometryRepository: Send + Sync {
    /// Subset of `polygons` that exist in the store, in input order.
    async fn existing_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<Vec<PolygonUuid>>;

    async fn polygon_exists(&self, polygon: PolygonUuid) -> RepositoryResult<bool> {
        Ok(!self.existing_polygons(&[polygon]).await?.is_empty())
    }

    async fn boundary(&self, polygon: PolygonUuid) -> RepositoryResult<Option<Ring>>;

    async fn boundaries(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, Ring>>;

    /// Whether the boundary is a simple ring, `None` for unknown polygons.
    async fn is_simple(&self, polygon: PolygonUuid) -> RepositoryResult<Option<bool>>;

    async fn simplicity(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, bool>>;

    /// Polygon area in hectares.
    ///
    /// The area recorded at upload time wins over the computed one.
    async fn area_hectares(&self, polygon: PolygonUuid) -> RepositoryResult<Option<f64>>;

    async fn areas_hectares(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, f64>>;
}
