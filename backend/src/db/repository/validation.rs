//! Result store: current verdict per (polygon, criteria) plus history.

use async_trait::async_trait;
use serde_json::Value;

use super::error::RepositoryResult;
use crate::models::{CriteriaId, CurrentResult, HistoricResult, PolygonUuid};

/// Repository trait for validation results.
///
/// Implementations keep at most one [`CurrentResult`] per (polygon, criteria)
/// pair. Overwriting a current result first archives it as a
/// [`HistoricResult`]; both steps happen atomically per pair so readers never
/// observe the prior value missing from both tables or present in both as
/// current.
#[async_trait]
pub trait ValidationRepository: Send + Sync {
    /// Check that the backing store is reachable.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Insert or replace the current result for a pair, archiving any previous one.
    ///
    /// # Returns
    /// * `Ok(CurrentResult)` - The row as stored, with its fresh timestamp
    /// * `Err(RepositoryError)` - Nothing was written
    async fn write_result(
        &self,
        polygon: PolygonUuid,
        criteria: CriteriaId,
        valid: bool,
        extra_info: Option<Value>,
    ) -> RepositoryResult<CurrentResult>;

    /// Current results for one polygon, newest first.
    async fn current_for_polygon(&self, polygon: PolygonUuid)
        -> RepositoryResult<Vec<CurrentResult>>;

    /// Current results for a polygon set, optionally restricted to one criteria.
    async fn current_for_polygons(
        &self,
        polygons: &[PolygonUuid],
        criteria: Option<CriteriaId>,
    ) -> RepositoryResult<Vec<CurrentResult>>;

    /// Archived results for one polygon, most recently archived first.
    async fn history_for_polygon(
        &self,
        polygon: PolygonUuid,
        criteria: Option<CriteriaId>,
    ) -> RepositoryResult<Vec<HistoricResult>>;
}
