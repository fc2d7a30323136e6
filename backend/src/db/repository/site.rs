//! Site and project metadata consumed by the metadata and area checks.

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::models::{
    PolygonDetails, PolygonUuid, ProjectRecord, ProjectUuid, SiteRecord, SiteUuid,
};

/// Read-only view of the site/project hierarchy above polygons.
#[async_trait]
pub trait SiteRepository: Send + Sync {
    async fn site_exists(&self, site: SiteUuid) -> RepositoryResult<bool>;

    async fn site(&self, site: SiteUuid) -> RepositoryResult<Option<SiteRecord>>;

    async fn project(&self, project: ProjectUuid) -> RepositoryResult<Option<ProjectRecord>>;

    /// Active polygons of a site in a stable order (upload order).
    async fn active_polygon_ids(&self, site: SiteUuid) -> RepositoryResult<Vec<PolygonUuid>>;

    /// Descriptive attributes and owning site, keyed by polygon. Unknown ids are omitted.
    async fn polygon_details(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, PolygonDetails>>;

    /// Sum of the areas (hectares) of the site's active polygons.
    async fn sum_active_area_for_site(&self, site: SiteUuid) -> RepositoryResult<f64>;

    /// Sum of the areas (hectares) of active polygons across every site of the project.
    async fn sum_active_area_for_project(&self, project: ProjectUuid) -> RepositoryResult<f64>;

    /// Owning site of a polygon.
    async fn site_of(&self, polygon: PolygonUuid) -> RepositoryResult<Option<SiteRecord>> {
        let details = self.polygon_details(&[polygon]).await?;
        match details.get(&polygon) {
            Some(d) => self.site(d.site_uuid).await,
            None => Ok(None),
        }
    }

    /// Owning project of a site.
    async fn project_of(&self, site: SiteUuid) -> RepositoryResult<Option<ProjectRecord>> {
        match self.site(site).await? {
            Some(s) => self.project(s.project_uuid).await,
            None => Ok(None),
        }
    }
}
