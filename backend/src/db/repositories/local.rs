//! In-memory local repository implementation.
//!
//! Implements every repository trait over plain maps guarded by a single
//! `parking_lot::RwLock`. Used for unit tests, integration tests and local
//! development; the seeding helpers stand in for the upstream CRUD services
//! that own projects, sites and polygons.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::next_write_timestamp;
use crate::algorithms::geometry;
use crate::db::repository::*;
use crate::models::{
    CriteriaId, CurrentResult, HistoricResult, JobId, JobRecord, JobStatus, PolygonDetails,
    PolygonRecord, PolygonUuid, ProjectRecord, ProjectUuid, Ring, SiteRecord, SiteUuid,
};

/// In-memory local repository.
///
/// # Example
/// ```
/// use polygon_validation::db::repositories::LocalRepository;
/// use polygon_validation::db::repository::ValidationRepository;
/// use polygon_validation::models::{CriteriaId, PolygonUuid};
///
/// # tokio_test_block(async {
/// let repo = LocalRepository::new();
/// let polygon = PolygonUuid::new(uuid::Uuid::new_v4());
/// repo.write_result(polygon, CriteriaId::new(4), true, None).await.unwrap();
/// repo.write_result(polygon, CriteriaId::new(4), false, None).await.unwrap();
/// assert_eq!(repo.history_for_polygon(polygon, None).await.unwrap().len(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Runtime::new().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    projects: HashMap<ProjectUuid, ProjectRecord>,
    sites: HashMap<SiteUuid, SiteRecord>,
    polygons: HashMap<PolygonUuid, PolygonRecord>,
    // Upload order, used for stable site listings
    polygon_order: Vec<PolygonUuid>,

    current: HashMap<(PolygonUuid, CriteriaId), CurrentResult>,
    historic: Vec<HistoricResult>,
    // Latest result timestamp handed out; writes are totally ordered
    last_write: Option<DateTime<Utc>>,

    jobs: HashMap<JobId, JobRecord>,
    next_job_id: i64,

    failing_geometry: HashSet<PolygonUuid>,
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            projects: HashMap::new(),
            sites: HashMap::new(),
            polygons: HashMap::new(),
            polygon_order: Vec::new(),
            current: HashMap::new(),
            historic: Vec::new(),
            last_write: None,
            jobs: HashMap::new(),
            next_job_id: 1,
            failing_geometry: HashSet::new(),
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn area_of(polygon: &PolygonRecord) -> f64 {
        polygon
            .calc_area
            .unwrap_or_else(|| geometry::area_hectares(&polygon.boundary))
    }

    fn check_geometry(&self, polygons: &[PolygonUuid], operation: &str) -> RepositoryResult<()> {
        if let Some(bad) = polygons.iter().find(|p| self.failing_geometry.contains(*p)) {
            return Err(RepositoryError::query_with_context(
                "Geometry engine unavailable",
                ErrorContext::new(operation)
                    .with_entity("polygon")
                    .with_entity_id(bad),
            ));
        }
        Ok(())
    }

    fn sum_active_area<F>(&self, mut in_scope: F) -> f64
    where
        F: FnMut(&PolygonRecord) -> bool,
    {
        self.polygons
            .values()
            .filter(|p| p.is_active && in_scope(p))
            .map(Self::area_of)
            .sum()
    }

    /// Mutable access to a job that has not reached a terminal state.
    fn open_job(&mut self, id: JobId, operation: &str) -> RepositoryResult<&mut JobRecord> {
        let context = ErrorContext::new(operation).with_entity("job").with_entity_id(id);
        let job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found_with_context("Job not found", context.clone()))?;
        if job.status.is_terminal() {
            return Err(RepositoryError::invalid_state(
                format!("Job is already {}", job.status.as_str()),
                context,
            ));
        }
        Ok(job)
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    pub fn insert_project(&self, project: ProjectRecord) {
        self.data.write().projects.insert(project.uuid, project);
    }

    pub fn insert_site(&self, site: SiteRecord) {
        self.data.write().sites.insert(site.uuid, site);
    }

    /// Add or replace a polygon. Replacing keeps its original upload position.
    pub fn insert_polygon(&self, polygon: PolygonRecord) {
        let mut data = self.data.write();
        if !data.polygons.contains_key(&polygon.uuid) {
            data.polygon_order.push(polygon.uuid);
        }
        data.polygons.insert(polygon.uuid, polygon);
    }

    /// Replace a polygon's boundary, leaving its results untouched.
    pub fn update_boundary(&self, polygon: PolygonUuid, boundary: Ring) -> RepositoryResult<()> {
        let mut data = self.data.write();
        let record = data.polygons.get_mut(&polygon).ok_or_else(|| {
            RepositoryError::not_found(format!("Polygon {} not found", polygon))
        })?;
        record.boundary = boundary;
        Ok(())
    }

    pub fn set_polygon_active(&self, polygon: PolygonUuid, active: bool) {
        if let Some(record) = self.data.write().polygons.get_mut(&polygon) {
            record.is_active = active;
        }
    }

    /// Make every geometry query touching `polygon` fail, for failure-path tests.
    pub fn inject_geometry_failure(&self, polygon: PolygonUuid) {
        self.data.write().failing_geometry.insert(polygon);
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    pub fn current_count(&self) -> usize {
        self.data.read().current.len()
    }

    pub fn historic_count(&self) -> usize {
        self.data.read().historic.len()
    }

    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("Database is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

// ==================== Geometry Repository ====================

#[async_trait]
impl GeometryRepository for LocalRepository {
    async fn existing_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<Vec<PolygonUuid>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(polygons
            .iter()
            .filter(|p| data.polygons.contains_key(*p))
            .copied()
            .collect())
    }

    async fn boundary(&self, polygon: PolygonUuid) -> RepositoryResult<Option<Ring>> {
        Ok(self.boundaries(&[polygon]).await?.remove(&polygon))
    }

    async fn boundaries(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, Ring>> {
        self.check_health()?;
        let data = self.data.read();
        data.check_geometry(polygons, "boundaries")?;
        Ok(polygons
            .iter()
            .filter_map(|p| data.polygons.get(p).map(|r| (*p, r.boundary.clone())))
            .collect())
    }

    async fn is_simple(&self, polygon: PolygonUuid) -> RepositoryResult<Option<bool>> {
        Ok(self.simplicity(&[polygon]).await?.remove(&polygon))
    }

    async fn simplicity(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, bool>> {
        self.check_health()?;
        let data = self.data.read();
        data.check_geometry(polygons, "simplicity")?;
        Ok(polygons
            .iter()
            .filter_map(|p| {
                data.polygons
                    .get(p)
                    .map(|r| (*p, geometry::is_simple(&r.boundary)))
            })
            .collect())
    }

    async fn area_hectares(&self, polygon: PolygonUuid) -> RepositoryResult<Option<f64>> {
        Ok(self.areas_hectares(&[polygon]).await?.remove(&polygon))
    }

    async fn areas_hectares(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, f64>> {
        self.check_health()?;
        let data = self.data.read();
        data.check_geometry(polygons, "areas_hectares")?;
        Ok(polygons
            .iter()
            .filter_map(|p| data.polygons.get(p).map(|r| (*p, LocalData::area_of(r))))
            .collect())
    }
}

// ==================== Site Repository ====================

#[async_trait]
impl SiteRepository for LocalRepository {
    async fn site_exists(&self, site: SiteUuid) -> RepositoryResult<bool> {
        self.check_health()?;
        Ok(self.data.read().sites.contains_key(&site))
    }

    async fn site(&self, site: SiteUuid) -> RepositoryResult<Option<SiteRecord>> {
        self.check_health()?;
        Ok(self.data.read().sites.get(&site).cloned())
    }

    async fn project(&self, project: ProjectUuid) -> RepositoryResult<Option<ProjectRecord>> {
        self.check_health()?;
        Ok(self.data.read().projects.get(&project).cloned())
    }

    async fn active_polygon_ids(&self, site: SiteUuid) -> RepositoryResult<Vec<PolygonUuid>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .polygon_order
            .iter()
            .filter(|id| {
                data.polygons
                    .get(*id)
                    .map(|p| p.is_active && p.site_uuid == site)
                    .unwrap_or(false)
            })
            .copied()
            .collect())
    }

    async fn polygon_details(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, PolygonDetails>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(polygons
            .iter()
            .filter_map(|p| {
                data.polygons.get(p).map(|r| {
                    (
                        *p,
                        PolygonDetails {
                            uuid: r.uuid,
                            site_uuid: r.site_uuid,
                            attributes: r.attributes.clone(),
                        },
                    )
                })
            })
            .collect())
    }

    async fn sum_active_area_for_site(&self, site: SiteUuid) -> RepositoryResult<f64> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data.sum_active_area(|p| p.site_uuid == site))
    }

    async fn sum_active_area_for_project(&self, project: ProjectUuid) -> RepositoryResult<f64> {
        self.check_health()?;
        let data = self.data.read();
        let sites: HashSet<SiteUuid> = data
            .sites
            .values()
            .filter(|s| s.project_uuid == project)
            .map(|s| s.uuid)
            .collect();
        Ok(data.sum_active_area(|p| sites.contains(&p.site_uuid)))
    }
}

// ==================== Validation Repository ====================

fn newest_first(a: &CurrentResult, b: &CurrentResult) -> std::cmp::Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.criteria_id.cmp(&b.criteria_id))
}

#[async_trait]
impl ValidationRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn write_result(
        &self,
        polygon: PolygonUuid,
        criteria: CriteriaId,
        valid: bool,
        extra_info: Option<Value>,
    ) -> RepositoryResult<CurrentResult> {
        self.check_health()?;

        // Archive and replace under one write lock so the pair is never observed half-written.
        let mut data = self.data.write();
        let key = (polygon, criteria);
        let previous = data.current.get(&key).cloned();
        let created_at = next_write_timestamp(data.last_write);
        data.last_write = Some(created_at);

        if let Some(prev) = previous {
            let archived = HistoricResult::archive(&prev, created_at);
            data.historic.push(archived);
        }

        let result = CurrentResult {
            polygon_uuid: polygon,
            criteria_id: criteria,
            valid,
            created_at,
            extra_info,
        };
        data.current.insert(key, result.clone());
        Ok(result)
    }

    async fn current_for_polygon(
        &self,
        polygon: PolygonUuid,
    ) -> RepositoryResult<Vec<CurrentResult>> {
        self.check_health()?;
        let data = self.data.read();
        let mut results: Vec<CurrentResult> = data
            .current
            .values()
            .filter(|r| r.polygon_uuid == polygon)
            .cloned()
            .collect();
        results.sort_by(newest_first);
        Ok(results)
    }

    async fn current_for_polygons(
        &self,
        polygons: &[PolygonUuid],
        criteria: Option<CriteriaId>,
    ) -> RepositoryResult<Vec<CurrentResult>> {
        self.check_health()?;
        let wanted: HashSet<&PolygonUuid> = polygons.iter().collect();
        let data = self.data.read();
        let mut results: Vec<CurrentResult> = data
            .current
            .values()
            .filter(|r| wanted.contains(&r.polygon_uuid))
            .filter(|r| criteria.map_or(true, |c| r.criteria_id == c))
            .cloned()
            .collect();
        results.sort_by(newest_first);
        Ok(results)
    }

    async fn history_for_polygon(
        &self,
        polygon: PolygonUuid,
        criteria: Option<CriteriaId>,
    ) -> RepositoryResult<Vec<HistoricResult>> {
        self.check_health()?;
        let data = self.data.read();
        // Appended in archive order; reverse for newest first
        Ok(data
            .historic
            .iter()
            .rev()
            .filter(|h| h.polygon_uuid == polygon)
            .filter(|h| criteria.map_or(true, |c| h.criteria_id == c))
            .cloned()
            .collect())
    }
}

// ==================== Job Repository ====================

#[async_trait]
impl JobRepository for LocalRepository {
    async fn create_job(&self, name: &str) -> RepositoryResult<JobRecord> {
        self.check_health()?;
        let mut data = self.data.write();
        let id = JobId::new(data.next_job_id);
        data.next_job_id += 1;

        let now = Utc::now();
        let job = JobRecord {
            id,
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            status: JobStatus::Pending,
            status_code: None,
            total_content: None,
            processed_content: None,
            progress_message: None,
            payload: None,
            created_at: now,
            updated_at: now,
        };
        data.jobs.insert(id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> RepositoryResult<Option<JobRecord>> {
        self.check_health()?;
        Ok(self.data.read().jobs.get(&id).cloned())
    }

    async fn get_job_by_uuid(&self, uuid: Uuid) -> RepositoryResult<Option<JobRecord>> {
        self.check_health()?;
        Ok(self
            .data
            .read()
            .jobs
            .values()
            .find(|j| j.uuid == uuid)
            .cloned())
    }

    async fn start_job(
        &self,
        id: JobId,
        total: i64,
        message: &str,
    ) -> RepositoryResult<JobRecord> {
        self.check_health()?;
        let mut data = self.data.write();
        let job = data.open_job(id, "start_job")?;
        if job.status != JobStatus::Pending {
            return Err(RepositoryError::invalid_state(
                "Job already started",
                ErrorContext::new("start_job").with_entity("job").with_entity_id(id),
            ));
        }
        job.status = JobStatus::Running;
        job.total_content = Some(total);
        job.processed_content = Some(0);
        job.progress_message = Some(message.to_string());
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn record_progress(
        &self,
        id: JobId,
        processed: i64,
        message: &str,
    ) -> RepositoryResult<JobRecord> {
        self.check_health()?;
        let mut data = self.data.write();
        let job = data.open_job(id, "record_progress")?;
        let context = || {
            ErrorContext::new("record_progress")
                .with_entity("job")
                .with_entity_id(id)
        };
        if job.status != JobStatus::Running {
            return Err(RepositoryError::invalid_state(
                "Job is not running",
                context(),
            ));
        }
        if processed < job.processed_content.unwrap_or(0) {
            return Err(RepositoryError::invalid_state(
                format!(
                    "Progress cannot move backwards ({} < {})",
                    processed,
                    job.processed_content.unwrap_or(0)
                ),
                context(),
            ));
        }
        job.processed_content = Some(processed);
        job.progress_message = Some(message.to_string());
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn complete_job(&self, id: JobId, payload: Value) -> RepositoryResult<JobRecord> {
        self.check_health()?;
        let mut data = self.data.write();
        let job = data.open_job(id, "complete_job")?;
        if job.status != JobStatus::Running {
            return Err(RepositoryError::invalid_state(
                "Only running jobs can succeed",
                ErrorContext::new("complete_job").with_entity("job").with_entity_id(id),
            ));
        }
        job.status = JobStatus::Succeeded;
        job.status_code = Some(200);
        job.payload = Some(payload);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn fail_job(
        &self,
        id: JobId,
        status_code: i32,
        payload: Value,
    ) -> RepositoryResult<JobRecord> {
        self.check_health()?;
        let mut data = self.data.write();
        let job = data.open_job(id, "fail_job")?;
        job.status = JobStatus::Failed;
        job.status_code = Some(status_code);
        job.payload = Some(payload);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PolygonAttributes;
    use serde_json::json;

    fn seed_polygon(repo: &LocalRepository, site: SiteUuid, calc_area: Option<f64>) -> PolygonUuid {
        let uuid = PolygonUuid::new(Uuid::new_v4());
        repo.insert_polygon(PolygonRecord {
            uuid,
            site_uuid: site,
            attributes: PolygonAttributes::default(),
            calc_area,
            is_active: true,
            boundary: Ring::from_pairs(&[(0.0, 0.0), (0.01, 0.0), (0.01, 0.01), (0.0, 0.01)]),
        });
        uuid
    }

    #[tokio::test]
    async fn test_first_write_creates_no_history() {
        let repo = LocalRepository::new();
        let polygon = PolygonUuid::new(Uuid::new_v4());
        repo.write_result(polygon, CriteriaId::new(4), true, None)
            .await
            .unwrap();
        assert_eq!(repo.current_count(), 1);
        assert_eq!(repo.historic_count(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_archives_previous_values() {
        let repo = LocalRepository::new();
        let polygon = PolygonUuid::new(Uuid::new_v4());
        let first = repo
            .write_result(polygon, CriteriaId::new(8), false, Some(json!({"spikeCount": 1})))
            .await
            .unwrap();
        let second = repo
            .write_result(polygon, CriteriaId::new(8), true, None)
            .await
            .unwrap();

        assert!(second.created_at > first.created_at);
        let history = repo.history_for_polygon(polygon, None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].valid);
        assert_eq!(history[0].created_at, first.created_at);
        assert_eq!(history[0].extra_info, Some(json!({"spikeCount": 1})));
    }

    #[tokio::test]
    async fn test_unhealthy_repository_rejects_writes() {
        let repo = LocalRepository::new();
        repo.set_healthy(false);
        let err = repo
            .write_result(PolygonUuid::new(Uuid::new_v4()), CriteriaId::new(4), true, None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(repo.current_count(), 0);
    }

    #[tokio::test]
    async fn test_recorded_area_wins_over_computed() {
        let repo = LocalRepository::new();
        let site = SiteUuid::new(Uuid::new_v4());
        let recorded = seed_polygon(&repo, site, Some(42.0));
        let computed = seed_polygon(&repo, site, None);

        let areas = repo.areas_hectares(&[recorded, computed]).await.unwrap();
        assert_eq!(areas[&recorded], 42.0);
        assert!((areas[&computed] - 123.92).abs() < 0.5);
    }

    #[tokio::test]
    async fn test_inactive_polygons_are_excluded_from_site() {
        let repo = LocalRepository::new();
        let site = SiteUuid::new(Uuid::new_v4());
        let a = seed_polygon(&repo, site, Some(10.0));
        let b = seed_polygon(&repo, site, Some(20.0));
        repo.set_polygon_active(a, false);

        assert_eq!(repo.active_polygon_ids(site).await.unwrap(), vec![b]);
        assert_eq!(repo.sum_active_area_for_site(site).await.unwrap(), 20.0);
    }

    #[tokio::test]
    async fn test_existence_keeps_input_order() {
        let repo = LocalRepository::new();
        let site = SiteUuid::new(Uuid::new_v4());
        let a = seed_polygon(&repo, site, None);
        let b = seed_polygon(&repo, site, None);
        let missing = PolygonUuid::new(Uuid::new_v4());

        assert_eq!(
            repo.existing_polygons(&[b, missing, a]).await.unwrap(),
            vec![b, a]
        );
        assert!(repo.polygon_exists(a).await.unwrap());
        assert!(!repo.polygon_exists(missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_owner_lookups_walk_the_hierarchy() {
        let repo = LocalRepository::new();
        let project = ProjectUuid::new(Uuid::new_v4());
        let site = SiteUuid::new(Uuid::new_v4());
        repo.insert_project(ProjectRecord {
            uuid: project,
            name: "Restoration".to_string(),
            area_goal_hectares: Some(500.0),
        });
        repo.insert_site(SiteRecord {
            uuid: site,
            name: "North ridge".to_string(),
            project_uuid: project,
            start_date: None,
            area_goal_hectares: None,
        });
        let polygon = seed_polygon(&repo, site, None);

        let owner = repo.site_of(polygon).await.unwrap().unwrap();
        assert_eq!(owner.uuid, site);
        let parent = repo.project_of(site).await.unwrap().unwrap();
        assert_eq!(parent.uuid, project);

        let orphan = PolygonUuid::new(Uuid::new_v4());
        assert!(repo.site_of(orphan).await.unwrap().is_none());
        assert!(repo
            .project_of(SiteUuid::new(Uuid::new_v4()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_job_state_machine() {
        let repo = LocalRepository::new();
        let job = repo.create_job("site_validation").await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        // Progress before start is rejected
        assert!(repo.record_progress(job.id, 1, "1").await.is_err());

        repo.start_job(job.id, 10, "0 out of 10 (0%)").await.unwrap();
        repo.record_progress(job.id, 5, "5 out of 10 (50%)").await.unwrap();
        assert!(repo.record_progress(job.id, 4, "4").await.is_err());

        let done = repo.complete_job(job.id, json!({})).await.unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.status_code, Some(200));

        let err = repo.fail_job(job.id, 500, json!({})).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_pending_job_can_fail_directly() {
        let repo = LocalRepository::new();
        let job = repo.create_job("site_validation").await.unwrap();
        let failed = repo
            .fail_job(job.id, 404, json!({"error": "no polygons"}))
            .await
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.total_content, None);

        let by_uuid = repo.get_job_by_uuid(job.uuid).await.unwrap().unwrap();
        assert_eq!(by_uuid.id, job.id);
    }
}
