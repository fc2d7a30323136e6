//! Postgres/PostGIS repository implementation using Diesel.
//!
//! Tabular data (sites, projects, polygon attributes, results, jobs) goes
//! through Diesel's query builder. Geometry questions are answered by PostGIS
//! through raw `sql_query` calls against the `geom` column.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Automatic migration execution
//! - Per-pair result upsert inside a single transaction
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task;
use uuid::Uuid;

use super::next_write_timestamp;
use crate::db::repository::{
    ErrorContext, GeometryRepository, JobRepository, RepositoryError, RepositoryResult,
    SiteRepository, ValidationRepository,
};
use crate::models::{
    Coordinate, CriteriaId, CurrentResult, HistoricResult, JobId, JobRecord, JobStatus,
    PolygonDetails, PolygonUuid, ProjectRecord, ProjectUuid, Ring, SiteRecord, SiteUuid,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// SQL for a polygon's area in hectares; the value recorded at upload wins over PostGIS.
fn area_hectares_sql(table_prefix: &str) -> String {
    format!(
        "COALESCE({p}calc_area, ST_Area({p}geom::geography) / 10000.0)",
        p = table_prefix
    )
}

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connection_timeout_sec: u64,
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Create configuration from environment variables (see module docs).
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let defaults = Self::default();
        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Diesel-backed repository for Postgres with PostGIS.
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self { pool, config })
    }

    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;
        Ok(())
    }

    /// Execute a database operation on the blocking pool, retrying transient failures
    /// with exponential backoff.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1)),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        return Err(err);
                    }
                };

                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        log::warn!("Retrying database operation after error: {}", e);
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }
}

fn raw_ids(polygons: &[PolygonUuid]) -> Vec<Uuid> {
    polygons.iter().map(|p| p.value()).collect()
}

#[derive(Deserialize)]
struct GeoJsonLineString {
    coordinates: Vec<Coordinate>,
}

fn parse_ring(uuid: Uuid, geojson: &str) -> RepositoryResult<Ring> {
    let line: GeoJsonLineString = serde_json::from_str(geojson).map_err(|e| {
        RepositoryError::internal_with_context(
            format!("Invalid boundary GeoJSON: {}", e),
            ErrorContext::new("boundaries")
                .with_entity("polygon")
                .with_entity_id(uuid),
        )
    })?;
    Ok(Ring::new(line.coordinates))
}

/// Lock a job row and reject it if it already reached a terminal state.
fn lock_open_job(conn: &mut PgConnection, id: JobId, operation: &str) -> RepositoryResult<JobRow> {
    let context = ErrorContext::new(operation).with_entity("job").with_entity_id(id);
    let row = delayed_jobs::table
        .find(id.value())
        .for_update()
        .select(JobRow::as_select())
        .first::<JobRow>(conn)
        .optional()?
        .ok_or_else(|| RepositoryError::not_found_with_context("Job not found", context.clone()))?;

    let status: JobStatus = row.status.parse().map_err(|e: String| RepositoryError::internal(e))?;
    if status.is_terminal() {
        return Err(RepositoryError::invalid_state(
            format!("Job is already {}", status.as_str()),
            context,
        ));
    }
    Ok(row)
}

// ==================== Geometry Repository ====================

#[async_trait]
impl GeometryRepository for PostgresRepository {
    async fn existing_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<Vec<PolygonUuid>> {
        let ids = raw_ids(polygons);
        let requested = polygons.to_vec();
        self.with_conn(move |conn| {
            let found: Vec<Uuid> = site_polygons::table
                .filter(site_polygons::uuid.eq_any(ids))
                .select(site_polygons::uuid)
                .load(conn)?;
            Ok(requested
                .into_iter()
                .filter(|p| found.contains(&p.value()))
                .collect())
        })
        .await
    }

    async fn boundary(&self, polygon: PolygonUuid) -> RepositoryResult<Option<Ring>> {
        Ok(self.boundaries(&[polygon]).await?.remove(&polygon))
    }

    async fn boundaries(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, Ring>> {
        let ids = raw_ids(polygons);
        self.with_conn(move |conn| {
            let rows: Vec<BoundaryRow> = sql_query(
                "SELECT uuid, \
                 ST_AsGeoJSON(ST_ExteriorRing(ST_GeometryN(ST_Force2D(geom), 1))) AS ring_geojson \
                 FROM site_polygons WHERE uuid = ANY($1)",
            )
            .bind::<sql_types::Array<sql_types::Uuid>, _>(ids)
            .load(conn)?;

            rows.into_iter()
                .map(|row| Ok((PolygonUuid::new(row.uuid), parse_ring(row.uuid, &row.ring_geojson)?)))
                .collect()
        })
        .await
    }

    async fn is_simple(&self, polygon: PolygonUuid) -> RepositoryResult<Option<bool>> {
        Ok(self.simplicity(&[polygon]).await?.remove(&polygon))
    }

    async fn simplicity(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, bool>> {
        let ids = raw_ids(polygons);
        self.with_conn(move |conn| {
            let rows: Vec<SimplicityRow> = sql_query(
                "SELECT uuid, ST_IsSimple(geom) AS is_simple FROM site_polygons WHERE uuid = ANY($1)",
            )
            .bind::<sql_types::Array<sql_types::Uuid>, _>(ids)
            .load(conn)?;
            Ok(rows
                .into_iter()
                .map(|r| (PolygonUuid::new(r.uuid), r.is_simple))
                .collect())
        })
        .await
    }

    async fn area_hectares(&self, polygon: PolygonUuid) -> RepositoryResult<Option<f64>> {
        Ok(self.areas_hectares(&[polygon]).await?.remove(&polygon))
    }

    async fn areas_hectares(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, f64>> {
        let ids = raw_ids(polygons);
        self.with_conn(move |conn| {
            let rows: Vec<AreaRow> = sql_query(format!(
                "SELECT uuid, {} AS area_hectares FROM site_polygons WHERE uuid = ANY($1)",
                area_hectares_sql("")
            ))
            .bind::<sql_types::Array<sql_types::Uuid>, _>(ids)
            .load(conn)?;
            Ok(rows
                .into_iter()
                .map(|r| (PolygonUuid::new(r.uuid), r.area_hectares))
                .collect())
        })
        .await
    }
}

// ==================== Site Repository ====================

#[async_trait]
impl SiteRepository for PostgresRepository {
    async fn site_exists(&self, site: SiteUuid) -> RepositoryResult<bool> {
        Ok(self.site(site).await?.is_some())
    }

    async fn site(&self, site: SiteUuid) -> RepositoryResult<Option<SiteRecord>> {
        self.with_conn(move |conn| {
            let row = sites::table
                .filter(sites::uuid.eq(site.value()))
                .select(SiteRow::as_select())
                .first::<SiteRow>(conn)
                .optional()?;
            Ok(row.map(SiteRecord::from))
        })
        .await
    }

    async fn project(&self, project: ProjectUuid) -> RepositoryResult<Option<ProjectRecord>> {
        self.with_conn(move |conn| {
            let row = projects::table
                .filter(projects::uuid.eq(project.value()))
                .select(ProjectRow::as_select())
                .first::<ProjectRow>(conn)
                .optional()?;
            Ok(row.map(ProjectRecord::from))
        })
        .await
    }

    async fn active_polygon_ids(&self, site: SiteUuid) -> RepositoryResult<Vec<PolygonUuid>> {
        self.with_conn(move |conn| {
            let ids: Vec<Uuid> = site_polygons::table
                .filter(site_polygons::site_uuid.eq(site.value()))
                .filter(site_polygons::is_active.eq(true))
                .order(site_polygons::id.asc())
                .select(site_polygons::uuid)
                .load(conn)?;
            Ok(ids.into_iter().map(PolygonUuid::new).collect())
        })
        .await
    }

    async fn polygon_details(
        &self,
        polygons: &[PolygonUuid],
    ) -> RepositoryResult<HashMap<PolygonUuid, PolygonDetails>> {
        let ids = raw_ids(polygons);
        self.with_conn(move |conn| {
            let rows: Vec<PolygonRow> = site_polygons::table
                .filter(site_polygons::uuid.eq_any(ids))
                .select(PolygonRow::as_select())
                .load(conn)?;
            Ok(rows
                .into_iter()
                .map(|r| (PolygonUuid::new(r.uuid), PolygonDetails::from(r)))
                .collect())
        })
        .await
    }

    async fn sum_active_area_for_site(&self, site: SiteUuid) -> RepositoryResult<f64> {
        self.with_conn(move |conn| {
            let row: AreaSumRow = sql_query(format!(
                "SELECT COALESCE(SUM({}), 0)::float8 AS total \
                 FROM site_polygons WHERE site_uuid = $1 AND is_active",
                area_hectares_sql("")
            ))
            .bind::<sql_types::Uuid, _>(site.value())
            .get_result(conn)?;
            Ok(row.total)
        })
        .await
    }

    async fn sum_active_area_for_project(&self, project: ProjectUuid) -> RepositoryResult<f64> {
        self.with_conn(move |conn| {
            let row: AreaSumRow = sql_query(format!(
                "SELECT COALESCE(SUM({}), 0)::float8 AS total \
                 FROM site_polygons p JOIN sites s ON s.uuid = p.site_uuid \
                 WHERE s.project_uuid = $1 AND p.is_active",
                area_hectares_sql("p.")
            ))
            .bind::<sql_types::Uuid, _>(project.value())
            .get_result(conn)?;
            Ok(row.total)
        })
        .await
    }
}

// ==================== Validation Repository ====================

#[async_trait]
impl ValidationRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(RepositoryError::from)
        })
        .await
    }

    async fn write_result(
        &self,
        polygon: PolygonUuid,
        criteria: CriteriaId,
        valid: bool,
        extra_info: Option<Value>,
    ) -> RepositoryResult<CurrentResult> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let select_current = || {
                    criteria_site::table
                        .filter(criteria_site::polygon_id.eq(polygon.value()))
                        .filter(criteria_site::criteria_id.eq(criteria.value()))
                        .select(CriteriaRow::as_select())
                        .for_update()
                };

                let mut previous = select_current().first::<CriteriaRow>(tx).optional()?;

                if previous.is_none() {
                    let first = NewCriteriaRow {
                        polygon_id: polygon.value(),
                        criteria_id: criteria.value(),
                        valid,
                        extra_info: extra_info.clone(),
                        created_at: Utc::now(),
                    };
                    let inserted = diesel::insert_into(criteria_site::table)
                        .values(&first)
                        .on_conflict((criteria_site::polygon_id, criteria_site::criteria_id))
                        .do_nothing()
                        .returning(CriteriaRow::as_returning())
                        .get_result::<CriteriaRow>(tx)
                        .optional()?;
                    if let Some(row) = inserted {
                        return Ok(CurrentResult::from(row));
                    }
                    // A concurrent first write won the race; overwrite it like any other.
                    previous = Some(select_current().first::<CriteriaRow>(tx)?);
                }

                let previous = previous.ok_or_else(|| {
                    RepositoryError::internal_with_context(
                        "Current result vanished inside transaction",
                        ErrorContext::new("write_result").with_entity("criteria_site"),
                    )
                })?;
                let now = next_write_timestamp(Some(previous.created_at));

                diesel::insert_into(criteria_site_historic::table)
                    .values(&NewHistoricRow::archive(&previous, now))
                    .execute(tx)?;

                let updated = diesel::update(criteria_site::table.find(previous.id))
                    .set((
                        criteria_site::valid.eq(valid),
                        criteria_site::extra_info.eq(extra_info.clone()),
                        criteria_site::created_at.eq(now),
                    ))
                    .returning(CriteriaRow::as_returning())
                    .get_result::<CriteriaRow>(tx)?;

                Ok(CurrentResult::from(updated))
            })
        })
        .await
    }

    async fn current_for_polygon(
        &self,
        polygon: PolygonUuid,
    ) -> RepositoryResult<Vec<CurrentResult>> {
        self.with_conn(move |conn| {
            let rows: Vec<CriteriaRow> = criteria_site::table
                .filter(criteria_site::polygon_id.eq(polygon.value()))
                .order((criteria_site::created_at.desc(), criteria_site::criteria_id.asc()))
                .select(CriteriaRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(CurrentResult::from).collect())
        })
        .await
    }

    async fn current_for_polygons(
        &self,
        polygons: &[PolygonUuid],
        criteria: Option<CriteriaId>,
    ) -> RepositoryResult<Vec<CurrentResult>> {
        let ids = raw_ids(polygons);
        self.with_conn(move |conn| {
            let mut query = criteria_site::table
                .filter(criteria_site::polygon_id.eq_any(ids))
                .into_boxed();
            if let Some(c) = criteria {
                query = query.filter(criteria_site::criteria_id.eq(c.value()));
            }
            let rows: Vec<CriteriaRow> = query
                .order((criteria_site::created_at.desc(), criteria_site::criteria_id.asc()))
                .select(CriteriaRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(CurrentResult::from).collect())
        })
        .await
    }

    async fn history_for_polygon(
        &self,
        polygon: PolygonUuid,
        criteria: Option<CriteriaId>,
    ) -> RepositoryResult<Vec<HistoricResult>> {
        self.with_conn(move |conn| {
            let mut query = criteria_site_historic::table
                .filter(criteria_site_historic::polygon_id.eq(polygon.value()))
                .into_boxed();
            if let Some(c) = criteria {
                query = query.filter(criteria_site_historic::criteria_id.eq(c.value()));
            }
            let rows: Vec<HistoricRow> = query
                .order((
                    criteria_site_historic::archived_at.desc(),
                    criteria_site_historic::id.desc(),
                ))
                .select(HistoricRow::as_select())
                .load(conn)?;
            Ok(rows.into_iter().map(HistoricResult::from).collect())
        })
        .await
    }
}

// ==================== Job Repository ====================

#[async_trait]
impl JobRepository for PostgresRepository {
    async fn create_job(&self, name: &str) -> RepositoryResult<JobRecord> {
        let new_job = NewJobRow {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            status: JobStatus::Pending.as_str().to_string(),
        };
        self.with_conn(move |conn| {
            let row: JobRow = diesel::insert_into(delayed_jobs::table)
                .values(&new_job)
                .returning(JobRow::as_returning())
                .get_result(conn)?;
            JobRecord::try_from(row)
        })
        .await
    }

    async fn get_job(&self, id: JobId) -> RepositoryResult<Option<JobRecord>> {
        self.with_conn(move |conn| {
            delayed_jobs::table
                .find(id.value())
                .select(JobRow::as_select())
                .first::<JobRow>(conn)
                .optional()?
                .map(JobRecord::try_from)
                .transpose()
        })
        .await
    }

    async fn get_job_by_uuid(&self, uuid: Uuid) -> RepositoryResult<Option<JobRecord>> {
        self.with_conn(move |conn| {
            delayed_jobs::table
                .filter(delayed_jobs::uuid.eq(uuid))
                .select(JobRow::as_select())
                .first::<JobRow>(conn)
                .optional()?
                .map(JobRecord::try_from)
                .transpose()
        })
        .await
    }

    async fn start_job(
        &self,
        id: JobId,
        total: i64,
        message: &str,
    ) -> RepositoryResult<JobRecord> {
        let message = message.to_string();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let row = lock_open_job(tx, id, "start_job")?;
                if row.status != JobStatus::Pending.as_str() {
                    return Err(RepositoryError::invalid_state(
                        "Job already started",
                        ErrorContext::new("start_job").with_entity("job").with_entity_id(id),
                    ));
                }
                let row: JobRow = diesel::update(delayed_jobs::table.find(id.value()))
                    .set((
                        delayed_jobs::status.eq(JobStatus::Running.as_str()),
                        delayed_jobs::total_content.eq(Some(total)),
                        delayed_jobs::processed_content.eq(Some(0i64)),
                        delayed_jobs::progress_message.eq(Some(message.clone())),
                        delayed_jobs::updated_at.eq(Utc::now()),
                    ))
                    .returning(JobRow::as_returning())
                    .get_result(tx)?;
                JobRecord::try_from(row)
            })
        })
        .await
    }

    async fn record_progress(
        &self,
        id: JobId,
        processed: i64,
        message: &str,
    ) -> RepositoryResult<JobRecord> {
        let message = message.to_string();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let row = lock_open_job(tx, id, "record_progress")?;
                let context = || {
                    ErrorContext::new("record_progress")
                        .with_entity("job")
                        .with_entity_id(id)
                };
                if row.status != JobStatus::Running.as_str() {
                    return Err(RepositoryError::invalid_state("Job is not running", context()));
                }
                let current = row.processed_content.unwrap_or(0);
                if processed < current {
                    return Err(RepositoryError::invalid_state(
                        format!("Progress cannot move backwards ({} < {})", processed, current),
                        context(),
                    ));
                }
                let row: JobRow = diesel::update(delayed_jobs::table.find(id.value()))
                    .set((
                        delayed_jobs::processed_content.eq(Some(processed)),
                        delayed_jobs::progress_message.eq(Some(message.clone())),
                        delayed_jobs::updated_at.eq(Utc::now()),
                    ))
                    .returning(JobRow::as_returning())
                    .get_result(tx)?;
                JobRecord::try_from(row)
            })
        })
        .await
    }

    async fn complete_job(&self, id: JobId, payload: Value) -> RepositoryResult<JobRecord> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let row = lock_open_job(tx, id, "complete_job")?;
                if row.status != JobStatus::Running.as_str() {
                    return Err(RepositoryError::invalid_state(
                        "Only running jobs can succeed",
                        ErrorContext::new("complete_job").with_entity("job").with_entity_id(id),
                    ));
                }
                let row: JobRow = diesel::update(delayed_jobs::table.find(id.value()))
                    .set((
                        delayed_jobs::status.eq(JobStatus::Succeeded.as_str()),
                        delayed_jobs::status_code.eq(Some(200)),
                        delayed_jobs::payload.eq(Some(payload.clone())),
                        delayed_jobs::updated_at.eq(Utc::now()),
                    ))
                    .returning(JobRow::as_returning())
                    .get_result(tx)?;
                JobRecord::try_from(row)
            })
        })
        .await
    }

    async fn fail_job(
        &self,
        id: JobId,
        status_code: i32,
        payload: Value,
    ) -> RepositoryResult<JobRecord> {
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                lock_open_job(tx, id, "fail_job")?;
                let row: JobRow = diesel::update(delayed_jobs::table.find(id.value()))
                    .set((
                        delayed_jobs::status.eq(JobStatus::Failed.as_str()),
                        delayed_jobs::status_code.eq(Some(status_code)),
                        delayed_jobs::payload.eq(Some(payload.clone())),
                        delayed_jobs::updated_at.eq(Utc::now()),
                    ))
                    .returning(JobRow::as_returning())
                    .get_result(tx)?;
                JobRecord::try_from(row)
            })
        })
        .await
    }
}
