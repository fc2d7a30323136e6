use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types;
use serde_json::Value;
use uuid::Uuid;

use super::schema::{
    criteria_site, criteria_site_historic, delayed_jobs, projects, site_polygons, sites,
};
use crate::db::repository::{RepositoryError, RepositoryResult};
use crate::models::{
    CriteriaId, CurrentResult, HistoricResult, JobId, JobRecord, PolygonAttributes,
    PolygonDetails, PolygonUuid, ProjectRecord, ProjectUuid, SiteRecord, SiteUuid,
};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)] // id is only used for ordering in SQL
pub struct ProjectRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub total_hectares_restored_goal: Option<f64>,
}

impl From<ProjectRow> for ProjectRecord {
    fn from(row: ProjectRow) -> Self {
        Self {
            uuid: ProjectUuid::new(row.uuid),
            name: row.name,
            area_goal_hectares: row.total_hectares_restored_goal,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sites)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)]
pub struct SiteRow {
    pub id: i64,
    pub uuid: Uuid,
    pub project_uuid: Uuid,
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub hectares_to_restore_goal: Option<f64>,
}

impl From<SiteRow> for SiteRecord {
    fn from(row: SiteRow) -> Self {
        Self {
            uuid: SiteUuid::new(row.uuid),
            name: row.name,
            project_uuid: ProjectUuid::new(row.project_uuid),
            start_date: row.start_date,
            area_goal_hectares: row.hectares_to_restore_goal,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = site_polygons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PolygonRow {
    pub uuid: Uuid,
    pub site_uuid: Uuid,
    pub poly_name: Option<String>,
    pub practice: Option<String>,
    pub target_sys: Option<String>,
    pub distr: Option<String>,
    pub num_trees: Option<i32>,
    pub plantstart: Option<NaiveDate>,
}

impl From<PolygonRow> for PolygonDetails {
    fn from(row: PolygonRow) -> Self {
        Self {
            uuid: PolygonUuid::new(row.uuid),
            site_uuid: SiteUuid::new(row.site_uuid),
            attributes: PolygonAttributes {
                poly_name: row.poly_name,
                practice: row.practice,
                target_sys: row.target_sys,
                distr: row.distr,
                num_trees: row.num_trees,
                plantstart: row.plantstart,
            },
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = criteria_site)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CriteriaRow {
    pub id: i64,
    pub polygon_id: Uuid,
    pub criteria_id: i32,
    pub valid: bool,
    pub extra_info: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl From<CriteriaRow> for CurrentResult {
    fn from(row: CriteriaRow) -> Self {
        Self {
            polygon_uuid: PolygonUuid::new(row.polygon_id),
            criteria_id: CriteriaId::new(row.criteria_id),
            valid: row.valid,
            created_at: row.created_at,
            extra_info: row.extra_info,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = criteria_site)]
pub struct NewCriteriaRow {
    pub polygon_id: Uuid,
    pub criteria_id: i32,
    pub valid: bool,
    pub extra_info: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = criteria_site_historic)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[allow(dead_code)]
pub struct HistoricRow {
    pub id: i64,
    pub polygon_id: Uuid,
    pub criteria_id: i32,
    pub valid: bool,
    pub extra_info: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
}

impl From<HistoricRow> for HistoricResult {
    fn from(row: HistoricRow) -> Self {
        Self {
            polygon_uuid: PolygonUuid::new(row.polygon_id),
            criteria_id: CriteriaId::new(row.criteria_id),
            valid: row.valid,
            created_at: row.created_at,
            extra_info: row.extra_info,
            archived_at: row.archived_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = criteria_site_historic)]
pub struct NewHistoricRow {
    pub polygon_id: Uuid,
    pub criteria_id: i32,
    pub valid: bool,
    pub extra_info: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
}

impl NewHistoricRow {
    /// Snapshot of `previous` taken at `archived_at`.
    pub fn archive(previous: &CriteriaRow, archived_at: DateTime<Utc>) -> Self {
        Self {
            polygon_id: previous.polygon_id,
            criteria_id: previous.criteria_id,
            valid: previous.valid,
            extra_info: previous.extra_info.clone(),
            created_at: previous.created_at,
            archived_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = delayed_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobRow {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub status: String,
    pub status_code: Option<i32>,
    pub total_content: Option<i64>,
    pub processed_content: Option<i64>,
    pub progress_message: Option<String>,
    pub payload: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = RepositoryError;

    fn try_from(row: JobRow) -> RepositoryResult<Self> {
        let status = row
            .status
            .parse()
            .map_err(|e: String| RepositoryError::internal(e))?;
        Ok(Self {
            id: JobId::new(row.id),
            uuid: row.uuid,
            name: row.name,
            status,
            status_code: row.status_code,
            total_content: row.total_content,
            processed_content: row.processed_content,
            progress_message: row.progress_message,
            payload: row.payload,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = delayed_jobs)]
pub struct NewJobRow {
    pub uuid: Uuid,
    pub name: String,
    pub status: String,
}

// ==================== Raw PostGIS query rows ====================

#[derive(Debug, QueryableByName)]
pub struct SimplicityRow {
    #[diesel(sql_type = sql_types::Uuid)]
    pub uuid: Uuid,
    #[diesel(sql_type = sql_types::Bool)]
    pub is_simple: bool,
}

#[derive(Debug, QueryableByName)]
pub struct AreaRow {
    #[diesel(sql_type = sql_types::Uuid)]
    pub uuid: Uuid,
    #[diesel(sql_type = sql_types::Double)]
    pub area_hectares: f64,
}

#[derive(Debug, QueryableByName)]
pub struct BoundaryRow {
    #[diesel(sql_type = sql_types::Uuid)]
    pub uuid: Uuid,
    /// GeoJSON LineString of the exterior ring.
    #[diesel(sql_type = sql_types::Text)]
    pub ring_geojson: String,
}

#[derive(Debug, QueryableByName)]
pub struct AreaSumRow {
    #[diesel(sql_type = sql_types::Double)]
    pub total: f64,
}
