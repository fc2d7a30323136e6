//! Data Transfer Objects for the HTTP API.
//!
//! Response bodies reuse the engine's model types, which already serialize
//! in camelCase; only request shapes and a few envelopes live here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{JobId, JobStatus, PolygonUuid};

/// Page size used when a site query does not name one.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Body of `POST /v1/validations/polygons`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePolygonsRequest {
    pub polygon_uuids: Vec<PolygonUuid>,
    /// Type names; every registered check runs when absent.
    #[serde(default)]
    pub validation_types: Option<Vec<String>>,
}

/// Body of `POST /v1/validations/sites/{uuid}/jobs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueSiteValidationRequest {
    #[serde(default)]
    pub validation_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueSiteValidationResponse {
    pub job_id: JobId,
    pub job_uuid: Uuid,
    pub status: JobStatus,
    pub message: String,
}

/// Query parameters for the site validations endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteValidationsQuery {
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default = "default_page_number")]
    pub page_number: i64,
    #[serde(default)]
    pub criteria_id: Option<i32>,
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

fn default_page_number() -> i64 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    pub criteria_id: Option<i32>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,
    /// Version of the API
    pub version: String,
    /// Database connection status
    pub database: String,
}
