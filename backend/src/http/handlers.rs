//! HTTP handlers for the REST API.
//!
//! Handlers parse request input, delegate to the validation service and map
//! engine errors onto status codes through [`AppError`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use uuid::Uuid;

use super::dto::{
    EnqueueSiteValidationRequest, EnqueueSiteValidationResponse, HealthResponse, HistoryQuery,
    SiteValidationsQuery, ValidatePolygonsRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::db::repository::ValidationRepository;
use crate::models::{
    CriteriaId, CurrentResult, HistoricResult, JobRecord, PolygonUuid, PolygonValidation,
    SiteUuid, SiteValidationPage,
};
use crate::services;
use crate::validators::parse_validation_types;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Poll interval of the job event stream.
const JOB_POLL_INTERVAL: Duration = Duration::from_millis(200);

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match state.repository().health_check().await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Validation
// =============================================================================

/// POST /v1/validations/polygons
///
/// Run checks now and return the stored results.
pub async fn validate_polygons(
    State(state): State<AppState>,
    Json(request): Json<ValidatePolygonsRequest>,
) -> HandlerResult<Vec<CurrentResult>> {
    let types = request
        .validation_types
        .as_deref()
        .map(parse_validation_types)
        .transpose()?;
    let results = state
        .service
        .validate_polygons(&request.polygon_uuids, types.as_deref())
        .await?;
    Ok(Json(results))
}

/// GET /v1/validations/polygons/{uuid}
pub async fn get_polygon_validation(
    State(state): State<AppState>,
    Path(polygon): Path<Uuid>,
) -> HandlerResult<PolygonValidation> {
    let validation = state
        .service
        .get_polygon_validation(PolygonUuid::new(polygon))
        .await?;
    Ok(Json(validation))
}

/// GET /v1/validations/polygons/{uuid}/history
pub async fn get_validation_history(
    State(state): State<AppState>,
    Path(polygon): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> HandlerResult<Vec<HistoricResult>> {
    let history = state
        .service
        .get_validation_history(PolygonUuid::new(polygon), query.criteria_id.map(CriteriaId::new))
        .await?;
    Ok(Json(history))
}

/// GET /v1/validations/sites/{uuid}
pub async fn get_site_validations(
    State(state): State<AppState>,
    Path(site): Path<Uuid>,
    Query(query): Query<SiteValidationsQuery>,
) -> HandlerResult<SiteValidationPage> {
    let page = state
        .service
        .get_site_validations(
            SiteUuid::new(site),
            query.page_size,
            query.page_number,
            query.criteria_id.map(CriteriaId::new),
        )
        .await?;
    Ok(Json(page))
}

// =============================================================================
// Async Job Management
// =============================================================================

/// POST /v1/validations/sites/{uuid}/jobs
///
/// Queue a background run over the site's active polygons.
pub async fn enqueue_site_validation(
    State(state): State<AppState>,
    Path(site): Path<Uuid>,
    Json(request): Json<EnqueueSiteValidationRequest>,
) -> Result<(StatusCode, Json<EnqueueSiteValidationResponse>), AppError> {
    let types = request
        .validation_types
        .as_deref()
        .map(parse_validation_types)
        .transpose()?;
    let job = services::enqueue_site_validation(
        &state.service,
        &state.queue,
        SiteUuid::new(site),
        types,
    )
    .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueSiteValidationResponse {
            job_id: job.id,
            job_uuid: job.uuid,
            status: job.status,
            message: format!(
                "Site validation started. Track progress at /v1/jobs/{}/events",
                job.uuid
            ),
        }),
    ))
}

/// GET /v1/jobs/{uuid}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job): Path<Uuid>,
) -> HandlerResult<JobRecord> {
    Ok(Json(state.service.get_job(job).await?))
}

/// GET /v1/jobs/{uuid}/events
///
/// Stream job progress via Server-Sent Events (SSE). A `progress` event is
/// sent whenever the record changes and a final `complete` event once the
/// job reaches a terminal state.
pub async fn stream_job_events(
    State(state): State<AppState>,
    Path(job): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Verify job exists
    state.service.get_job(job).await?;

    let service = state.service.clone();
    let stream = async_stream::stream! {
        let mut last_seen = None;
        loop {
            let record = match service.get_job(job).await {
                Ok(record) => record,
                Err(e) => {
                    yield Ok(Event::default().event("error").data(e.to_string()));
                    break;
                }
            };

            if record.status.is_terminal() {
                let data = serde_json::to_string(&record).unwrap_or_default();
                yield Ok(Event::default().event("complete").data(data));
                break;
            }

            if last_seen.as_ref() != Some(&record.updated_at) {
                last_seen = Some(record.updated_at);
                let data = serde_json::to_string(&record).unwrap_or_default();
                yield Ok(Event::default().event("progress").data(data));
            }

            tokio::time::sleep(JOB_POLL_INTERVAL).await;
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}
