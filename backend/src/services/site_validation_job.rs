//! Background validation of every active polygon in a site.
//!
//! A run walks the site's polygons in fixed-size chunks, persisting progress
//! after each chunk so pollers see a monotonically advancing counter. Every
//! failure ends in a terminal `failed` job record; nothing propagates to the
//! caller that enqueued the job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::job_queue::{JobHandler, JobQueue};
use super::validation_service::ValidationService;
use crate::db::repository::{ErrorContext, JobRepository, RepositoryError, SiteRepository};
use crate::error::EngineResult;
use crate::models::{
    progress_message, JobId, JobRecord, JobStatus, SiteUuid, ValidationSummary, ValidationType,
};

pub const SITE_VALIDATION_JOB: &str = "site-validation";

/// Polygons validated between two progress updates.
pub const CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteValidationPayload {
    pub site_uuid: SiteUuid,
    /// `None` runs every registered check.
    pub validation_types: Option<Vec<ValidationType>>,
    pub job_record_id: JobId,
}

/// Create a pending job record and queue the run.
///
/// Unknown types are rejected before any record is created. The site is not
/// checked here; a missing or empty site fails the job itself with 404.
pub async fn enqueue_site_validation(
    service: &ValidationService,
    queue: &JobQueue,
    site: SiteUuid,
    types: Option<Vec<ValidationType>>,
) -> EngineResult<JobRecord> {
    service.resolve_types(types.as_deref())?;

    let repository = service.repository();
    let job = repository.create_job(SITE_VALIDATION_JOB).await?;
    let payload = SiteValidationPayload {
        site_uuid: site,
        validation_types: types,
        job_record_id: job.id,
    };

    let message = serde_json::to_value(&payload).map_err(RepositoryError::from)?;
    if let Err(e) = queue.enqueue(SITE_VALIDATION_JOB, message).await {
        repository
            .fail_job(job.id, i32::from(e.status_code()), json!({ "error": e.to_string() }))
            .await?;
        return Err(e);
    }

    log::info!("Queued site validation job {} for site {}", job.uuid, site);
    Ok(job)
}

/// What a run ended with, before it is written to the job record.
enum RunOutcome {
    Succeeded(ValidationSummary),
    NothingToValidate(String),
    /// Another delivery of the same message started the job first.
    AlreadyClaimed,
}

pub struct SiteValidationJob {
    service: ValidationService,
    chunk_size: usize,
}

impl SiteValidationJob {
    pub fn new(service: ValidationService) -> Self {
        Self {
            service,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Execute one queued run and return the job record it left behind.
    ///
    /// A message for a job that is no longer pending is a redelivery; the
    /// record is returned untouched so the run that owns it is not disturbed.
    pub async fn run(&self, payload: &SiteValidationPayload) -> EngineResult<JobRecord> {
        let job = payload.job_record_id;
        let repository = self.service.repository();

        let current = repository.get_job(job).await?.ok_or_else(|| {
            RepositoryError::not_found_with_context(
                "Job record not found",
                ErrorContext::new("run_site_validation")
                    .with_entity("job")
                    .with_entity_id(job),
            )
        })?;
        if current.status != JobStatus::Pending {
            log::warn!(
                "Ignoring redelivered site validation job {} ({})",
                job,
                current.status.as_str()
            );
            return Ok(current);
        }

        let record = match self.process(payload).await {
            Ok(RunOutcome::Succeeded(summary)) => {
                log::info!(
                    "Site validation job {} succeeded: {} polygon(s), {} with failures",
                    job,
                    summary.total_polygons,
                    summary.polygons_with_failures
                );
                let summary = serde_json::to_value(&summary).map_err(RepositoryError::from)?;
                repository.complete_job(job, summary).await?
            }
            Ok(RunOutcome::AlreadyClaimed) => {
                log::warn!("Site validation job {} was started by another delivery", job);
                return Ok(repository.get_job(job).await?.unwrap_or(current));
            }
            Ok(RunOutcome::NothingToValidate(message)) => {
                log::warn!("Site validation job {} failed: {}", job, message);
                repository.fail_job(job, 404, json!({ "error": message })).await?
            }
            Err(e) => {
                log::error!("Site validation job {} failed: {}", job, e);
                repository
                    .fail_job(job, 500, json!({ "error": e.to_string() }))
                    .await?
            }
        };
        Ok(record)
    }

    async fn process(&self, payload: &SiteValidationPayload) -> EngineResult<RunOutcome> {
        let repository = self.service.repository();
        let site = payload.site_uuid;

        let polygons = if repository.site_exists(site).await? {
            repository.active_polygon_ids(site).await?
        } else {
            Vec::new()
        };
        if polygons.is_empty() {
            return Ok(RunOutcome::NothingToValidate(format!(
                "Site {} has no polygons to validate",
                site
            )));
        }

        let resolved = self.service.resolve_types(payload.validation_types.as_deref())?;
        let types: Vec<ValidationType> = resolved.iter().map(|(t, _, _)| *t).collect();

        let total = polygons.len() as i64;
        match repository
            .start_job(payload.job_record_id, total, &progress_message(0, total))
            .await
        {
            Ok(_) => {}
            Err(RepositoryError::InvalidState { .. }) => return Ok(RunOutcome::AlreadyClaimed),
            Err(e) => return Err(e.into()),
        }
        log::info!(
            "Site validation job {} running: {} polygon(s) in chunks of {}",
            payload.job_record_id,
            total,
            self.chunk_size
        );

        let mut processed = 0i64;
        for chunk in polygons.chunks(self.chunk_size) {
            self.service.validate_polygons(chunk, Some(&types)).await?;
            processed += chunk.len() as i64;
            let message = progress_message(processed, total);
            repository
                .record_progress(payload.job_record_id, processed, &message)
                .await?;
            log::debug!("Site validation job {}: {}", payload.job_record_id, message);
        }

        let criteria: Vec<_> = resolved.iter().map(|(_, id, _)| *id).collect();
        let summary = self.service.summarize(&polygons, &criteria).await?;
        Ok(RunOutcome::Succeeded(summary))
    }
}

#[async_trait]
impl JobHandler for SiteValidationJob {
    fn job_type(&self) -> &'static str {
        SITE_VALIDATION_JOB
    }

    async fn handle(&self, payload: Value) -> EngineResult<()> {
        let payload: SiteValidationPayload = serde_json::from_value(payload)
            .map_err(RepositoryError::from)?;
        self.run(&payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let payload = SiteValidationPayload {
            site_uuid: SiteUuid::new(uuid::Uuid::nil()),
            validation_types: Some(vec![ValidationType::Spikes]),
            job_record_id: JobId::new(7),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "siteUuid": "00000000-0000-0000-0000-000000000000",
                "validationTypes": ["SPIKES"],
                "jobRecordId": 7,
            })
        );
    }
}
