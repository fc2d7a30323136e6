//! Background site validation: state machine, progress and failure handling.

mod support;

use std::time::Duration;
use uuid::Uuid;

use polygon_validation::db::repository::JobRepository;
use polygon_validation::error::EngineError;
use polygon_validation::models::{
    JobId, JobRecord, JobStatus, PolygonUuid, SiteUuid, ValidationSummary, ValidationType,
};
use polygon_validation::services::{
    enqueue_site_validation, handler_map, JobQueue, SiteValidationJob, SiteValidationPayload,
    CHUNK_SIZE,
};
use support::{square_at, Fixture};
use std::sync::Arc;

fn seed(fixture: &Fixture, count: usize) -> Vec<PolygonUuid> {
    (0..count)
        .map(|i| fixture.add_polygon(square_at(i as f64 * 0.1, 0.0, 0.01), Some(10.0)))
        .collect()
}

async fn run_job(
    fixture: &Fixture,
    site: SiteUuid,
    types: Option<Vec<ValidationType>>,
) -> JobRecord {
    let job = fixture.repo.create_job("site-validation").await.unwrap();
    let payload = SiteValidationPayload {
        site_uuid: site,
        validation_types: types,
        job_record_id: job.id,
    };
    SiteValidationJob::new(fixture.service())
        .run(&payload)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_successful_run_reports_full_progress() {
    let fixture = Fixture::new();
    let count = CHUNK_SIZE * 2 + 20;
    seed(&fixture, count);

    let record = run_job(
        &fixture,
        fixture.site,
        Some(vec![ValidationType::SelfIntersection, ValidationType::PolygonSize]),
    )
    .await;

    assert_eq!(record.status, JobStatus::Succeeded);
    assert_eq!(record.status_code, Some(200));
    assert_eq!(record.total_content, Some(count as i64));
    assert_eq!(record.processed_content, Some(count as i64));
    assert_eq!(record.progress_message.as_deref(), Some("120 out of 120 (100%)"));
    assert_eq!(fixture.repo.current_count(), count * 2);

    let summary: ValidationSummary = serde_json::from_value(record.payload.unwrap()).unwrap();
    assert_eq!(summary.total_polygons, count);
    assert_eq!(summary.polygons_with_failures, 0);
    assert_eq!(summary.criteria.len(), 2);
    assert!(summary.criteria.iter().all(|c| c.valid == count && c.invalid == 0));
}

#[tokio::test]
async fn test_empty_site_fails_with_404_and_no_totals() {
    let fixture = Fixture::new();

    let record = run_job(&fixture, fixture.site, None).await;

    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.status_code, Some(404));
    assert_eq!(record.total_content, None);
    assert_eq!(record.processed_content, None);
    assert!(record.payload.unwrap()["error"].as_str().unwrap().contains("no polygons"));
}

#[tokio::test]
async fn test_unknown_site_fails_with_404() {
    let fixture = Fixture::new();
    let record = run_job(&fixture, SiteUuid::new(Uuid::new_v4()), None).await;
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.status_code, Some(404));
}

#[tokio::test]
async fn test_failure_mid_run_keeps_persisted_progress() {
    let fixture = Fixture::new();
    let ids = seed(&fixture, CHUNK_SIZE + 10);
    fixture.repo.inject_geometry_failure(ids[CHUNK_SIZE + 3]);

    let record = run_job(&fixture, fixture.site, Some(vec![ValidationType::Spikes])).await;

    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.status_code, Some(500));
    assert_eq!(record.total_content, Some((CHUNK_SIZE + 10) as i64));
    assert_eq!(record.processed_content, Some(CHUNK_SIZE as i64));
    let error = record.payload.unwrap()["error"].as_str().unwrap().to_string();
    assert!(error.contains("SPIKES"), "{}", error);
    // The first chunk's results stay written.
    assert_eq!(fixture.repo.current_count(), CHUNK_SIZE);
}

#[tokio::test]
async fn test_redelivered_message_leaves_running_job_alone() {
    let fixture = Fixture::new();
    seed(&fixture, 3);
    let job = fixture.repo.create_job("site-validation").await.unwrap();
    fixture.repo.start_job(job.id, 3, "0 out of 3 (0%)").await.unwrap();
    let payload = SiteValidationPayload {
        site_uuid: fixture.site,
        validation_types: Some(vec![ValidationType::PolygonSize]),
        job_record_id: job.id,
    };

    let record = SiteValidationJob::new(fixture.service())
        .run(&payload)
        .await
        .unwrap();

    assert_eq!(record.status, JobStatus::Running);
    assert_eq!(record.status_code, None);
    assert_eq!(record.payload, None);
    assert_eq!(fixture.repo.current_count(), 0);

    // The owning run can still finish.
    let done = fixture
        .repo
        .complete_job(job.id, serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Succeeded);
}

#[tokio::test]
async fn test_redelivered_message_for_finished_job_is_ignored() {
    let fixture = Fixture::new();
    seed(&fixture, 3);
    let first = run_job(&fixture, fixture.site, Some(vec![ValidationType::PolygonSize])).await;
    assert_eq!(first.status, JobStatus::Succeeded);

    let payload = SiteValidationPayload {
        site_uuid: fixture.site,
        validation_types: Some(vec![ValidationType::PolygonSize]),
        job_record_id: first.id,
    };
    let again = SiteValidationJob::new(fixture.service())
        .run(&payload)
        .await
        .unwrap();

    assert_eq!(again.status, JobStatus::Succeeded);
    assert_eq!(again.payload, first.payload);
    assert_eq!(fixture.repo.historic_count(), 0);
}

#[tokio::test]
async fn test_terminal_job_rejects_further_updates() {
    let fixture = Fixture::new();
    seed(&fixture, 3);
    let record = run_job(&fixture, fixture.site, Some(vec![ValidationType::PolygonSize])).await;
    assert_eq!(record.status, JobStatus::Succeeded);

    assert!(fixture.repo.record_progress(record.id, 3, "again").await.is_err());
    assert!(fixture
        .repo
        .fail_job(record.id, 500, serde_json::json!({}))
        .await
        .is_err());
}

#[tokio::test]
async fn test_enqueue_rejects_unknown_type_without_creating_a_job() {
    let fixture = Fixture::new();
    let queue = JobQueue::new(4);

    let err = enqueue_site_validation(
        &fixture.service(),
        &queue,
        fixture.site,
        Some(vec![ValidationType::Overlapping]),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EngineError::UnknownValidationType(_)));
    assert!(fixture.repo.get_job(JobId::new(1)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_enqueued_job_is_processed_by_workers() {
    let fixture = Fixture::new();
    seed(&fixture, 7);
    let service = fixture.service();
    let queue = JobQueue::new(4);
    queue.spawn_workers(
        2,
        handler_map(vec![Arc::new(SiteValidationJob::new(service.clone()))]),
    );

    let job = enqueue_site_validation(&service, &queue, fixture.site, None)
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    let mut record = service.get_job(job.uuid).await.unwrap();
    for _ in 0..200 {
        if record.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        record = service.get_job(job.uuid).await.unwrap();
    }

    assert_eq!(record.status, JobStatus::Succeeded);
    assert_eq!(record.processed_content, Some(7));
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let fixture = Fixture::new();
    let missing = Uuid::new_v4();
    let err = fixture.service().get_job(missing).await.unwrap_err();
    assert!(matches!(err, EngineError::JobNotFound(u) if u == missing));
    assert_eq!(err.status_code(), 404);
}
