//! Validation service: running checks, querying results, pagination.

mod support;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use polygon_validation::error::{EngineError, EngineResult};
use polygon_validation::models::{
    CriteriaId, PolygonUuid, SiteUuid, ValidationType, ValidityStatus, Verdict,
};
use polygon_validation::services::ValidationService;
use polygon_validation::validators::{CriteriaRegistry, Validator};
use support::{bowtie, square, square_at, Fixture};

#[tokio::test]
async fn test_validate_writes_every_requested_check() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square_at(0.0, 0.0, 0.01), Some(400.0));
    let b = fixture.add_polygon(bowtie(), Some(400.0));
    let service = fixture.service();

    let results = service
        .validate_polygons(
            &[a, b],
            Some(&[ValidationType::SelfIntersection, ValidationType::PolygonSize]),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(fixture.repo.current_count(), 4);
    let bowtie_simple = results
        .iter()
        .find(|r| r.polygon_uuid == b && r.criteria_id == CriteriaId::new(4))
        .unwrap();
    assert!(!bowtie_simple.valid);
}

#[tokio::test]
async fn test_default_runs_every_registered_check() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square(0.01), Some(900.0));
    let service = fixture.service();

    let results = service.validate_polygons(&[a], None).await.unwrap();

    let mut ids: Vec<i32> = results.iter().map(|r| r.criteria_id.value()).collect();
    ids.sort();
    assert_eq!(ids, vec![4, 6, 8, 12, 14, 15]);
}

#[tokio::test]
async fn test_unknown_type_aborts_before_any_write() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square(0.01), None);
    let service = fixture.service();

    let err = service
        .validate_polygons(
            &[a],
            Some(&[ValidationType::SelfIntersection, ValidationType::DuplicateGeometry]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::UnknownValidationType(_)));
    assert_eq!(err.status_code(), 400);
    assert_eq!(fixture.repo.current_count(), 0);
}

#[tokio::test]
async fn test_rerun_keeps_verdict_and_archives_prior_state() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square(0.01), None);
    let service = fixture.service();
    let types = [ValidationType::SelfIntersection];

    let first = service.validate_polygons(&[a], Some(&types)).await.unwrap();
    let second = service.validate_polygons(&[a], Some(&types)).await.unwrap();

    assert_eq!(first[0].valid, second[0].valid);
    assert_eq!(first[0].extra_info, second[0].extra_info);
    assert!(second[0].created_at > first[0].created_at);

    let history = service.get_validation_history(a, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].created_at, first[0].created_at);
    assert_eq!(history[0].valid, first[0].valid);
}

#[tokio::test]
async fn test_repeated_polygon_is_written_once_per_call() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square(0.01), None);
    let b = fixture.add_polygon(square_at(1.0, 0.0, 0.01), None);
    let service = fixture.service();

    let results = service
        .validate_polygons(&[a, b, a], Some(&[ValidationType::SelfIntersection]))
        .await
        .unwrap();

    let listed: Vec<PolygonUuid> = results.iter().map(|r| r.polygon_uuid).collect();
    assert_eq!(listed, vec![a, b]);
    assert_eq!(fixture.repo.current_count(), 2);
    assert_eq!(fixture.repo.historic_count(), 0);
}

#[tokio::test]
async fn test_rerun_after_geometry_fix_flips_verdict() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(bowtie(), None);
    let service = fixture.service();
    let types = [ValidationType::SelfIntersection];

    service.validate_polygons(&[a], Some(&types)).await.unwrap();
    fixture.repo.update_boundary(a, square(0.01)).unwrap();
    service.validate_polygons(&[a], Some(&types)).await.unwrap();

    let validation = service.get_polygon_validation(a).await.unwrap();
    assert!(validation.criteria_list[0].valid);
    let history = service.get_validation_history(a, Some(CriteriaId::new(4))).await.unwrap();
    assert!(!history[0].valid);
}

#[tokio::test]
async fn test_missing_polygon_fails_the_whole_call() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square(0.01), None);
    let missing = PolygonUuid::new(Uuid::new_v4());

    let err = fixture
        .service()
        .validate_polygons(&[a, missing], Some(&[ValidationType::Spikes]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PolygonNotFound(p) if p == missing));
    assert_eq!(fixture.repo.current_count(), 0);
}

// =========================================================
// Polygon queries
// =========================================================

#[tokio::test]
async fn test_polygon_validation_status() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square(0.01), Some(500.0));
    let service = fixture.service();

    let never = service.get_polygon_validation(a).await.unwrap();
    assert!(never.criteria_list.is_empty());
    assert_eq!(never.status, ValidityStatus::NotChecked);

    service
        .validate_polygons(&[a], Some(&[ValidationType::PolygonSize]))
        .await
        .unwrap();
    let checked = service.get_polygon_validation(a).await.unwrap();
    assert_eq!(checked.criteria_list.len(), 1);
    assert_eq!(checked.status, ValidityStatus::Passed);
}

#[tokio::test]
async fn test_non_blocking_failure_is_partial() {
    let fixture = Fixture::with_goals(Some(10.0), Some(10.0));
    let a = fixture.add_polygon(square(0.01), Some(500.0));
    let service = fixture.service();

    service
        .validate_polygons(
            &[a],
            Some(&[ValidationType::PolygonSize, ValidationType::EstimatedArea]),
        )
        .await
        .unwrap();
    let validation = service.get_polygon_validation(a).await.unwrap();
    assert_eq!(validation.status, ValidityStatus::Partial);
}

#[tokio::test]
async fn test_polygon_validation_not_found() {
    let fixture = Fixture::new();
    let missing = PolygonUuid::new(Uuid::new_v4());
    let err = fixture.service().get_polygon_validation(missing).await.unwrap_err();
    assert!(matches!(err, EngineError::PolygonNotFound(_)));
    assert_eq!(err.status_code(), 404);
}

// =========================================================
// Site queries
// =========================================================

#[tokio::test]
async fn test_pagination_boundaries() {
    let fixture = Fixture::new();
    let service = fixture.service();

    for size in [0, 1001, -5] {
        let err = service
            .get_site_validations(fixture.site, size, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPageSize(s) if s == size));
    }
    let err = service
        .get_site_validations(fixture.site, 10, 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPageNumber(0)));

    assert!(service.get_site_validations(fixture.site, 1, 1, None).await.is_ok());
    assert!(service.get_site_validations(fixture.site, 1000, 1, None).await.is_ok());
}

#[tokio::test]
async fn test_page_checks_precede_site_lookup() {
    let fixture = Fixture::new();
    let unknown = SiteUuid::new(Uuid::new_v4());
    let err = fixture
        .service()
        .get_site_validations(unknown, 0, 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPageSize(0)));
}

#[tokio::test]
async fn test_empty_site_returns_empty_page() {
    let fixture = Fixture::new();
    let page = fixture
        .service()
        .get_site_validations(fixture.site, 10, 1, None)
        .await
        .unwrap();
    assert!(page.validations.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_unknown_site_is_not_found() {
    let fixture = Fixture::new();
    let unknown = SiteUuid::new(Uuid::new_v4());
    let err = fixture
        .service()
        .get_site_validations(unknown, 10, 1, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SiteNotFound(s) if s == unknown));
}

#[tokio::test]
async fn test_site_pages_follow_upload_order() {
    let fixture = Fixture::new();
    let ids: Vec<PolygonUuid> = (0..5)
        .map(|i| fixture.add_polygon(square_at(i as f64, 0.0, 0.01), Some(100.0)))
        .collect();
    let service = fixture.service();
    service
        .validate_polygons(&ids, Some(&[ValidationType::PolygonSize]))
        .await
        .unwrap();

    let page = service
        .get_site_validations(fixture.site, 2, 2, None)
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    let listed: Vec<PolygonUuid> = page.validations.iter().map(|v| v.polygon_uuid).collect();
    assert_eq!(listed, vec![ids[2], ids[3]]);

    let last = service
        .get_site_validations(fixture.site, 2, 3, None)
        .await
        .unwrap();
    assert_eq!(last.validations.len(), 1);

    let past_end = service
        .get_site_validations(fixture.site, 2, 4, None)
        .await
        .unwrap();
    assert!(past_end.validations.is_empty());
    assert_eq!(past_end.total, 5);
}

#[tokio::test]
async fn test_site_criteria_filter_counts_matching_polygons() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square_at(0.0, 0.0, 0.01), Some(100.0));
    let b = fixture.add_polygon(square_at(1.0, 0.0, 0.01), Some(100.0));
    let service = fixture.service();

    service
        .validate_polygons(&[a, b], Some(&[ValidationType::PolygonSize]))
        .await
        .unwrap();
    service
        .validate_polygons(&[a], Some(&[ValidationType::Spikes]))
        .await
        .unwrap();

    let spikes = service
        .get_site_validations(fixture.site, 10, 1, Some(CriteriaId::new(8)))
        .await
        .unwrap();
    assert_eq!(spikes.total, 1);
    assert_eq!(spikes.validations[0].polygon_uuid, a);
    assert_eq!(spikes.validations[0].criteria_list.len(), 1);

    let all = service
        .get_site_validations(fixture.site, 10, 1, None)
        .await
        .unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.validations[0].criteria_list.len(), 2);
}

#[tokio::test]
async fn test_inactive_polygons_are_not_listed() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square(0.01), Some(100.0));
    let service = fixture.service();
    service
        .validate_polygons(&[a], Some(&[ValidationType::PolygonSize]))
        .await
        .unwrap();
    fixture.repo.set_polygon_active(a, false);

    let page = service
        .get_site_validations(fixture.site, 10, 1, None)
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

// =========================================================
// Summary
// =========================================================

#[tokio::test]
async fn test_summary_counts_per_criteria() {
    let fixture = Fixture::new();
    let ok = fixture.add_polygon(square_at(0.0, 0.0, 0.01), Some(100.0));
    let big = fixture.add_polygon(bowtie(), Some(5000.0));
    let service = fixture.service();
    service
        .validate_polygons(
            &[ok, big],
            Some(&[ValidationType::SelfIntersection, ValidationType::PolygonSize]),
        )
        .await
        .unwrap();

    let summary = service
        .summarize(&[ok, big], &[CriteriaId::new(4), CriteriaId::new(6)])
        .await
        .unwrap();
    assert_eq!(summary.total_polygons, 2);
    assert_eq!(summary.polygons_with_failures, 1);
    assert_eq!(summary.criteria.len(), 2);
    for c in &summary.criteria {
        assert_eq!((c.valid, c.invalid), (1, 1));
    }
}

// =========================================================
// Timeouts
// =========================================================

struct SlowSpikes;

#[async_trait]
impl Validator for SlowSpikes {
    fn validation_type(&self) -> ValidationType {
        ValidationType::Spikes
    }

    async fn validate_polygon(&self, _polygon: PolygonUuid) -> EngineResult<Verdict> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Verdict::pass())
    }
}

#[tokio::test]
async fn test_validator_timeout_is_execution_failure() {
    let fixture = Fixture::new();
    let a = fixture.add_polygon(square(0.01), None);
    let mut registry = CriteriaRegistry::with_default_validators(fixture.full());
    registry.register(Arc::new(SlowSpikes));

    let service = ValidationService::new(fixture.full(), Arc::new(registry))
        .with_validator_timeout(Some(Duration::from_millis(20)));
    let err = service
        .validate_polygons(&[a], Some(&[ValidationType::Spikes]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::ValidatorExecutionFailure { validation_type: ValidationType::Spikes, .. }
    ));
    assert_eq!(fixture.repo.current_count(), 0);
}
