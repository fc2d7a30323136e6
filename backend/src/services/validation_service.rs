//! Synchronous validation surface: run checks now and query stored results.
//!
//! Every operation fails fast. A call either returns a complete answer or an
//! [`EngineError`]; it never returns a partial list silently missing some of
//! the requested polygons or types.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::db::repository::{
    FullRepository, GeometryRepository, JobRepository, SiteRepository, ValidationRepository,
};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    CriteriaEntry, CriteriaId, CriteriaSummary, CurrentResult, HistoricResult, JobRecord,
    PolygonUuid, PolygonValidation, PolygonVerdict, SiteUuid, SiteValidationPage,
    ValidationSummary, ValidationType,
};
use crate::validators::{CriteriaRegistry, Validator};

/// Largest page a site query may request.
pub const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Clone)]
pub struct ValidationService {
    repository: Arc<dyn FullRepository>,
    registry: Arc<CriteriaRegistry>,
    validator_timeout: Option<Duration>,
}

impl ValidationService {
    pub fn new(repository: Arc<dyn FullRepository>, registry: Arc<CriteriaRegistry>) -> Self {
        Self {
            repository,
            registry,
            validator_timeout: None,
        }
    }

    /// Service with the default registry and the timeout from `config`.
    pub fn from_config(repository: Arc<dyn FullRepository>, config: &EngineConfig) -> Self {
        let registry = Arc::new(CriteriaRegistry::with_default_validators(repository.clone()));
        Self::new(repository, registry).with_validator_timeout(config.validator_timeout())
    }

    /// Bound each validator batch call; an overrun is reported as a validator failure.
    pub fn with_validator_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.validator_timeout = timeout;
        self
    }

    pub fn repository(&self) -> &Arc<dyn FullRepository> {
        &self.repository
    }

    pub fn registry(&self) -> &CriteriaRegistry {
        &self.registry
    }

    /// Requested types, or every registered type when none are given.
    ///
    /// All types are resolved before anything runs so an unknown one aborts
    /// the call without side effects.
    pub fn resolve_types(
        &self,
        types: Option<&[ValidationType]>,
    ) -> EngineResult<Vec<(ValidationType, CriteriaId, Arc<dyn Validator>)>> {
        let requested = match types {
            Some(t) if !t.is_empty() => t.to_vec(),
            _ => self.registry.registered_types(),
        };

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(requested.len());
        for validation_type in requested {
            if !seen.insert(validation_type) {
                continue;
            }
            let (criteria_id, validator) = self.registry.resolve(validation_type).map_err(|e| {
                log::warn!("Rejected validation request: {}", e);
                e
            })?;
            resolved.push((validation_type, criteria_id, validator));
        }
        Ok(resolved)
    }

    async fn run_validator(
        &self,
        validator: &dyn Validator,
        polygons: &[PolygonUuid],
    ) -> EngineResult<Vec<PolygonVerdict>> {
        let run = validator.validate_polygons(polygons);
        match self.validator_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                EngineError::validator_failure(
                    validator.validation_type(),
                    format!("timed out after {} ms", limit.as_millis()),
                )
            })?,
            None => run.await,
        }
    }

    /// Run the requested checks on `polygons` and write every verdict through
    /// the result store.
    ///
    /// Returns the stored rows, grouped by check in resolution order.
    pub async fn validate_polygons(
        &self,
        polygons: &[PolygonUuid],
        types: Option<&[ValidationType]>,
    ) -> EngineResult<Vec<CurrentResult>> {
        let resolved = self.resolve_types(types)?;

        // Each (polygon, criteria) pair is written once per call.
        let mut seen = HashSet::new();
        let polygons: Vec<PolygonUuid> =
            polygons.iter().copied().filter(|p| seen.insert(*p)).collect();
        log::info!(
            "Validating {} polygon(s) against {} check(s)",
            polygons.len(),
            resolved.len()
        );
        if polygons.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(polygons.len() * resolved.len());
        for (validation_type, criteria_id, validator) in resolved {
            let verdicts = self.run_validator(validator.as_ref(), &polygons).await?;
            log::debug!(
                "{}: {} of {} polygon(s) valid",
                validation_type,
                verdicts.iter().filter(|v| v.valid).count(),
                verdicts.len()
            );
            for verdict in verdicts {
                let stored = self
                    .repository
                    .write_result(
                        verdict.polygon_uuid,
                        criteria_id,
                        verdict.valid,
                        verdict.extra_info,
                    )
                    .await?;
                results.push(stored);
            }
        }
        Ok(results)
    }

    /// Current results for one polygon, newest first.
    pub async fn get_polygon_validation(
        &self,
        polygon: PolygonUuid,
    ) -> EngineResult<PolygonValidation> {
        if !self.repository.polygon_exists(polygon).await? {
            return Err(EngineError::PolygonNotFound(polygon));
        }
        let criteria = self
            .repository
            .current_for_polygon(polygon)
            .await?
            .into_iter()
            .map(CriteriaEntry::from)
            .collect();
        Ok(PolygonValidation::new(polygon, criteria))
    }

    /// Superseded results for one polygon, most recently archived first.
    pub async fn get_validation_history(
        &self,
        polygon: PolygonUuid,
        criteria: Option<CriteriaId>,
    ) -> EngineResult<Vec<HistoricResult>> {
        if !self.repository.polygon_exists(polygon).await? {
            return Err(EngineError::PolygonNotFound(polygon));
        }
        Ok(self.repository.history_for_polygon(polygon, criteria).await?)
    }

    /// One page of per-polygon results for a site's active polygons.
    ///
    /// Only polygons with at least one result matching `criteria` are listed;
    /// `total` counts them across all pages. Polygons keep the site's upload
    /// order.
    pub async fn get_site_validations(
        &self,
        site: SiteUuid,
        page_size: i64,
        page_number: i64,
        criteria: Option<CriteriaId>,
    ) -> EngineResult<SiteValidationPage> {
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(EngineError::InvalidPageSize(page_size));
        }
        if page_number < 1 {
            return Err(EngineError::InvalidPageNumber(page_number));
        }
        if !self.repository.site_exists(site).await? {
            return Err(EngineError::SiteNotFound(site));
        }

        let polygons = self.repository.active_polygon_ids(site).await?;
        if polygons.is_empty() {
            return Ok(SiteValidationPage {
                validations: Vec::new(),
                total: 0,
            });
        }

        let mut grouped: HashMap<PolygonUuid, Vec<CriteriaEntry>> = HashMap::new();
        for result in self.repository.current_for_polygons(&polygons, criteria).await? {
            grouped
                .entry(result.polygon_uuid)
                .or_default()
                .push(CriteriaEntry::from(result));
        }

        let matching: Vec<PolygonUuid> = polygons
            .into_iter()
            .filter(|p| grouped.contains_key(p))
            .collect();
        let total = matching.len();

        let skip = ((page_number - 1) as usize).saturating_mul(page_size as usize);
        let validations = matching
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .map(|p| {
                let mut entries = grouped.remove(&p).unwrap_or_default();
                entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                PolygonValidation::new(p, entries)
            })
            .collect();

        Ok(SiteValidationPage { validations, total })
    }

    /// Valid/invalid counts per criteria over the current results of `polygons`.
    ///
    /// With `criteria` empty every stored criteria is counted.
    pub async fn summarize(
        &self,
        polygons: &[PolygonUuid],
        criteria: &[CriteriaId],
    ) -> EngineResult<ValidationSummary> {
        let wanted: HashSet<CriteriaId> = criteria.iter().copied().collect();
        let results = self.repository.current_for_polygons(polygons, None).await?;

        let mut counts: BTreeMap<CriteriaId, (usize, usize)> = BTreeMap::new();
        for id in &wanted {
            counts.entry(*id).or_default();
        }
        let mut failing = HashSet::new();
        for result in results
            .iter()
            .filter(|r| wanted.is_empty() || wanted.contains(&r.criteria_id))
        {
            let entry = counts.entry(result.criteria_id).or_default();
            if result.valid {
                entry.0 += 1;
            } else {
                entry.1 += 1;
                failing.insert(result.polygon_uuid);
            }
        }

        Ok(ValidationSummary {
            total_polygons: polygons.len(),
            polygons_with_failures: failing.len(),
            criteria: counts
                .into_iter()
                .map(|(criteria_id, (valid, invalid))| CriteriaSummary {
                    criteria_id,
                    validation_type: ValidationType::from_criteria_id(criteria_id),
                    valid,
                    invalid,
                })
                .collect(),
        })
    }

    pub async fn get_job(&self, uuid: Uuid) -> EngineResult<JobRecord> {
        self.repository
            .get_job_by_uuid(uuid)
            .await?
            .ok_or(EngineError::JobNotFound(uuid))
    }
}
