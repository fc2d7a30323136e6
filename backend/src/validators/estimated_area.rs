//! ESTIMATED_AREA: mapped area must reconcile with the site and project goals.
//!
//! The sum of active polygon areas is compared with each level's goal and
//! must fall within [`LOWER_BOUND_RATIO`]..=[`UPPER_BOUND_RATIO`] of it. A
//! level without a positive goal can never reconcile.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{store_failure, Validator};
use crate::db::repository::{FullRepository, SiteRepository};
use crate::error::{EngineError, EngineResult};
use crate::models::{PolygonUuid, PolygonVerdict, SiteUuid, ValidationType, Verdict};

pub const LOWER_BOUND_RATIO: f64 = 0.75;
pub const UPPER_BOUND_RATIO: f64 = 1.25;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reconciliation of an area sum against one goal.
///
/// Bounds are compared on the exact sum; rounding only applies to the
/// reported figures.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LevelCheck {
    sum: f64,
    goal: Option<f64>,
}

impl LevelCheck {
    fn new(sum: f64, goal: Option<f64>) -> Self {
        Self { sum, goal }
    }

    fn target(&self) -> Option<f64> {
        self.goal.filter(|g| *g > 0.0)
    }

    fn percentage(&self) -> Option<f64> {
        self.target().map(|g| self.sum / g * 100.0)
    }

    fn lower(&self) -> Option<f64> {
        self.target().map(|g| g * LOWER_BOUND_RATIO)
    }

    fn upper(&self) -> Option<f64> {
        self.target().map(|g| g * UPPER_BOUND_RATIO)
    }

    fn within_bounds(&self) -> bool {
        match (self.lower(), self.upper()) {
            (Some(lower), Some(upper)) => self.sum >= lower && self.sum <= upper,
            _ => false,
        }
    }
}

fn verdict(site: LevelCheck, project: LevelCheck) -> Verdict {
    Verdict {
        valid: site.within_bounds() && project.within_bounds(),
        extra_info: Some(json!({
            "sumAreaSite": round2(site.sum),
            "sumAreaProject": round2(project.sum),
            "percentageSite": site.percentage().map(round2),
            "percentageProject": project.percentage().map(round2),
            "totalAreaSite": site.goal,
            "totalAreaProject": project.goal,
            "lowerBoundSite": site.lower().map(round2),
            "upperBoundSite": site.upper().map(round2),
            "lowerBoundProject": project.lower().map(round2),
            "upperBoundProject": project.upper().map(round2),
        })),
    }
}

pub struct EstimatedAreaValidator {
    repository: Arc<dyn FullRepository>,
}

impl EstimatedAreaValidator {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self { repository }
    }

    /// The verdict shared by every polygon of `site`.
    async fn site_verdict(&self, site_uuid: SiteUuid) -> EngineResult<Verdict> {
        let fail = store_failure(self.validation_type());
        let site = self
            .repository
            .site(site_uuid)
            .await
            .map_err(&fail)?
            .ok_or_else(|| {
                EngineError::validator_failure(
                    self.validation_type(),
                    format!("site {} referenced by polygon does not exist", site_uuid),
                )
            })?;
        let project = self.repository.project_of(site.uuid).await.map_err(&fail)?;

        let site_sum = self
            .repository
            .sum_active_area_for_site(site.uuid)
            .await
            .map_err(&fail)?;
        let project_sum = self
            .repository
            .sum_active_area_for_project(site.project_uuid)
            .await
            .map_err(&fail)?;

        Ok(verdict(
            LevelCheck::new(site_sum, site.area_goal_hectares),
            LevelCheck::new(project_sum, project.and_then(|p| p.area_goal_hectares)),
        ))
    }
}

#[async_trait]
impl Validator for EstimatedAreaValidator {
    fn validation_type(&self) -> ValidationType {
        ValidationType::EstimatedArea
    }

    async fn validate_polygon(&self, polygon: PolygonUuid) -> EngineResult<Verdict> {
        let details = self
            .repository
            .polygon_details(&[polygon])
            .await
            .map_err(store_failure(self.validation_type()))?;
        let d = details
            .get(&polygon)
            .ok_or(EngineError::PolygonNotFound(polygon))?;
        self.site_verdict(d.site_uuid).await
    }

    /// Polygons are grouped by site so each site's sums are read once.
    async fn validate_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> EngineResult<Vec<PolygonVerdict>> {
        let details = self
            .repository
            .polygon_details(polygons)
            .await
            .map_err(store_failure(self.validation_type()))?;

        let mut by_site: HashMap<SiteUuid, Verdict> = HashMap::new();
        let mut verdicts = Vec::with_capacity(polygons.len());
        for &polygon in polygons {
            let site = details
                .get(&polygon)
                .ok_or(EngineError::PolygonNotFound(polygon))?
                .site_uuid;
            let verdict = match by_site.get(&site) {
                Some(v) => v.clone(),
                None => {
                    let v = self.site_verdict(site).await?;
                    by_site.insert(site, v.clone());
                    v
                }
            };
            verdicts.push(PolygonVerdict::new(polygon, verdict));
        }
        Ok(verdicts)
    }
}
