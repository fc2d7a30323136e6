//! PLANT_START_DATE: planting must fall inside the programme window and not
//! precede its site's establishment.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::json;

use super::{in_order, store_failure, Validator};
use crate::db::repository::{FullRepository, SiteRepository};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    PolygonDetails, PolygonUuid, PolygonVerdict, SiteRecord, SiteUuid, ValidationType, Verdict,
};

/// No planting before the restoration programme began is accepted.
pub const EARLIEST_PLANT_START: NaiveDate = match NaiveDate::from_ymd_opt(2018, 1, 1) {
    Some(d) => d,
    None => panic!("invalid programme start date"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateError {
    MissingValue,
    DateTooEarly,
    DateInFuture,
    DateBeforeSiteStart,
}

impl DateError {
    fn as_str(&self) -> &'static str {
        match self {
            DateError::MissingValue => "MISSING_VALUE",
            DateError::DateTooEarly => "DATE_TOO_EARLY",
            DateError::DateInFuture => "DATE_IN_FUTURE",
            DateError::DateBeforeSiteStart => "DATE_BEFORE_SITE_START",
        }
    }

    fn message(&self, min_allowed: NaiveDate, today: NaiveDate) -> String {
        match self {
            DateError::MissingValue => "Plant start date is missing".to_string(),
            DateError::DateTooEarly => {
                format!("Plant start date must be on or after {}", EARLIEST_PLANT_START)
            }
            DateError::DateInFuture => {
                format!("Plant start date cannot be later than today ({})", today)
            }
            DateError::DateBeforeSiteStart => {
                format!("Plant start date must be on or after the site start date ({})", min_allowed)
            }
        }
    }
}

pub struct PlantStartDateValidator {
    repository: Arc<dyn FullRepository>,
}

impl PlantStartDateValidator {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self { repository }
    }

    async fn sites_for(
        &self,
        details: &HashMap<PolygonUuid, PolygonDetails>,
    ) -> EngineResult<HashMap<SiteUuid, SiteRecord>> {
        let mut sites = HashMap::new();
        for d in details.values() {
            if sites.contains_key(&d.site_uuid) {
                continue;
            }
            if let Some(site) = self
                .repository
                .site(d.site_uuid)
                .await
                .map_err(store_failure(self.validation_type()))?
            {
                sites.insert(d.site_uuid, site);
            }
        }
        Ok(sites)
    }
}

fn check(details: &PolygonDetails, site: Option<&SiteRecord>, today: NaiveDate) -> Verdict {
    let site_start = site.and_then(|s| s.start_date);
    let min_allowed = site_start.map_or(EARLIEST_PLANT_START, |s| s.max(EARLIEST_PLANT_START));
    let provided = details.attributes.plantstart;

    let error = match provided {
        None => Some(DateError::MissingValue),
        Some(d) if d < EARLIEST_PLANT_START => Some(DateError::DateTooEarly),
        Some(d) if d > today => Some(DateError::DateInFuture),
        Some(d) if site_start.is_some_and(|s| d < s) => Some(DateError::DateBeforeSiteStart),
        Some(_) => None,
    };

    match error {
        None => Verdict::pass(),
        Some(error) => Verdict::fail(Some(json!({
            "errorType": error.as_str(),
            "polygonUuid": details.uuid,
            "polygonName": details.attributes.poly_name,
            "siteName": site.map(|s| s.name.clone()),
            "providedValue": provided.map(|d| d.to_string()),
            "minAllowedDate": min_allowed.to_string(),
            "siteStartDate": site_start.map(|d| d.to_string()),
            "errorMessage": error.message(min_allowed, today),
        }))),
    }
}

#[async_trait]
impl Validator for PlantStartDateValidator {
    fn validation_type(&self) -> ValidationType {
        ValidationType::PlantStartDate
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
        let site = self
            .repository
            .site_of(polygon)
            .await
            .map_err(store_failure(self.validation_type()))?;
        Ok(check(d, site.as_ref(), Utc::now().date_naive()))
    }

    async fn validate_polygons(
        &self,
        polygons: &[PolygonUuid],
    ) -> EngineResult<Vec<PolygonVerdict>> {
        let details = self
            .repository
            .polygon_details(polygons)
            .await
            .map_err(store_failure(self.validation_type()))?;
        let ordered = in_order(polygons, &details)?;
        let sites = self.sites_for(&details).await?;
        let today = Utc::now().date_naive();
        Ok(ordered
            .into_iter()
            .map(|(p, d)| PolygonVerdict::new(p, check(d, sites.get(&d.site_uuid), today)))
            .collect())
    }
}
