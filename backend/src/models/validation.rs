//! Validation criteria and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::polygon::PolygonUuid;

crate::define_id_type!(i32, CriteriaId);

/// Every check known to the engine.
///
/// Some types only have a reserved criteria id and no validator yet; resolving
/// them through the registry fails with `UnknownValidationType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationType {
    Overlapping,
    SelfIntersection,
    PolygonSize,
    WithinCountry,
    Spikes,
    GeometryType,
    EstimatedArea,
    DataCompleteness,
    PlantStartDate,
    DuplicateGeometry,
}

impl ValidationType {
    pub const ALL: [ValidationType; 10] = [
        ValidationType::Overlapping,
        ValidationType::SelfIntersection,
        ValidationType::PolygonSize,
        ValidationType::WithinCountry,
        ValidationType::Spikes,
        ValidationType::GeometryType,
        ValidationType::EstimatedArea,
        ValidationType::DataCompleteness,
        ValidationType::PlantStartDate,
        ValidationType::DuplicateGeometry,
    ];

    /// Stable numeric identifier persisted with every result. Never reassigned.
    pub fn criteria_id(&self) -> CriteriaId {
        CriteriaId(match self {
            ValidationType::Overlapping => 3,
            ValidationType::SelfIntersection => 4,
            ValidationType::PolygonSize => 6,
            ValidationType::WithinCountry => 7,
            ValidationType::Spikes => 8,
            ValidationType::GeometryType => 10,
            ValidationType::EstimatedArea => 12,
            ValidationType::DataCompleteness => 14,
            ValidationType::PlantStartDate => 15,
            ValidationType::DuplicateGeometry => 16,
        })
    }

    pub fn from_criteria_id(id: CriteriaId) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.criteria_id() == id)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationType::Overlapping => "OVERLAPPING",
            ValidationType::SelfIntersection => "SELF_INTERSECTION",
            ValidationType::PolygonSize => "POLYGON_SIZE",
            ValidationType::WithinCountry => "WITHIN_COUNTRY",
            ValidationType::Spikes => "SPIKES",
            ValidationType::GeometryType => "GEOMETRY_TYPE",
            ValidationType::EstimatedArea => "ESTIMATED_AREA",
            ValidationType::DataCompleteness => "DATA_COMPLETENESS",
            ValidationType::PlantStartDate => "PLANT_START_DATE",
            ValidationType::DuplicateGeometry => "DUPLICATE_GEOMETRY",
        }
    }

    /// Whether a failure of this check blocks the polygon from passing.
    ///
    /// Area reconciliation and descriptive metadata checks only raise warnings.
    pub fn is_blocking(&self) -> bool {
        !matches!(
            self,
            ValidationType::EstimatedArea
                | ValidationType::DataCompleteness
                | ValidationType::PlantStartDate
        )
    }
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown validation type: {}", s))
    }
}

/// Outcome of one check against one polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub valid: bool,
    pub extra_info: Option<Value>,
}

impl Verdict {
    pub fn pass() -> Self {
        Self {
            valid: true,
            extra_info: None,
        }
    }

    pub fn pass_with(extra_info: Value) -> Self {
        Self {
            valid: true,
            extra_info: Some(extra_info),
        }
    }

    pub fn fail(extra_info: Option<Value>) -> Self {
        Self {
            valid: false,
            extra_info,
        }
    }
}

/// A verdict tagged with the polygon it belongs to, as returned by batch checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonVerdict {
    pub polygon_uuid: PolygonUuid,
    pub valid: bool,
    pub extra_info: Option<Value>,
}

impl PolygonVerdict {
    pub fn new(polygon_uuid: PolygonUuid, verdict: Verdict) -> Self {
        Self {
            polygon_uuid,
            valid: verdict.valid,
            extra_info: verdict.extra_info,
        }
    }

    pub fn verdict(&self) -> Verdict {
        Verdict {
            valid: self.valid,
            extra_info: self.extra_info.clone(),
        }
    }
}

/// The latest verdict for a (polygon, criteria) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentResult {
    pub polygon_uuid: PolygonUuid,
    pub criteria_id: CriteriaId,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    pub extra_info: Option<Value>,
}

/// Snapshot of a superseded [`CurrentResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricResult {
    pub polygon_uuid: PolygonUuid,
    pub criteria_id: CriteriaId,
    pub valid: bool,
    /// Timestamp of the superseded run.
    pub created_at: DateTime<Utc>,
    pub extra_info: Option<Value>,
    /// When the snapshot was taken.
    pub archived_at: DateTime<Utc>,
}

impl HistoricResult {
    pub fn archive(previous: &CurrentResult, archived_at: DateTime<Utc>) -> Self {
        Self {
            polygon_uuid: previous.polygon_uuid,
            criteria_id: previous.criteria_id,
            valid: previous.valid,
            created_at: previous.created_at,
            extra_info: previous.extra_info.clone(),
            archived_at,
        }
    }
}

/// One entry in a polygon's criteria list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaEntry {
    pub criteria_id: CriteriaId,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    pub extra_info: Option<Value>,
}

impl From<CurrentResult> for CriteriaEntry {
    fn from(result: CurrentResult) -> Self {
        Self {
            criteria_id: result.criteria_id,
            valid: result.valid,
            created_at: result.created_at,
            extra_info: result.extra_info,
        }
    }
}

/// Overall standing of a polygon across its current results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    /// No check has ever run.
    NotChecked,
    /// Every check passed.
    Passed,
    /// Only non-blocking checks failed.
    Partial,
    /// At least one blocking check failed.
    Failed,
}

impl ValidityStatus {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a CriteriaEntry>) -> Self {
        let mut seen = false;
        let mut warning = false;
        for entry in results {
            seen = true;
            if entry.valid {
                continue;
            }
            let blocking = ValidationType::from_criteria_id(entry.criteria_id)
                .map(|t| t.is_blocking())
                .unwrap_or(true);
            if blocking {
                return ValidityStatus::Failed;
            }
            warning = true;
        }
        match (seen, warning) {
            (false, _) => ValidityStatus::NotChecked,
            (true, true) => ValidityStatus::Partial,
            (true, false) => ValidityStatus::Passed,
        }
    }
}

/// Validation state of a single polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonValidation {
    pub polygon_uuid: PolygonUuid,
    pub status: ValidityStatus,
    pub criteria_list: Vec<CriteriaEntry>,
}

impl PolygonValidation {
    pub fn new(polygon_uuid: PolygonUuid, criteria_list: Vec<CriteriaEntry>) -> Self {
        let status = ValidityStatus::from_results(&criteria_list);
        Self {
            polygon_uuid,
            status,
            criteria_list,
        }
    }
}

/// A page of per-polygon validation state for a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteValidationPage {
    pub validations: Vec<PolygonValidation>,
    /// Distinct polygons with at least one result matching the filter.
    pub total: usize,
}

/// Valid/invalid tally for one criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaSummary {
    pub criteria_id: CriteriaId,
    pub validation_type: Option<ValidationType>,
    pub valid: usize,
    pub invalid: usize,
}

/// Aggregate outcome across a polygon set, stored as a job payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_polygons: usize,
    pub polygons_with_failures: usize,
    pub criteria: Vec<CriteriaSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_criteria_ids_are_stable() {
        assert_eq!(ValidationType::SelfIntersection.criteria_id(), CriteriaId(4));
        assert_eq!(ValidationType::PolygonSize.criteria_id(), CriteriaId(6));
        assert_eq!(ValidationType::Spikes.criteria_id(), CriteriaId(8));
        assert_eq!(ValidationType::EstimatedArea.criteria_id(), CriteriaId(12));
        assert_eq!(ValidationType::DataCompleteness.criteria_id(), CriteriaId(14));
        assert_eq!(ValidationType::PlantStartDate.criteria_id(), CriteriaId(15));
        assert_eq!(ValidationType::DuplicateGeometry.criteria_id(), CriteriaId(16));
    }

    #[test]
    fn test_criteria_ids_are_unique() {
        let mut ids: Vec<i32> = ValidationType::ALL
            .iter()
            .map(|t| t.criteria_id().value())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ValidationType::ALL.len());
    }

    #[test]
    fn test_round_trip_through_criteria_id() {
        for t in ValidationType::ALL {
            assert_eq!(ValidationType::from_criteria_id(t.criteria_id()), Some(t));
        }
        assert_eq!(ValidationType::from_criteria_id(CriteriaId(99)), None);
    }

    #[test]
    fn test_parse_validation_type() {
        assert_eq!(
            "SELF_INTERSECTION".parse::<ValidationType>().unwrap(),
            ValidationType::SelfIntersection
        );
        assert_eq!(
            "plant-start-date".parse::<ValidationType>().unwrap(),
            ValidationType::PlantStartDate
        );
        assert!("NOT_A_CHECK".parse::<ValidationType>().is_err());
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&ValidationType::EstimatedArea).unwrap();
        assert_eq!(json, "\"ESTIMATED_AREA\"");
    }

    fn entry(t: ValidationType, valid: bool) -> CriteriaEntry {
        CriteriaEntry {
            criteria_id: t.criteria_id(),
            valid,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            extra_info: None,
        }
    }

    #[test]
    fn test_validity_status() {
        assert_eq!(
            ValidityStatus::from_results(&Vec::<CriteriaEntry>::new()),
            ValidityStatus::NotChecked
        );
        assert_eq!(
            ValidityStatus::from_results(&[entry(ValidationType::Spikes, true)]),
            ValidityStatus::Passed
        );
        assert_eq!(
            ValidityStatus::from_results(&[
                entry(ValidationType::Spikes, true),
                entry(ValidationType::EstimatedArea, false),
            ]),
            ValidityStatus::Partial
        );
        assert_eq!(
            ValidityStatus::from_results(&[
                entry(ValidationType::EstimatedArea, false),
                entry(ValidationType::SelfIntersection, false),
            ]),
            ValidityStatus::Failed
        );
    }
}
