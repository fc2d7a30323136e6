//! Domain models shared by the validators, stores and services.

pub mod job;
pub mod macros;
pub mod polygon;
pub mod validation;

pub use job::{progress_message, JobId, JobRecord, JobStatus};
pub use polygon::{
    Coordinate, PolygonAttributes, PolygonDetails, PolygonRecord, PolygonUuid, ProjectRecord,
    ProjectUuid, Ring, SiteRecord, SiteUuid,
};
pub use validation::{
    CriteriaEntry, CriteriaId, CriteriaSummary, CurrentResult, HistoricResult, PolygonValidation,
    PolygonVerdict, SiteValidationPage, ValidationSummary, ValidationType, ValidityStatus,
    Verdict,
};
