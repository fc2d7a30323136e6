//! Service layer for validation runs and result queries.
//!
//! Services sit between the transport (HTTP handlers, queue workers) and the
//! repositories. They resolve checks through the criteria registry, write
//! verdicts through the result store and drive background site runs.

pub mod job_queue;
pub mod site_validation_job;
pub mod validation_service;

pub use job_queue::{handler_map, HandlerMap, JobHandler, JobQueue, QueueMessage};
pub use site_validation_job::{
    enqueue_site_validation, SiteValidationJob, SiteValidationPayload, CHUNK_SIZE,
    SITE_VALIDATION_JOB,
};
pub use validation_service::{ValidationService, MAX_PAGE_SIZE};
