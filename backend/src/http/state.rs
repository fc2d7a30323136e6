//! Application state for the HTTP server.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::db::repository::FullRepository;
use crate::services::{handler_map, JobQueue, SiteValidationJob, ValidationService};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: ValidationService,
    /// Transport for background site runs
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(service: ValidationService, queue: JobQueue) -> Self {
        Self { service, queue }
    }

    /// State over `repository` with the default checks and a queue sized by `config`.
    ///
    /// No workers are running until [`AppState::start_workers`] is called.
    pub fn from_repository(repository: Arc<dyn FullRepository>, config: &EngineConfig) -> Self {
        Self::new(
            ValidationService::from_config(repository, config),
            JobQueue::new(config.queue_capacity),
        )
    }

    pub fn repository(&self) -> &Arc<dyn FullRepository> {
        self.service.repository()
    }

    /// Spawn `count` workers consuming site validation jobs.
    pub fn start_workers(&self, count: usize) -> Vec<JoinHandle<()>> {
        let handler = Arc::new(SiteValidationJob::new(self.service.clone()));
        self.queue.spawn_workers(count, handler_map(vec![handler]))
    }
}
