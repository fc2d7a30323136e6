//! Persistence layer for the validation engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Services (validation service, site validation job)     │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │ Arc<dyn FullRepository>
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits: Geometry / Site / Validation / Job   │
//! └───────────────────┬─────────────────────────────────────┘
//!          ┌──────────┴───────────┐
//!   LocalRepository        PostgresRepository
//!    (in-memory)         (Diesel + PostGIS, feature
//!                           `postgres-repo`)
//! ```
//!
//! Use [`RepositoryFactory`] or [`RepositoryBuilder`] to pick a backend, or
//! [`init_repository`]/[`get_repository`] for the process-wide instance.

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod repo_config;
pub mod repositories;
pub mod repository;

#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::PostgresConfig;
#[cfg(not(feature = "postgres-repo"))]
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    _private: (),
}

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use repo_config::RepositoryConfig;
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    ErrorContext, FullRepository, GeometryRepository, JobRepository, RepositoryError,
    RepositoryResult, SiteRepository, ValidationRepository,
};

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

/// Global repository instance initialized once per process.
static REPOSITORY: OnceLock<Arc<dyn FullRepository>> = OnceLock::new();

/// Initialize the global repository from `repository.toml` when present,
/// otherwise from the environment.
pub async fn init_repository() -> Result<&'static Arc<dyn FullRepository>> {
    if let Some(repo) = REPOSITORY.get() {
        return Ok(repo);
    }

    let repo = match RepositoryConfig::from_default_location() {
        Ok(config) => RepositoryFactory::from_repository_config(&config)
            .await
            .context("Failed to create repository from repository.toml")?,
        Err(_) => RepositoryFactory::from_env()
            .await
            .context("Failed to create repository from environment")?,
    };

    // A concurrent initializer may have won; either instance is equivalent.
    let _ = REPOSITORY.set(repo);
    get_repository()
}

/// Get a reference to the global repository instance.
pub fn get_repository() -> Result<&'static Arc<dyn FullRepository>> {
    REPOSITORY
        .get()
        .context("Repository not initialized. Call init_repository() first.")
}
