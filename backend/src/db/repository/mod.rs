//! Repository trait definitions for the validation engine's collaborators.
//!
//! Each trait covers one store:
//!
//! - [`geometry`]: polygon boundaries, simplicity and area
//! - [`site`]: site/project hierarchy and polygon attributes
//! - [`validation`]: the versioned result store
//! - [`job`]: job records for background runs
//! - [`error`]: error types shared by all of them
//!
//! Services take `Arc<dyn FullRepository>` so a single backend serves every store.

pub mod error;
pub mod geometry;
pub mod job;
pub mod site;
pub mod validation;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

pub use geometry::GeometryRepository;
pub use job::JobRepository;
pub use site::SiteRepository;
pub use validation::ValidationRepository;

/// Composite trait bound for a complete repository implementation.
pub trait FullRepository:
    GeometryRepository + SiteRepository + ValidationRepository + JobRepository
{
}

// Blanket implementation: any type implementing all four traits is a FullRepository
impl<T> FullRepository for T where
    T: GeometryRepository + SiteRepository + ValidationRepository + JobRepository
{
}
