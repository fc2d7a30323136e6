//! Repository implementations.
//!
//! - `local`: in-memory implementation for tests and local development
//! - `postgres`: PostgreSQL/PostGIS implementation with Diesel ORM

use chrono::{DateTime, Duration, Utc};

pub mod local;
#[cfg(feature = "postgres-repo")]
pub mod postgres;

pub use local::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use postgres::{PostgresConfig, PostgresRepository};

/// Timestamp for a result write, strictly later than the result it replaces.
pub(crate) fn next_write_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}
