//! # Polygon Validation Engine
//!
//! Quality checks for land-restoration polygons and a versioned store of
//! their outcomes.
//!
//! ## Features
//!
//! - **Checks**: geometric (self-intersection, spikes, size), metadata
//!   (attribute completeness, plant start date) and area reconciliation
//!   against site and project goals
//! - **Result store**: one current verdict per polygon and check, with every
//!   superseded verdict kept as history
//! - **Site runs**: chunked background validation of whole sites with
//!   pollable progress
//! - **HTTP API**: REST endpoints and SSE job progress (feature `http-server`)
//!
//! ## Architecture
//!
//! - [`models`]: identifiers, geometry and result types
//! - [`algorithms`]: ring geometry used by the in-memory backend
//! - [`validators`]: the [`validators::Validator`] trait, the six checks and
//!   the criteria registry
//! - [`services`]: validation service, job queue and site validation jobs
//! - [`db`]: repository traits and the local/Postgres backends
//! - [`config`], [`error`]: engine settings and the error taxonomy
//! - [`http`]: Axum-based HTTP server and request handlers

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod algorithms;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod validators;

#[cfg(feature = "http-server")]
pub mod http;

pub use error::{EngineError, EngineResult};
