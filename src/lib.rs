//! stemgate - deduplicating gateway in front of GPU audio workers
//!
//! Accepts audio uploads, fingerprints them, and either replays a prior
//! completed result or stages the input, records the attempt, and drives
//! one synchronous worker invocation to a durable terminal state.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod models;
pub mod services;

pub use crate::error::{Error, Result};

use crate::services::JobOrchestrator;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Workflow kernel over the injected storage and compute collaborators
    pub orchestrator: Arc<JobOrchestrator>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, orchestrator: Arc<JobOrchestrator>) -> Self {
        Self {
            db,
            orchestrator,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::job_routes())
        .merge(api::health_routes())
        .with_state(state)
}
