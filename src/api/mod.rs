//! HTTP API surface

mod health;
mod jobs;

pub use health::{health_check, health_routes, HealthResponse};
pub use jobs::{job_routes, SeparateResponse, TranscriptionResponse};
