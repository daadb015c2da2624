//! Processing record model
//!
//! One row per (fingerprint, job_kind, job_params) key, tracking a single
//! backend attempt through `processing` to exactly one terminal state.

use crate::error::Error;
use crate::models::job::{JobArtifact, JobKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Processing,
    Completed,
    Failed,
}

impl RecordState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Processing => "processing",
            RecordState::Completed => "completed",
            RecordState::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> crate::error::Result<Self> {
        match value {
            "processing" => Ok(RecordState::Processing),
            "completed" => Ok(RecordState::Completed),
            "failed" => Ok(RecordState::Failed),
            other => Err(Error::Internal(format!(
                "unknown record state in database: {other:?}"
            ))),
        }
    }
}

/// Durable processing attempt
#[derive(Debug, Clone)]
pub struct ProcessingRecord {
    pub guid: Uuid,
    pub fingerprint: String,
    pub job_kind: JobKind,
    /// Canonical parameter key ("" for parameterless kinds)
    pub job_params: String,
    pub source_filename: String,
    pub input_url: String,
    pub output_url: Option<String>,
    pub output_data: Option<JobArtifact>,
    pub state: RecordState,
    pub backend_job_id: Option<String>,
    pub error_detail: Option<String>,
    pub duration_seconds: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingRecord {
    pub fn is_terminal(&self) -> bool {
        self.state != RecordState::Processing
    }
}
