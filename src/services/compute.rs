//! Compute backend client
//!
//! The worker fleet exposes one synchronous job-submission endpoint per
//! job kind, authenticated with a bearer key. A call either returns a
//! terminal envelope (`COMPLETED` with an output object, or any other
//! status) or fails at the transport level. One attempt per call; retry
//! policy belongs to the caller, and this service performs none.

use crate::config::ComputeConfig;
use crate::error::{Error, Result};
use crate::models::job::{JobArtifact, JobKind, JobOutcome, JobParams, StemFile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error as ThisError;

/// Call-level failures: the HTTP exchange itself did not complete. These
/// never carry a `JobOutcome`; the backend may or may not have seen the
/// request.
#[derive(Debug, ThisError)]
pub enum ComputeError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Synchronous-looking façade over the external compute backend
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    async fn invoke(
        &self,
        kind: JobKind,
        input_url: &str,
        params: &JobParams,
    ) -> std::result::Result<JobOutcome, ComputeError>;
}

/// Worker response envelope, shared by all job kinds. Timings are
/// reported in milliseconds; `delayTime` is the worker queue delay.
#[derive(Debug, Deserialize)]
struct WorkerEnvelope {
    #[serde(default)]
    id: Option<String>,
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(rename = "executionTime", default)]
    execution_time_ms: Option<f64>,
    #[serde(rename = "delayTime", default)]
    delay_time_ms: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WorkerInput<'a> {
    Audio {
        audio_url: &'a str,
    },
    Separate {
        audio_url: &'a str,
        stems: u8,
        format: &'a str,
        bitrate: &'a str,
    },
}

#[derive(Debug, Serialize)]
struct WorkerRequest<'a> {
    input: WorkerInput<'a>,
}

/// Transcription output fields
#[derive(Debug, Deserialize)]
struct MidiOutput {
    midi_url: String,
}

/// Separation output fields
#[derive(Debug, Deserialize)]
struct StemsOutput {
    download_url: String,
    #[serde(default)]
    files: Vec<StemFile>,
    #[serde(default)]
    size_mb: Option<f64>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    bitrate: Option<String>,
}

/// RunPod-style worker API client
pub struct RunpodClient {
    http: reqwest::Client,
    api_key: String,
    transcribe_endpoint: String,
    separate_endpoint: String,
    multitrack_endpoint: String,
    request_timeout_secs: u64,
}

impl RunpodClient {
    /// Build a client with a short connect timeout and a long total
    /// timeout sized for compute-heavy workers.
    pub fn new(config: &ComputeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build compute client: {e}")))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            transcribe_endpoint: config.transcribe_endpoint.clone(),
            separate_endpoint: config.separate_endpoint.clone(),
            multitrack_endpoint: config.multitrack_endpoint.clone(),
            request_timeout_secs: config.request_timeout_secs,
        })
    }

    fn endpoint_for(&self, kind: JobKind) -> &str {
        match kind {
            JobKind::Transcribe => &self.transcribe_endpoint,
            JobKind::Separate => &self.separate_endpoint,
            JobKind::Multitrack => &self.multitrack_endpoint,
        }
    }

    fn classify(&self, e: reqwest::Error) -> ComputeError {
        if e.is_timeout() {
            ComputeError::Timeout(format!(
                "no response within {}s: {e}",
                self.request_timeout_secs
            ))
        } else {
            ComputeError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ComputeBackend for RunpodClient {
    async fn invoke(
        &self,
        kind: JobKind,
        input_url: &str,
        params: &JobParams,
    ) -> std::result::Result<JobOutcome, ComputeError> {
        let endpoint = self.endpoint_for(kind);
        let request = build_request(kind, input_url, params);

        tracing::info!(kind = %kind, endpoint = %endpoint, input_url = %input_url, "Invoking compute backend");

        let response = self
            .http
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(kind = %kind, status = %status, "Backend returned non-success status");
            return Ok(JobOutcome::Failure {
                backend_job_id: None,
                detail: format!("backend returned {status}: {body}"),
            });
        }

        let envelope: WorkerEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) if e.is_timeout() => return Err(self.classify(e)),
            Err(e) => {
                return Ok(JobOutcome::Failure {
                    backend_job_id: None,
                    detail: format!("malformed backend response: {e}"),
                })
            }
        };

        Ok(outcome_from_envelope(kind, envelope))
    }
}

fn build_request<'a>(
    kind: JobKind,
    audio_url: &'a str,
    params: &'a JobParams,
) -> WorkerRequest<'a> {
    // The submit layer always pairs Separate with its params.
    let input = match (kind, params) {
        (JobKind::Separate, JobParams::Separate(p)) => WorkerInput::Separate {
            audio_url,
            stems: p.stems.as_u8(),
            format: &p.format,
            bitrate: &p.bitrate,
        },
        _ => WorkerInput::Audio { audio_url },
    };
    WorkerRequest { input }
}

/// Reduce a worker envelope to the uniform outcome. `COMPLETED` with a
/// well-formed output object is the only success; everything else is a
/// failure with the reason captured.
fn outcome_from_envelope(kind: JobKind, envelope: WorkerEnvelope) -> JobOutcome {
    if envelope.status != "COMPLETED" {
        return JobOutcome::Failure {
            backend_job_id: envelope.id,
            detail: format!("backend job ended with status {:?}", envelope.status),
        };
    }

    let Some(output) = envelope.output else {
        return JobOutcome::Failure {
            backend_job_id: envelope.id,
            detail: "backend reported COMPLETED without an output object".to_string(),
        };
    };

    match parse_artifact(kind, output) {
        Ok(artifact) => JobOutcome::Success {
            artifact,
            backend_job_id: envelope.id,
            duration_seconds: (envelope.execution_time_ms.unwrap_or(0.0)
                + envelope.delay_time_ms.unwrap_or(0.0))
                / 1000.0,
        },
        Err(detail) => JobOutcome::Failure {
            backend_job_id: envelope.id,
            detail,
        },
    }
}

fn parse_artifact(
    kind: JobKind,
    output: serde_json::Value,
) -> std::result::Result<JobArtifact, String> {
    match kind {
        JobKind::Transcribe | JobKind::Multitrack => {
            let parsed: MidiOutput = serde_json::from_value(output)
                .map_err(|e| format!("malformed transcription output: {e}"))?;
            Ok(JobArtifact::Midi {
                midi_url: parsed.midi_url,
            })
        }
        JobKind::Separate => {
            let parsed: StemsOutput = serde_json::from_value(output)
                .map_err(|e| format!("malformed separation output: {e}"))?;
            Ok(JobArtifact::StemArchive {
                download_url: parsed.download_url,
                files: parsed.files,
                size_mb: parsed.size_mb,
                format: parsed.format,
                bitrate: parsed.bitrate,
            })
        }
    }
}
