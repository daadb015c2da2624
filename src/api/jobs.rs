//! Job submission handlers
//!
//! One multipart POST per job kind plus the per-kind liveness probes the
//! upload clients poll. Parameter validation happens here, before any
//! fingerprinting or staging work.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::job::{JobArtifact, JobKind, JobParams, SeparateParams, StemCount, StemFile};
use crate::services::Submission;
use crate::AppState;

/// Uploads are whole audio files; the axum default of 2 MB is far too
/// small.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Transcription response (transcribe and multitrack share the shape)
#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub status: String,
    pub message: String,
    pub midi_url: String,
    pub from_cache: bool,
    pub job_id: Option<String>,
}

/// Separation response
#[derive(Debug, Serialize)]
pub struct SeparateResponse {
    pub status: String,
    pub message: String,
    pub download_url: String,
    pub files: Vec<StemFile>,
    pub size_mb: Option<f64>,
    pub from_cache: bool,
    pub job_id: Option<String>,
}

/// Parsed multipart upload: the file part plus any text fields
struct UploadForm {
    submission: Option<Submission>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    fn take_submission(self) -> Result<Submission> {
        self.submission
            .ok_or_else(|| Error::InvalidInput("missing file field in multipart body".to_string()))
    }
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm {
        submission: None,
        fields: HashMap::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "file" {
            let filename = field.file_name().unwrap_or("upload.mp3").to_string();
            let content_type = field.content_type().unwrap_or("audio/mpeg").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::InvalidInput(format!("failed to read upload: {e}")))?;
            form.submission = Some(Submission {
                bytes: bytes.to_vec(),
                filename,
                content_type,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| Error::InvalidInput(format!("failed to read field {name:?}: {e}")))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

/// POST /api/transcribe: single-track piano transcription
pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TranscriptionResponse>> {
    submit_transcription(state, JobKind::Transcribe, multipart, "transcription complete").await
}

/// POST /api/multitrack: multi-track transcription
pub async fn multitrack(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<TranscriptionResponse>> {
    submit_transcription(state, JobKind::Multitrack, multipart, "multitrack transcription complete")
        .await
}

async fn submit_transcription(
    state: AppState,
    kind: JobKind,
    multipart: Multipart,
    done_message: &str,
) -> Result<Json<TranscriptionResponse>> {
    let submission = read_form(multipart).await?.take_submission()?;

    let result = state
        .orchestrator
        .handle(kind, JobParams::None, submission)
        .await?;

    match result.artifact {
        JobArtifact::Midi { midi_url } => Ok(Json(TranscriptionResponse {
            status: "success".to_string(),
            message: message_for(result.from_cache, done_message),
            midi_url,
            from_cache: result.from_cache,
            job_id: result.backend_job_id,
        })),
        JobArtifact::StemArchive { .. } => Err(Error::Internal(format!(
            "{kind} job produced a separation artifact"
        ))),
    }
}

/// POST /api/separate: multi-stem separation
pub async fn separate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SeparateResponse>> {
    let form = read_form(multipart).await?;

    // Validate stems before the payload is even looked at.
    let stems_value: u8 = match form.fields.get("stems").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(text) => text
            .parse()
            .map_err(|_| Error::InvalidInput(format!("stems must be a number (got {text:?})")))?,
        None => 2,
    };
    let stems = StemCount::try_from(stems_value)?;

    let params = SeparateParams {
        stems,
        format: form
            .fields
            .get("format")
            .cloned()
            .unwrap_or_else(|| "mp3".to_string()),
        bitrate: form
            .fields
            .get("bitrate")
            .cloned()
            .unwrap_or_else(|| "192k".to_string()),
    };

    let submission = form.take_submission()?;

    let result = state
        .orchestrator
        .handle(JobKind::Separate, JobParams::Separate(params), submission)
        .await?;

    match result.artifact {
        JobArtifact::StemArchive {
            download_url,
            files,
            size_mb,
            ..
        } => Ok(Json(SeparateResponse {
            status: "success".to_string(),
            message: message_for(result.from_cache, "separation complete"),
            download_url,
            files,
            size_mb,
            from_cache: result.from_cache,
            job_id: result.backend_job_id,
        })),
        JobArtifact::Midi { .. } => Err(Error::Internal(
            "separate job produced a transcription artifact".to_string(),
        )),
    }
}

fn message_for(from_cache: bool, done_message: &str) -> String {
    if from_cache {
        "served from cache".to_string()
    } else {
        done_message.to_string()
    }
}

async fn kind_health(kind: JobKind) -> Json<serde_json::Value> {
    Json(json!({"status": "healthy", "service": kind.as_str()}))
}

async fn transcribe_health() -> Json<serde_json::Value> {
    kind_health(JobKind::Transcribe).await
}

async fn separate_health() -> Json<serde_json::Value> {
    kind_health(JobKind::Separate).await
}

async fn multitrack_health() -> Json<serde_json::Value> {
    kind_health(JobKind::Multitrack).await
}

/// Build job submission routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/transcribe", post(transcribe))
        .route("/api/transcribe/health", get(transcribe_health))
        .route("/api/separate", post(separate))
        .route("/api/separate/health", get(separate_health))
        .route("/api/multitrack", post(multitrack))
        .route("/api/multitrack/health", get(multitrack_health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
