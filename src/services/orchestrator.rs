//! Job orchestration workflow
//!
//! Composes the fingerprinter, record store, object storage and compute
//! backend into the per-request state machine:
//!
//! Received → cache lookup → {hit: done} | {miss: stage → record →
//! invoke → finalize → done}
//!
//! Two rules hold everything together: the record uniqueness constraint
//! is the only concurrency guard for a cache key, and every failure
//! after record creation marks the record `failed` before the error is
//! re-raised: a caught error never strands a record in `processing`.

use crate::db::records::{self, NewRecord};
use crate::error::{Error, Result};
use crate::fingerprint::fingerprint;
use crate::models::job::{JobArtifact, JobKind, JobOutcome, JobParams};
use crate::models::record::{ProcessingRecord, RecordState};
use crate::services::compute::{ComputeBackend, ComputeError};
use crate::services::storage::ObjectStore;
use sqlx::SqlitePool;
use std::sync::Arc;

/// One uploaded payload
#[derive(Debug, Clone)]
pub struct Submission {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

impl Submission {
    /// File extension for the staged object, defaulting to mp3 like the
    /// upload clients do.
    fn extension(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => "mp3",
        }
    }
}

/// Outcome returned to the HTTP layer
#[derive(Debug, Clone)]
pub struct JobResult {
    pub artifact: JobArtifact,
    pub backend_job_id: Option<String>,
    pub duration_seconds: Option<f64>,
    pub from_cache: bool,
}

/// Per-request workflow over injected collaborators. Constructed once at
/// startup and shared by every handler through AppState.
pub struct JobOrchestrator {
    db: SqlitePool,
    store: Arc<dyn ObjectStore>,
    backend: Arc<dyn ComputeBackend>,
    staging_folder: String,
}

impl JobOrchestrator {
    pub fn new(
        db: SqlitePool,
        store: Arc<dyn ObjectStore>,
        backend: Arc<dyn ComputeBackend>,
        staging_folder: String,
    ) -> Self {
        Self {
            db,
            store,
            backend,
            staging_folder,
        }
    }

    /// Run one submission through the workflow. Parameters are already
    /// validated by the typed params layer before this is reached.
    pub async fn handle(
        &self,
        kind: JobKind,
        params: JobParams,
        submission: Submission,
    ) -> Result<JobResult> {
        let fp = fingerprint(&submission.bytes);
        let key = params.cache_key();

        tracing::info!(
            kind = %kind,
            fingerprint = %fp,
            filename = %submission.filename,
            size_bytes = submission.bytes.len(),
            "Job submission received"
        );

        if let Some(hit) = records::find_completed(&self.db, fp.as_str(), kind, &key).await? {
            tracing::info!(kind = %kind, fingerprint = %fp, guid = %hit.guid, "Cache hit");
            return cached_result(hit);
        }

        // Cache miss: stage the input before anything touches the store.
        let staged = self
            .store
            .upload(
                &submission.bytes,
                &self.staging_folder,
                submission.extension(),
                &submission.content_type,
            )
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        let record = match records::create(
            &self.db,
            NewRecord {
                fingerprint: fp.as_str().to_string(),
                job_kind: kind,
                job_params: key.clone(),
                source_filename: submission.filename.clone(),
                input_url: staged.url.clone(),
            },
        )
        .await
        {
            Ok(record) => record,
            Err(Error::DuplicateRecord(_)) => {
                // Lost the create race. The winner may have finished while
                // we were staging; serve its result if so, otherwise fail
                // fast with a distinguishable conflict.
                return match records::find_by_key(&self.db, fp.as_str(), kind, &key).await? {
                    Some(row) if row.state == RecordState::Completed => {
                        tracing::info!(kind = %kind, fingerprint = %fp, "Late cache hit after create conflict");
                        cached_result(row)
                    }
                    _ => Err(Error::DuplicateRecord(format!(
                        "a {kind} job for this content is already in flight"
                    ))),
                };
            }
            Err(e) => return Err(e),
        };

        let outcome = match self.backend.invoke(kind, &staged.url, &params).await {
            Ok(outcome) => outcome,
            Err(call_err) => {
                let err = match call_err {
                    ComputeError::Timeout(msg) => Error::ComputeTimeout(msg),
                    ComputeError::Transport(msg) => Error::ComputeTransport(msg),
                };
                self.finalize_failed(&record, &err.to_string()).await;
                return Err(err);
            }
        };

        match outcome {
            JobOutcome::Success {
                artifact,
                backend_job_id,
                duration_seconds,
            } => {
                records::mark_completed(
                    &self.db,
                    record.guid,
                    &artifact,
                    backend_job_id.as_deref(),
                    duration_seconds,
                )
                .await?;

                tracing::info!(
                    kind = %kind,
                    guid = %record.guid,
                    output_url = artifact.url(),
                    duration_seconds,
                    "Job completed"
                );

                Ok(JobResult {
                    artifact,
                    backend_job_id,
                    duration_seconds: Some(duration_seconds),
                    from_cache: false,
                })
            }
            JobOutcome::Failure {
                backend_job_id,
                detail,
            } => {
                tracing::warn!(
                    kind = %kind,
                    guid = %record.guid,
                    backend_job_id = backend_job_id.as_deref().unwrap_or("-"),
                    detail = %detail,
                    "Backend reported failure"
                );
                self.finalize_failed(&record, &detail).await;
                Err(Error::BackendFailure(detail))
            }
        }
    }

    /// Best-effort terminal mark. When the mark itself fails the record is
    /// stranded exactly as a process crash would strand it; log loudly and
    /// let the original error propagate.
    async fn finalize_failed(&self, record: &ProcessingRecord, detail: &str) {
        if let Err(mark_err) = records::mark_failed(&self.db, record.guid, detail).await {
            tracing::error!(
                guid = %record.guid,
                error = %mark_err,
                "Failed to mark record as failed"
            );
        }
    }
}

fn cached_result(record: ProcessingRecord) -> Result<JobResult> {
    let guid = record.guid;
    let artifact = record.output_data.ok_or_else(|| {
        Error::Internal(format!("completed record {guid} is missing output data"))
    })?;

    Ok(JobResult {
        artifact,
        backend_job_id: record.backend_job_id,
        duration_seconds: record.duration_seconds,
        from_cache: true,
    })
}
