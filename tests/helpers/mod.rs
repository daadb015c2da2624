//! Shared test fixtures: in-memory pools and scripted collaborators
//! substituted through the ObjectStore / ComputeBackend seams.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stemgate::models::job::{
    JobArtifact, JobKind, JobOutcome, JobParams, SeparateParams, StemCount, StemFile,
};
use stemgate::services::{
    ComputeBackend, ComputeError, JobOrchestrator, ObjectStore, StorageError, StoredObject,
    Submission,
};

/// In-memory pool with the schema applied
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    stemgate::db::init_tables(&pool).await.unwrap();
    pool
}

/// In-memory object store counting uploads
pub struct MemoryStore {
    pub uploads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            uploads: AtomicUsize::new(0),
        })
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(
        &self,
        _bytes: &[u8],
        folder: &str,
        extension: &str,
        _content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(StoredObject {
            url: format!("s3://bucket/{folder}/staged-{n}.{extension}"),
        })
    }
}

/// Object store whose bucket is always unavailable
pub struct BrokenStore;

#[async_trait]
impl ObjectStore for BrokenStore {
    async fn upload(
        &self,
        _bytes: &[u8],
        _folder: &str,
        _extension: &str,
        _content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        Err(StorageError::Upload("bucket unavailable".to_string()))
    }
}

/// What the scripted backend does on every call
#[derive(Debug, Clone)]
pub enum Reply {
    Midi,
    Stems,
    Failure(String),
    Timeout,
    Transport,
}

/// Compute backend with a fixed reply and a call counter
pub struct ScriptedBackend {
    calls: AtomicUsize,
    reply: Reply,
    delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply,
            delay: None,
        })
    }

    pub fn with_delay(reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply,
            delay: Some(delay),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn midi_artifact() -> JobArtifact {
    JobArtifact::Midi {
        midi_url: "s3://bucket/out/result.mid".to_string(),
    }
}

pub fn stems_artifact() -> JobArtifact {
    JobArtifact::StemArchive {
        download_url: "s3://bucket/out.zip".to_string(),
        files: vec![StemFile {
            name: "vocals.mp3".to_string(),
            size_kb: 2048.0,
        }],
        size_mb: Some(4.0),
        format: Some("mp3".to_string()),
        bitrate: Some("192k".to_string()),
    }
}

#[async_trait]
impl ComputeBackend for ScriptedBackend {
    async fn invoke(
        &self,
        _kind: JobKind,
        _input_url: &str,
        _params: &JobParams,
    ) -> Result<JobOutcome, ComputeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Reply::Midi => Ok(JobOutcome::Success {
                artifact: midi_artifact(),
                backend_job_id: Some("rp-test".to_string()),
                duration_seconds: 12.5,
            }),
            Reply::Stems => Ok(JobOutcome::Success {
                artifact: stems_artifact(),
                backend_job_id: Some("rp-test".to_string()),
                duration_seconds: 12.5,
            }),
            Reply::Failure(detail) => Ok(JobOutcome::Failure {
                backend_job_id: Some("rp-test".to_string()),
                detail: detail.clone(),
            }),
            Reply::Timeout => Err(ComputeError::Timeout(
                "no response within 300s".to_string(),
            )),
            Reply::Transport => Err(ComputeError::Transport("connection refused".to_string())),
        }
    }
}

pub fn orchestrator(
    pool: &SqlitePool,
    store: Arc<dyn ObjectStore>,
    backend: Arc<dyn ComputeBackend>,
) -> JobOrchestrator {
    JobOrchestrator::new(pool.clone(), store, backend, "staged".to_string())
}

pub fn submission(bytes: &[u8]) -> Submission {
    Submission {
        bytes: bytes.to_vec(),
        filename: "song.mp3".to_string(),
        content_type: "audio/mpeg".to_string(),
    }
}

pub fn separate_params(stems: u8) -> JobParams {
    JobParams::Separate(SeparateParams {
        stems: StemCount::try_from(stems).unwrap(),
        ..Default::default()
    })
}

pub async fn record_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM processing_records")
        .fetch_one(pool)
        .await
        .unwrap()
}
