//! Job kinds, parameters and outcomes
//!
//! A job kind names one backend workflow; job parameters are the subset of
//! request fields that change the backend's output and therefore take part
//! in the cache key. Stem separation keys on the stem count only; output
//! format and bitrate are pass-through backend inputs, matching the keying
//! of the worker fleet this service fronts.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend workflow category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Single-track (piano) transcription to MIDI
    Transcribe,
    /// Multi-stem separation to a ZIP of stem files
    Separate,
    /// Multi-track transcription to MIDI
    Multitrack,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Transcribe => "transcribe",
            JobKind::Separate => "separate",
            JobKind::Multitrack => "multitrack",
        }
    }

    /// Parse the database representation. Case-sensitive.
    pub fn parse(value: &str) -> crate::error::Result<Self> {
        match value {
            "transcribe" => Ok(JobKind::Transcribe),
            "separate" => Ok(JobKind::Separate),
            "multitrack" => Ok(JobKind::Multitrack),
            other => Err(Error::Internal(format!("unknown job kind in database: {other:?}"))),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stem count for separation jobs. Only 2, 4 and 5 exist as worker models;
/// anything else is rejected before fingerprinting or staging happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StemCount {
    Two,
    Four,
    Five,
}

impl StemCount {
    pub fn as_u8(&self) -> u8 {
        match self {
            StemCount::Two => 2,
            StemCount::Four => 4,
            StemCount::Five => 5,
        }
    }
}

impl TryFrom<u8> for StemCount {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(StemCount::Two),
            4 => Ok(StemCount::Four),
            5 => Ok(StemCount::Five),
            other => Err(Error::InvalidInput(format!(
                "stems must be 2, 4 or 5 (got {other})"
            ))),
        }
    }
}

/// Parameters for a separation job
#[derive(Debug, Clone, PartialEq)]
pub struct SeparateParams {
    pub stems: StemCount,
    /// Output format passed through to the worker (default "mp3")
    pub format: String,
    /// Output bitrate passed through to the worker (default "192k")
    pub bitrate: String,
}

impl Default for SeparateParams {
    fn default() -> Self {
        Self {
            stems: StemCount::Two,
            format: "mp3".to_string(),
            bitrate: "192k".to_string(),
        }
    }
}

/// Kind-specific job parameters
#[derive(Debug, Clone, PartialEq)]
pub enum JobParams {
    /// Parameterless kinds (transcribe, multitrack)
    None,
    Separate(SeparateParams),
}

impl JobParams {
    /// Canonical cache-key fragment. Empty for parameterless kinds so the
    /// uniqueness index compares equal strings rather than NULLs.
    pub fn cache_key(&self) -> String {
        match self {
            JobParams::None => String::new(),
            JobParams::Separate(p) => format!("stems={}", p.stems.as_u8()),
        }
    }
}

/// One produced stem file, as reported by the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemFile {
    pub name: String,
    pub size_kb: f64,
}

/// Artifact produced by a completed job. Serialized into the record's
/// `output_data` column and replayed verbatim on cache hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobArtifact {
    Midi {
        midi_url: String,
    },
    StemArchive {
        download_url: String,
        files: Vec<StemFile>,
        size_mb: Option<f64>,
        format: Option<String>,
        bitrate: Option<String>,
    },
}

impl JobArtifact {
    /// The artifact locator persisted as `output_url`
    pub fn url(&self) -> &str {
        match self {
            JobArtifact::Midi { midi_url } => midi_url,
            JobArtifact::StemArchive { download_url, .. } => download_url,
        }
    }
}

/// Normalized result of one backend invocation. Call-level failures
/// (timeout, transport) do not produce an outcome; see `ComputeError`.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Success {
        artifact: JobArtifact,
        backend_job_id: Option<String>,
        /// Backend-reported wall clock, including its internal queue delay
        duration_seconds: f64,
    },
    Failure {
        backend_job_id: Option<String>,
        detail: String,
    },
}
