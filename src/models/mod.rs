//! Domain models

pub mod job;
pub mod record;

pub use job::{JobArtifact, JobKind, JobOutcome, JobParams, SeparateParams, StemCount, StemFile};
pub use record::{ProcessingRecord, RecordState};
