//! Processing record persistence
//!
//! Every mutation is a single atomic row operation; no transaction ever
//! spans the staging or backend calls. Uniqueness of the
//! (fingerprint, job_kind, job_params) key is enforced by the database
//! index, and the two state transitions are guarded by `WHERE state =
//! 'processing'` so a lost race surfaces as zero affected rows instead of
//! silently overwriting a terminal record.

use crate::error::{Error, Result};
use crate::models::job::{JobArtifact, JobKind};
use crate::models::record::{ProcessingRecord, RecordState};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Fields for a new processing attempt
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub fingerprint: String,
    pub job_kind: JobKind,
    pub job_params: String,
    pub source_filename: String,
    pub input_url: String,
}

const RECORD_COLUMNS: &str = "guid, fingerprint, job_kind, job_params, source_filename, \
     input_url, output_url, output_data, state, backend_job_id, error_detail, \
     duration_seconds, created_at, updated_at";

/// Lookup a completed record for a cache key.
///
/// Records in `processing` or `failed` state are cache misses: a prior
/// failure or in-flight attempt never short-circuits a new request.
pub async fn find_completed(
    pool: &SqlitePool,
    fingerprint: &str,
    job_kind: JobKind,
    job_params: &str,
) -> Result<Option<ProcessingRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM processing_records \
         WHERE fingerprint = ? AND job_kind = ? AND job_params = ? AND state = 'completed'"
    ))
    .bind(fingerprint)
    .bind(job_kind.as_str())
    .bind(job_params)
    .fetch_optional(pool)
    .await?;

    row.map(map_row).transpose()
}

/// Lookup the record for a cache key in any state. Used after a create
/// conflict to decide between a late cache hit and a duplicate-in-flight
/// rejection.
pub async fn find_by_key(
    pool: &SqlitePool,
    fingerprint: &str,
    job_kind: JobKind,
    job_params: &str,
) -> Result<Option<ProcessingRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM processing_records \
         WHERE fingerprint = ? AND job_kind = ? AND job_params = ?"
    ))
    .bind(fingerprint)
    .bind(job_kind.as_str())
    .bind(job_params)
    .fetch_optional(pool)
    .await?;

    row.map(map_row).transpose()
}

/// Create a new attempt in `processing` state.
///
/// A prior `failed` row for the same key is superseded in place (one
/// atomic UPDATE resetting it to a fresh attempt), keeping exactly one
/// row per key. Otherwise a new row is inserted; a uniqueness violation
/// means another request already holds the slot and is reported as
/// `Error::DuplicateRecord`.
pub async fn create(pool: &SqlitePool, new: NewRecord) -> Result<ProcessingRecord> {
    let guid = Uuid::new_v4();
    let now = Utc::now();

    // Retry after failure: supersede the failed row. The state predicate
    // makes this atomic under concurrent retries; the loser matches zero
    // rows and falls through to the INSERT conflict below.
    let superseded = sqlx::query(
        r#"
        UPDATE processing_records
        SET guid = ?, source_filename = ?, input_url = ?,
            output_url = NULL, output_data = NULL, state = 'processing',
            backend_job_id = NULL, error_detail = NULL, duration_seconds = NULL,
            created_at = ?, updated_at = ?
        WHERE fingerprint = ? AND job_kind = ? AND job_params = ? AND state = 'failed'
        "#,
    )
    .bind(guid.to_string())
    .bind(&new.source_filename)
    .bind(&new.input_url)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .bind(&new.fingerprint)
    .bind(new.job_kind.as_str())
    .bind(&new.job_params)
    .execute(pool)
    .await?;

    if superseded.rows_affected() == 1 {
        tracing::info!(
            guid = %guid,
            fingerprint = %new.fingerprint,
            job_kind = %new.job_kind,
            "Superseded failed record with new attempt"
        );
        return Ok(assemble(new, guid, now));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO processing_records
            (guid, fingerprint, job_kind, job_params, source_filename, input_url,
             state, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 'processing', ?, ?)
        "#,
    )
    .bind(guid.to_string())
    .bind(&new.fingerprint)
    .bind(new.job_kind.as_str())
    .bind(&new.job_params)
    .bind(&new.source_filename)
    .bind(&new.input_url)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => {
            tracing::info!(
                guid = %guid,
                fingerprint = %new.fingerprint,
                job_kind = %new.job_kind,
                "Created processing record"
            );
            Ok(assemble(new, guid, now))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(Error::DuplicateRecord(format!(
                "a record for fingerprint {} ({}, {:?}) already exists",
                new.fingerprint, new.job_kind, new.job_params
            )))
        }
        Err(e) => Err(e.into()),
    }
}

/// Transition `processing` → `completed`, persisting the artifact.
///
/// Fails with `InvalidTransition` (and mutates nothing) when the record is
/// not currently in `processing`.
pub async fn mark_completed(
    pool: &SqlitePool,
    guid: Uuid,
    artifact: &JobArtifact,
    backend_job_id: Option<&str>,
    duration_seconds: f64,
) -> Result<()> {
    let output_data = serde_json::to_string(artifact)
        .map_err(|e| Error::Internal(format!("failed to serialize output data: {e}")))?;

    let result = sqlx::query(
        r#"
        UPDATE processing_records
        SET state = 'completed', output_url = ?, output_data = ?,
            backend_job_id = ?, duration_seconds = ?, updated_at = ?
        WHERE guid = ? AND state = 'processing'
        "#,
    )
    .bind(artifact.url())
    .bind(output_data)
    .bind(backend_job_id)
    .bind(duration_seconds)
    .bind(Utc::now().to_rfc3339())
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::InvalidTransition(format!(
            "record {guid} is not in processing state"
        )));
    }

    tracing::info!(guid = %guid, output_url = artifact.url(), "Record completed");
    Ok(())
}

/// Transition `processing` → `failed` with a diagnostic. Same guard as
/// `mark_completed`.
pub async fn mark_failed(pool: &SqlitePool, guid: Uuid, error_detail: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE processing_records
        SET state = 'failed', error_detail = ?, updated_at = ?
        WHERE guid = ? AND state = 'processing'
        "#,
    )
    .bind(error_detail)
    .bind(Utc::now().to_rfc3339())
    .bind(guid.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::InvalidTransition(format!(
            "record {guid} is not in processing state"
        )));
    }

    tracing::warn!(guid = %guid, error_detail = error_detail, "Record failed");
    Ok(())
}

fn assemble(new: NewRecord, guid: Uuid, now: DateTime<Utc>) -> ProcessingRecord {
    ProcessingRecord {
        guid,
        fingerprint: new.fingerprint,
        job_kind: new.job_kind,
        job_params: new.job_params,
        source_filename: new.source_filename,
        input_url: new.input_url,
        output_url: None,
        output_data: None,
        state: RecordState::Processing,
        backend_job_id: None,
        error_detail: None,
        duration_seconds: None,
        created_at: now,
        updated_at: now,
    }
}

fn map_row(row: SqliteRow) -> Result<ProcessingRecord> {
    let guid_str: String = row.get("guid");
    let guid = Uuid::parse_str(&guid_str)
        .map_err(|e| Error::Internal(format!("invalid UUID in database: {e}")))?;

    let kind_str: String = row.get("job_kind");
    let state_str: String = row.get("state");

    let output_data: Option<String> = row.get("output_data");
    let output_data = output_data
        .map(|json| {
            serde_json::from_str::<JobArtifact>(&json)
                .map_err(|e| Error::Internal(format!("invalid output data in database: {e}")))
        })
        .transpose()?;

    Ok(ProcessingRecord {
        guid,
        fingerprint: row.get("fingerprint"),
        job_kind: JobKind::parse(&kind_str)?,
        job_params: row.get("job_params"),
        source_filename: row.get("source_filename"),
        input_url: row.get("input_url"),
        output_url: row.get("output_url"),
        output_data,
        state: RecordState::parse(&state_str)?,
        backend_job_id: row.get("backend_job_id"),
        error_detail: row.get("error_detail"),
        duration_seconds: row.get("duration_seconds"),
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("invalid timestamp in database: {e}")))
}
