//! Database access
//!
//! Single SQLite database holding the processing_records table. The
//! uniqueness index on (fingerprint, job_kind, job_params) is the only
//! concurrency guard for a cache key; see `records::create`.

pub mod records;

use crate::error::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool, creating the file and schema as
/// needed.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the schema if it does not exist. Public so tests can bootstrap
/// in-memory pools.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_records (
            guid TEXT PRIMARY KEY,
            fingerprint TEXT NOT NULL,
            job_kind TEXT NOT NULL,
            job_params TEXT NOT NULL DEFAULT '',
            source_filename TEXT NOT NULL,
            input_url TEXT NOT NULL,
            output_url TEXT,
            output_data TEXT,
            state TEXT NOT NULL DEFAULT 'processing',
            backend_job_id TEXT,
            error_detail TEXT,
            duration_seconds REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per cache key, whatever its state. Failed rows are reused by
    // superseding them in place rather than excluding them here.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_processing_records_key
        ON processing_records (fingerprint, job_kind, job_params)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (processing_records)");

    Ok(())
}
