//! Schema migrations, embedded at compile time from `migrations/sqlite/`.
//!
//! Files are applied in numeric order and recorded with their checksum in
//! `_sqlx_migrations`; an edited migration that was already applied makes
//! startup fail. Schema changes go in a new `NNN_description.sql`.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Brings the schema up to date. Safe to call on every start.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (known, applied) = migration_status(pool).await?;
    debug!(known, applied, "Schema version check");

    MIGRATOR.run(pool).await?;

    if applied < known {
        info!(applied = known - applied, "Applied pending migrations");
    }
    Ok(())
}

/// `(embedded, applied)` migration counts. A fresh database reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let known = MIGRATOR.migrations.len();

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;
    if tables == 0 {
        return Ok((known, 0));
    }

    let applied: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;
    Ok((known, applied as usize))
}
