//! Database access layer
//!
//! Query functions take the pool as an explicit argument; there is no global
//! connection handle. Two write paths:
//! 1. Leased: allocation and label writes (`allocation`)
//! 2. Direct: lifecycle mutations and the read surface (`images`)

pub mod allocation;
pub mod images;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::config::Config;
use crate::error::StoreResult;

/// Open a pool against the configured database.
pub async fn connect(config: &Config) -> StoreResult<SqlitePool> {
    tracing::info!("connecting to {}", config.database_url);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

/// Create the images table and its secondary access paths if missing.
///
/// `(project_id, labeled)` backs the allocation scan, `(project_id,
/// original_name)` backs import reconciliation; both keep those lookups
/// sub-linear.
pub async fn init_schema(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL,
            original_name TEXT NOT NULL,
            link TEXT NOT NULL DEFAULT 'stub',
            external_link TEXT,
            local_path TEXT,
            callback_url TEXT,
            labeled INTEGER NOT NULL DEFAULT 0,
            label_data TEXT NOT NULL DEFAULT '{}',
            last_edited INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_images_project_labeled ON images(project_id, labeled)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_images_project_name ON images(project_id, original_name)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// `?,?,?` placeholder list for binding an id set into `IN (…)`.
pub(crate) fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}
