//! Allocation and label writes
//!
//! The lease is a data-field convention, not a held lock: allocation stamps
//! `last_edited`, and an unlabeled image whose stamp is older than
//! [`LEASE_TIMEOUT_MS`] is up for labeling again. There is no release call
//! and no owner identity; a client that stops touching an image simply loses
//! it to the next scan, which also covers disconnects for free.

use sqlx::SqlitePool;

use crate::error::StoreResult;

/// After this long without a touch an unlabeled image is up for labeling again.
pub const LEASE_TIMEOUT_MS: i64 = 15 * 60 * 1000;

/// Hand out an image to label, or `None` if nothing is available.
///
/// With `image_id` set the timeout scan is skipped and that image is stamped
/// directly: the caller already holds it (autosave, re-entry) or wants it
/// specifically, and no ownership check is performed. Otherwise any unlabeled
/// image in the project last touched strictly before `now -
/// LEASE_TIMEOUT_MS` qualifies, ties broken by the store's natural order.
///
/// The eligibility check and the stamp are a single conditional update, so
/// two callers racing on the same expired candidate cannot both claim it.
pub async fn allocate(
    pool: &SqlitePool,
    project_id: i64,
    image_id: Option<i64>,
    now: i64,
) -> StoreResult<Option<i64>> {
    if let Some(id) = image_id {
        let claimed: Option<(i64,)> =
            sqlx::query_as("UPDATE images SET last_edited = ?1 WHERE id = ?2 RETURNING id")
                .bind(now)
                .bind(id)
                .fetch_optional(pool)
                .await?;
        return Ok(claimed.map(|(id,)| id));
    }

    let claimed: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE images
        SET last_edited = ?1
        WHERE id = (
            SELECT id FROM images
            WHERE project_id = ?2 AND labeled = 0 AND last_edited < ?3
            LIMIT 1
        )
        RETURNING id
        "#,
    )
    .bind(now)
    .bind(project_id)
    .bind(now - LEASE_TIMEOUT_MS)
    .fetch_optional(pool)
    .await?;

    Ok(claimed.map(|(id,)| id))
}

/// Persist a submitted label payload.
///
/// Writes the document and the touch stamp in one statement, so an actively
/// editing client keeps renewing its lease as it saves drafts.
pub async fn submit_label(
    pool: &SqlitePool,
    image_id: i64,
    label_data: &serde_json::Value,
    now: i64,
) -> StoreResult<()> {
    sqlx::query("UPDATE images SET label_data = ?1, last_edited = ?2 WHERE id = ?3")
        .bind(label_data.to_string())
        .bind(now)
        .bind(image_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Flip the completion flag.
///
/// Idempotent, and deliberately decoupled from [`submit_label`] so drafts can
/// autosave without finalizing. Does not touch the lease stamp; marking an
/// image complete is expected to follow a label write.
pub async fn set_labeled(pool: &SqlitePool, image_id: i64, labeled: bool) -> StoreResult<()> {
    sqlx::query("UPDATE images SET labeled = ?1 WHERE id = ?2")
        .bind(labeled)
        .bind(image_id)
        .execute(pool)
        .await?;
    Ok(())
}
