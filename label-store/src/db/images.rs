//! Image lifecycle and read surface
//!
//! Direct (non-leased) mutations plus the query accessors feeding import,
//! admin and UI flows. Batch operations process elements independently: one
//! failing element does not roll back its siblings, and the outcome reports
//! results per element.

use serde::Serialize;
use shared::models::{Image, ImageStub, ReattachEntry, RemoteImageEntry};
use sqlx::SqlitePool;

use super::placeholders;
use crate::error::{StoreError, StoreResult};

/// Raw `images` row; `label_data` stays serialized until [`ImageRow::into_image`].
#[derive(Debug, Clone, sqlx::FromRow)]
struct ImageRow {
    id: i64,
    project_id: i64,
    original_name: String,
    link: String,
    external_link: Option<String>,
    local_path: Option<String>,
    callback_url: Option<String>,
    labeled: bool,
    label_data: String,
    last_edited: i64,
}

impl ImageRow {
    fn into_image(self) -> Result<Image, StoreError> {
        let label_data = serde_json::from_str(&self.label_data).map_err(|source| {
            StoreError::MalformedLabel {
                image_id: self.id,
                source,
            }
        })?;
        Ok(Image {
            id: self.id,
            project_id: self.project_id,
            original_name: self.original_name,
            link: self.link,
            external_link: self.external_link,
            local_path: self.local_path,
            callback_url: self.callback_url,
            labeled: self.labeled,
            label_data,
            last_edited: self.last_edited,
        })
    }
}

/// Per-element outcome of a batch import or reattachment.
#[derive(Debug, Default, Serialize)]
pub struct ImportOutcome {
    /// Ids of the records that made it in, in input order.
    pub created: Vec<i64>,
    /// URLs of the elements that did not.
    pub failed: Vec<String>,
}

// ── Lifecycle ──

/// Import a batch of image URLs into a project.
///
/// Each URL inserts a stub row, then patches `link` to
/// `/uploads/{project}/{id}{ext}` once the store has assigned the id (the
/// link depends on the id, so creation is a two-step create-then-patch).
pub async fn add_image_urls(
    pool: &SqlitePool,
    project_id: i64,
    urls: &[String],
) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    for raw in urls {
        let name = url_file_name(raw);
        match insert_remote(pool, project_id, &name, raw, None).await {
            Ok(id) => {
                if let Err(e) = update_link(pool, id, project_id, &name).await {
                    tracing::warn!(image_id = id, error = %e, "imported image left with stub link");
                }
                outcome.created.push(id);
            }
            Err(e) => {
                tracing::warn!(url = %raw, error = %e, "image import failed");
                outcome.failed.push(raw.clone());
            }
        }
    }
    outcome
}

/// Import remote entries that may carry a callback target.
///
/// Bucket-style keys keep their full path as the display name, e.g.
/// `https://s3…/ml-data/before/x.png` imports as `/ml-data/before/x.png`.
pub async fn add_remote_images(
    pool: &SqlitePool,
    project_id: i64,
    entries: &[RemoteImageEntry],
) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    for entry in entries {
        let name = url_path(&entry.url);
        match insert_remote(
            pool,
            project_id,
            &name,
            &entry.url,
            entry.callback_url.as_deref(),
        )
        .await
        {
            Ok(id) => {
                if let Err(e) = update_link(pool, id, project_id, &name).await {
                    tracing::warn!(image_id = id, error = %e, "imported image left with stub link");
                }
                outcome.created.push(id);
            }
            Err(e) => {
                tracing::warn!(url = %entry.url, error = %e, "image import failed");
                outcome.failed.push(entry.url.clone());
            }
        }
    }
    outcome
}

async fn insert_remote(
    pool: &SqlitePool,
    project_id: i64,
    name: &str,
    external_link: &str,
    callback_url: Option<&str>,
) -> StoreResult<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO images (project_id, original_name, link, external_link, callback_url, labeled, label_data)
        VALUES (?1, ?2, 'stub', ?3, ?4, 0, '{}')
        RETURNING id
        "#,
    )
    .bind(project_id)
    .bind(name)
    .bind(external_link)
    .bind(callback_url)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Create a stub for a locally stored file and assign its link immediately.
pub async fn add_image_stub(
    pool: &SqlitePool,
    project_id: i64,
    filename: &str,
    local_path: &str,
) -> StoreResult<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO images (project_id, original_name, local_path, link, labeled, label_data)
        VALUES (?1, ?2, ?3, 'stub', 0, '{}')
        RETURNING id
        "#,
    )
    .bind(project_id)
    .bind(filename)
    .bind(local_path)
    .fetch_one(pool)
    .await?;
    update_link(pool, id, project_id, filename).await?;
    Ok(id)
}

/// Point an image at its final storage path, `/uploads/{project}/{id}{ext}`.
/// Returns the stored file name (`{id}{ext}`) for the binary-upload step.
pub async fn update_link(
    pool: &SqlitePool,
    image_id: i64,
    project_id: i64,
    filename: &str,
) -> StoreResult<String> {
    let ext = name_ext(filename);
    let link = format!("/uploads/{project_id}/{image_id}{ext}");
    sqlx::query("UPDATE images SET link = ?1 WHERE id = ?2")
        .bind(&link)
        .bind(image_id)
        .execute(pool)
        .await?;
    Ok(format!("{image_id}{ext}"))
}

/// Delete one image, scoped to the owning project. A mismatched project
/// affects zero rows; that is a no-op, not an error.
pub async fn delete_image(pool: &SqlitePool, image_id: i64, project_id: i64) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM images WHERE id = ?1 AND project_id = ?2")
        .bind(image_id)
        .bind(project_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Delete a set of images, touching only rows the project actually owns.
pub async fn delete_by_ids(
    pool: &SqlitePool,
    image_ids: &[i64],
    project_id: i64,
) -> StoreResult<u64> {
    if image_ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "DELETE FROM images WHERE id IN ({}) AND project_id = ?",
        placeholders(image_ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in image_ids {
        query = query.bind(*id);
    }
    let result = query.bind(project_id).execute(pool).await?;
    Ok(result.rows_affected())
}

/// Move a set of images between projects in one conditional statement.
///
/// Only rows still in the declared source project move, so a stale id set
/// spanning an earlier project change cannot pull images out of a third
/// project.
pub async fn move_to_project(
    pool: &SqlitePool,
    image_ids: &[i64],
    new_project_id: i64,
    old_project_id: i64,
) -> StoreResult<u64> {
    if image_ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "UPDATE images SET project_id = ? WHERE id IN ({}) AND project_id = ?",
        placeholders(image_ids.len())
    );
    let mut query = sqlx::query(&sql).bind(new_project_id);
    for id in image_ids {
        query = query.bind(*id);
    }
    let result = query.bind(old_project_id).execute(pool).await?;
    Ok(result.rows_affected())
}

/// Adopt existing images into a project with refreshed provenance
/// (display name, source URL, callback). Best-effort per element.
pub async fn reattach_imports(
    pool: &SqlitePool,
    entries: &[ReattachEntry],
    project_id: i64,
) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    for entry in entries {
        let name = url_path(&entry.url);
        let res = sqlx::query(
            r#"
            UPDATE images
            SET project_id = ?1, original_name = ?2, external_link = ?3, callback_url = ?4
            WHERE id = ?5
            "#,
        )
        .bind(project_id)
        .bind(&name)
        .bind(&entry.url)
        .bind(entry.callback_url.as_deref())
        .bind(entry.id)
        .execute(pool)
        .await;
        match res {
            Ok(_) => outcome.created.push(entry.id),
            Err(e) => {
                tracing::warn!(image_id = entry.id, error = %e, "import reattach failed");
                outcome.failed.push(entry.url.clone());
            }
        }
    }
    outcome
}

// ── Read Surface ──

/// All images in a project, parsed payloads attached.
pub async fn get_for_project(pool: &SqlitePool, project_id: i64) -> StoreResult<Vec<Image>> {
    let rows: Vec<ImageRow> = sqlx::query_as(
        "SELECT id, project_id, original_name, link, external_link, local_path, callback_url, labeled, label_data, last_edited FROM images WHERE project_id = ?1",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(ImageRow::into_image).collect()
}

/// Fetch one image. Absence is an empty result; a payload that no longer
/// parses is a data-layer fault and surfaces as [`StoreError::MalformedLabel`].
pub async fn get(pool: &SqlitePool, image_id: i64) -> StoreResult<Option<Image>> {
    let row: Option<ImageRow> = sqlx::query_as(
        "SELECT id, project_id, original_name, link, external_link, local_path, callback_url, labeled, label_data, last_edited FROM images WHERE id = ?1",
    )
    .bind(image_id)
    .fetch_optional(pool)
    .await?;
    row.map(ImageRow::into_image).transpose()
}

/// Import-reconciliation lookup by project and original name.
///
/// The caller expects the referenced import source to exist, so absence here
/// is a [`StoreError::NotFound`] rather than an empty result — the only read
/// path with that contract.
pub async fn get_for_import(
    pool: &SqlitePool,
    project_id: i64,
    original_name: &str,
) -> StoreResult<Image> {
    let row: Option<ImageRow> = sqlx::query_as(
        "SELECT id, project_id, original_name, link, external_link, local_path, callback_url, labeled, label_data, last_edited FROM images WHERE project_id = ?1 AND original_name = ?2",
    )
    .bind(project_id)
    .bind(original_name)
    .fetch_optional(pool)
    .await?;
    match row {
        Some(row) => row.into_image(),
        None => Err(StoreError::NotFound {
            project_id,
            original_name: original_name.to_string(),
        }),
    }
}

/// Labeled images, most recently edited first. Page numbers are 1-based;
/// page 0 clamps to the first page.
///
/// A row whose payload fails to parse is skipped and logged instead of
/// failing the whole page.
pub async fn get_labeled_page(
    pool: &SqlitePool,
    project_id: i64,
    page_no: i64,
    limit: i64,
) -> StoreResult<Vec<Image>> {
    let offset = (page_no - 1).max(0) * limit;
    let rows: Vec<ImageRow> = sqlx::query_as(
        "SELECT id, project_id, original_name, link, external_link, local_path, callback_url, labeled, label_data, last_edited FROM images WHERE project_id = ?1 AND labeled = 1 ORDER BY last_edited DESC LIMIT ?2 OFFSET ?3",
    )
    .bind(project_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let mut images = Vec::with_capacity(rows.len());
    for row in rows {
        match row.into_image() {
            Ok(image) => images.push(image),
            Err(e) => tracing::warn!(error = %e, "skipping labeled image with bad payload"),
        }
    }
    Ok(images)
}

/// Bounded unlabeled listing for queue depth and preview, newest ids first.
pub async fn get_unlabeled_stubs(
    pool: &SqlitePool,
    project_id: i64,
    limit: i64,
) -> StoreResult<Vec<ImageStub>> {
    let stubs: Vec<ImageStub> = sqlx::query_as(
        "SELECT id, external_link FROM images WHERE project_id = ?1 AND labeled = 0 ORDER BY id DESC LIMIT ?2",
    )
    .bind(project_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(stubs)
}

/// Bulk fetch scoped to a project.
pub async fn get_all_by_ids(
    pool: &SqlitePool,
    image_ids: &[i64],
    project_id: i64,
) -> StoreResult<Vec<Image>> {
    if image_ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT id, project_id, original_name, link, external_link, local_path, callback_url, labeled, label_data, last_edited FROM images WHERE project_id = ? AND id IN ({})",
        placeholders(image_ids.len())
    );
    let mut query = sqlx::query_as::<_, ImageRow>(&sql).bind(project_id);
    for id in image_ids {
        query = query.bind(*id);
    }
    let rows = query.fetch_all(pool).await?;
    rows.into_iter().map(ImageRow::into_image).collect()
}

/// Which of these ids the project actually owns.
pub async fn ids_in_project(
    pool: &SqlitePool,
    image_ids: &[i64],
    project_id: i64,
) -> StoreResult<Vec<i64>> {
    if image_ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!(
        "SELECT id FROM images WHERE project_id = ? AND id IN ({})",
        placeholders(image_ids.len())
    );
    let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(project_id);
    for id in image_ids {
        query = query.bind(*id);
    }
    Ok(query.fetch_all(pool).await?)
}

// ── Name Derivation ──

/// Path component of an import URL. Imports sometimes arrive as bare paths
/// without a scheme; those pass through with any query/fragment stripped.
fn url_path(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(u) => u.path().to_string(),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Display name for a plain URL import: the file name at the end of the path.
fn url_file_name(raw: &str) -> String {
    let path = url_path(raw);
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// File extension of an import name including the dot, empty when absent.
fn name_ext(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
