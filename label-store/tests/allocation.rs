// Allocation and lease lifecycle against a real in-process store.

use label_store::db::{self, allocation, images};
use label_store::db::allocation::LEASE_TIMEOUT_MS;
use serde_json::json;
use shared::util::now_millis;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

// In-memory SQLite is per-connection; keep the pool at a single connection
// so every query sees the same database.
async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_schema(&pool).await.unwrap();
    pool
}

async fn seed_image(
    pool: &SqlitePool,
    project_id: i64,
    name: &str,
    labeled: bool,
    last_edited: i64,
) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO images (project_id, original_name, labeled, last_edited) VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(project_id)
    .bind(name)
    .bind(labeled)
    .bind(last_edited)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

async fn last_edited(pool: &SqlitePool, id: i64) -> i64 {
    sqlx::query_scalar("SELECT last_edited FROM images WHERE id = ?1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn expired_image_is_handed_out_once() {
    let pool = test_pool().await;
    let now = now_millis();
    let id = seed_image(&pool, 7, "a.png", false, now - 20 * 60 * 1000).await;

    let granted = allocation::allocate(&pool, 7, None, now).await.unwrap();
    assert_eq!(granted, Some(id));
    assert!(last_edited(&pool, id).await >= now);

    // The stamp is fresh now, so the same caller pattern gets nothing.
    let again = allocation::allocate(&pool, 7, None, now).await.unwrap();
    assert_eq!(again, None);
}

#[tokio::test]
async fn nothing_eligible_means_no_mutation() {
    let pool = test_pool().await;
    let now = now_millis();
    let done = seed_image(&pool, 7, "done.png", true, now - 60 * 60 * 1000).await;
    let fresh = seed_image(&pool, 7, "fresh.png", false, now - 1000).await;
    let elsewhere = seed_image(&pool, 8, "other.png", false, now - 60 * 60 * 1000).await;

    let granted = allocation::allocate(&pool, 7, None, now).await.unwrap();
    assert_eq!(granted, None);

    // No record was touched, including the expired one in another project.
    assert_eq!(last_edited(&pool, done).await, now - 60 * 60 * 1000);
    assert_eq!(last_edited(&pool, fresh).await, now - 1000);
    assert_eq!(last_edited(&pool, elsewhere).await, now - 60 * 60 * 1000);
}

#[tokio::test]
async fn lease_timeout_is_a_strict_boundary() {
    let pool = test_pool().await;
    let now = now_millis();

    seed_image(&pool, 7, "edge.png", false, now - LEASE_TIMEOUT_MS).await;
    assert_eq!(allocation::allocate(&pool, 7, None, now).await.unwrap(), None);

    let expired = seed_image(&pool, 7, "older.png", false, now - LEASE_TIMEOUT_MS - 1).await;
    assert_eq!(
        allocation::allocate(&pool, 7, None, now).await.unwrap(),
        Some(expired)
    );
}

#[tokio::test]
async fn requested_id_bypasses_the_scan() {
    let pool = test_pool().await;
    let now = now_millis();
    let fresh = seed_image(&pool, 7, "fresh.png", false, now).await;

    // Not expired, but a direct request stamps it anyway.
    let granted = allocation::allocate(&pool, 7, Some(fresh), now + 5)
        .await
        .unwrap();
    assert_eq!(granted, Some(fresh));
    assert_eq!(last_edited(&pool, fresh).await, now + 5);

    // A request for an id that does not exist claims nothing.
    let missing = allocation::allocate(&pool, 7, Some(9999), now).await.unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn submitted_label_round_trips() {
    let pool = test_pool().await;
    let now = now_millis();
    let id = seed_image(&pool, 7, "a.png", false, 0).await;
    let doc = json!({"box": [1, 2, 3, 4]});

    allocation::submit_label(&pool, id, &doc, now).await.unwrap();

    let image = images::get(&pool, id).await.unwrap().unwrap();
    assert_eq!(image.label_data, doc);
    assert_eq!(image.last_edited, now);
}

#[tokio::test]
async fn label_write_renews_the_lease() {
    let pool = test_pool().await;
    let now = now_millis();
    let id = seed_image(&pool, 7, "a.png", false, now - 20 * 60 * 1000).await;

    allocation::submit_label(&pool, id, &json!({"draft": true}), now)
        .await
        .unwrap();

    // The autosaving client keeps its claim.
    assert_eq!(allocation::allocate(&pool, 7, None, now).await.unwrap(), None);
}

#[tokio::test]
async fn marking_complete_is_idempotent() {
    let pool = test_pool().await;
    let now = now_millis();
    let id = seed_image(&pool, 7, "a.png", false, 0).await;
    let doc = json!({"box": [1, 2, 3, 4]});
    allocation::submit_label(&pool, id, &doc, now).await.unwrap();

    allocation::set_labeled(&pool, id, true).await.unwrap();
    allocation::set_labeled(&pool, id, true).await.unwrap();

    let image = images::get(&pool, id).await.unwrap().unwrap();
    assert!(image.labeled);
    assert_eq!(image.label_data, doc);
    // The flag flip does not renew the lease stamp.
    assert_eq!(image.last_edited, now);
}

#[tokio::test]
async fn completed_image_shows_up_on_the_labeled_page() {
    let pool = test_pool().await;
    let now = now_millis();
    let id = seed_image(&pool, 7, "a.png", false, 0).await;
    let doc = json!({"box": [1, 2, 3, 4]});

    allocation::submit_label(&pool, id, &doc, now).await.unwrap();
    allocation::set_labeled(&pool, id, true).await.unwrap();

    let page = images::get_labeled_page(&pool, 7, 1, 10).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, id);
    assert_eq!(page[0].label_data, doc);
}
