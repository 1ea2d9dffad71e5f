//! Data models
//!
//! Shared between the storage core and the serving layer (via API).
//! DB row types use `#[cfg_attr(feature = "db", derive(sqlx::FromRow))]`.
//! All IDs are `i64` (SQLite INTEGER PRIMARY KEY).

pub mod image;

// Re-exports
pub use image::*;
