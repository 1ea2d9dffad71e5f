//! Shared types for the label store
//!
//! Domain models and small utilities used by the storage core and any
//! embedding server or client.

pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
