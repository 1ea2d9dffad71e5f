//! Image Model

use serde::{Deserialize, Serialize};

/// A project image with its parsed annotation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub project_id: i64,
    /// Source filename, informational.
    pub original_name: String,
    /// Storage path once the binary is materialized; `"stub"` until then.
    pub link: String,
    /// Remote source URL. At most one of `external_link` / `local_path` is
    /// populated per creation path.
    pub external_link: Option<String>,
    pub local_path: Option<String>,
    /// Notification target, opaque to the store.
    pub callback_url: Option<String>,
    /// False until a human confirms the label is complete.
    pub labeled: bool,
    /// Annotation geometry/content. Always a well-formed document once
    /// stored; reading it back goes through a fallible per-row conversion.
    pub label_data: serde_json::Value,
    /// Millisecond stamp of the last allocation touch or label write. Used
    /// for lease-timeout comparison only, not audit history.
    pub last_edited: i64,
}

/// Minimal unlabeled-image listing entry (queue depth / preview).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ImageStub {
    pub id: i64,
    pub external_link: Option<String>,
}

/// One element of a remote import batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteImageEntry {
    pub url: String,
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// One element of an import reattachment batch: an existing image adopted
/// into a project with refreshed provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReattachEntry {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub callback_url: Option<String>,
}
