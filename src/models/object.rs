//! Represents an object (image) published by the upload pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata kept for one stored blob. The payload lives on disk.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Bucket the object was written to.
    pub bucket: String,

    /// Object key, `<uuid><ext>` for uploads.
    pub key: String,

    /// Content type declared by the uploader, never sniffed.
    pub content_type: Option<String>,

    /// Cache-Control header served with the object.
    pub cache_control: String,

    /// Access policy, e.g. `public-read`.
    pub acl: String,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 of the payload, lowercase hex.
    pub etag: String,

    /// When the object was published.
    pub created_at: DateTime<Utc>,
}
