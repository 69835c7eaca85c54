//! src/services/blob_store.rs
//!
//! BlobStore — streamed object writes with per-object ACL, content type and
//! cache policy. `LocalBlobStore` keeps payloads on local disk sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}` and their metadata in SQLite.
//! A write lands in a temp file and becomes visible only when the writer is
//! finished: fsync, rename into place, then the metadata row.

use crate::models::object::StoredObject;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{StreamExt, stream::BoxStream};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    ffi::OsStr,
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidKey,
    #[error("object writer already finished")]
    WriterFinished,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Access policy attached to a written object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acl {
    PublicRead,
}

impl Acl {
    pub fn as_str(self) -> &'static str {
        match self {
            Acl::PublicRead => "public-read",
        }
    }
}

/// Headers applied to an object when it is written.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub acl: Acl,
    pub content_type: Option<String>,
    pub cache_control: String,
}

/// An open write stream for a single object.
///
/// Nothing is visible under the key until `finish` returns `Ok`.
#[async_trait]
pub trait BlobWriter: Send {
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()>;

    /// Commit the object. Must be called at most once.
    async fn finish(&mut self) -> BlobResult<StoredObject>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Bucket this store writes to.
    fn bucket(&self) -> &str;

    async fn open_writer(&self, key: &str, opts: WriteOptions) -> BlobResult<Box<dyn BlobWriter>>;

    /// Metadata and payload of a published object.
    async fn open_reader(
        &self,
        key: &str,
    ) -> BlobResult<(StoredObject, BoxStream<'static, io::Result<Bytes>>)>;
}

#[derive(Clone)]
pub struct LocalBlobStore {
    db: Arc<SqlitePool>,
    base_path: PathBuf,
    bucket: String,
}

impl LocalBlobStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            bucket: bucket.into(),
        }
    }

    /// A key must name exactly one regular file inside its shard directory.
    /// Anything else the platform allows in a file name is kept verbatim.
    fn ensure_key_safe(key: &str) -> BlobResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN || key.contains('\0') {
            return Err(BlobError::InvalidKey);
        }
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == OsStr::new(key) => Ok(()),
            _ => Err(BlobError::InvalidKey),
        }
    }

    /// Two-level shard directories from MD5(bucket/key), lowercase hex.
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(&self.bucket, key);
        let mut path = self.base_path.clone();
        path.push(&self.bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_object(&self, key: &str) -> BlobResult<StoredObject> {
        sqlx::query_as::<_, StoredObject>(
            "SELECT id, bucket, key, content_type, cache_control, acl, size_bytes, etag, created_at
             FROM objects WHERE bucket = ? AND key = ?",
        )
        .bind(&self.bucket)
        .bind(key)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| BlobError::NotFound {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn open_writer(&self, key: &str, opts: WriteOptions) -> BlobResult<Box<dyn BlobWriter>> {
        Self::ensure_key_safe(key)?;

        let final_path = self.object_path(key);
        let parent = final_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let file = File::create(&tmp_path).await?;

        Ok(Box::new(LocalBlobWriter {
            db: self.db.clone(),
            bucket: self.bucket.clone(),
            key: key.to_string(),
            opts,
            tmp_path,
            final_path,
            file: Some(file),
            size_bytes: 0,
            digest: Context::new(),
        }))
    }

    async fn open_reader(
        &self,
        key: &str,
    ) -> BlobResult<(StoredObject, BoxStream<'static, io::Result<Bytes>>)> {
        Self::ensure_key_safe(key)?;
        let object = self.fetch_object(key).await?;

        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BlobError::NotFound {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                }
            } else {
                BlobError::Io(err)
            }
        })?;

        Ok((object, ReaderStream::new(file).boxed()))
    }
}

struct LocalBlobWriter {
    db: Arc<SqlitePool>,
    bucket: String,
    key: String,
    opts: WriteOptions,
    tmp_path: PathBuf,
    final_path: PathBuf,
    /// `None` once finished.
    file: Option<File>,
    size_bytes: i64,
    digest: Context,
}

impl LocalBlobWriter {
    async fn discard_tmp(&mut self) {
        self.file = None;
        if let Err(err) = fs::remove_file(&self.tmp_path).await {
            warn_cleanup_failed(&self.tmp_path, &err);
        }
    }
}

#[async_trait]
impl BlobWriter for LocalBlobWriter {
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()> {
        let file = self.file.as_mut().ok_or(BlobError::WriterFinished)?;
        if let Err(err) = file.write_all(&chunk).await {
            self.discard_tmp().await;
            return Err(BlobError::Io(err));
        }
        self.size_bytes += chunk.len() as i64;
        self.digest.consume(&chunk);
        Ok(())
    }

    async fn finish(&mut self) -> BlobResult<StoredObject> {
        let mut file = self.file.take().ok_or(BlobError::WriterFinished)?;

        if let Err(err) = file.flush().await {
            self.discard_tmp().await;
            return Err(BlobError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            self.discard_tmp().await;
            return Err(BlobError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&self.tmp_path, &self.final_path).await {
            self.discard_tmp().await;
            return Err(BlobError::Io(err));
        }

        let digest = std::mem::replace(&mut self.digest, Context::new());
        let object = StoredObject {
            id: Uuid::new_v4(),
            bucket: self.bucket.clone(),
            key: self.key.clone(),
            content_type: self.opts.content_type.clone(),
            cache_control: self.opts.cache_control.clone(),
            acl: self.opts.acl.as_str().to_string(),
            size_bytes: self.size_bytes,
            etag: format!("{:x}", digest.compute()),
            created_at: Utc::now(),
        };

        let inserted = sqlx::query(
            "INSERT INTO objects (
                id, bucket, key, content_type, cache_control, acl, size_bytes, etag, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(object.id)
        .bind(&object.bucket)
        .bind(&object.key)
        .bind(object.content_type.as_deref())
        .bind(&object.cache_control)
        .bind(&object.acl)
        .bind(object.size_bytes)
        .bind(&object.etag)
        .bind(object.created_at)
        .execute(&*self.db)
        .await;

        if let Err(err) = inserted {
            // Payload is already in place; it stays there without metadata.
            warn!(
                "object {} written to {} but metadata insert failed: {}",
                self.key,
                self.final_path.display(),
                err
            );
            return Err(BlobError::Sqlx(err));
        }

        debug!("published {}/{} ({} bytes)", self.bucket, self.key, object.size_bytes);
        Ok(object)
    }
}

impl Drop for LocalBlobWriter {
    fn drop(&mut self) {
        // Abandoned before finish: the temp file was never published.
        if self.file.take().is_some() {
            if let Err(err) = std::fs::remove_file(&self.tmp_path) {
                warn_cleanup_failed(&self.tmp_path, &err);
            }
        }
    }
}

fn warn_cleanup_failed(tmp_path: &Path, err: &io::Error) {
    if err.kind() != ErrorKind::NotFound {
        warn!("failed to remove temp object {}: {}", tmp_path.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_keys() {
        assert!(LocalBlobStore::ensure_key_safe("../etc/passwd").is_err());
        assert!(LocalBlobStore::ensure_key_safe("/abs").is_err());
        assert!(LocalBlobStore::ensure_key_safe("a/b.png").is_err());
        assert!(LocalBlobStore::ensure_key_safe("..").is_err());
        assert!(LocalBlobStore::ensure_key_safe(".").is_err());
        assert!(LocalBlobStore::ensure_key_safe("a/").is_err());
        assert!(LocalBlobStore::ensure_key_safe("").is_err());
        assert!(LocalBlobStore::ensure_key_safe("nul\0.png").is_err());
        assert!(LocalBlobStore::ensure_key_safe("0b6f.png").is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn keeps_awkward_single_component_keys() {
        assert!(LocalBlobStore::ensure_key_safe("0b6f.pics\\rex").is_ok());
        assert!(LocalBlobStore::ensure_key_safe("0b6f.a..b").is_ok());
        assert!(LocalBlobStore::ensure_key_safe("0b6f.\tab").is_ok());
    }

    #[test]
    fn shards_are_two_hex_bytes() {
        let (a, b) = LocalBlobStore::object_shards("pet-images", "x.png");
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
        assert!(a.chars().chain(b.chars()).all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            LocalBlobStore::object_shards("pet-images", "x.png"),
            (a, b)
        );
    }
}
