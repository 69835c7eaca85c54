//! Image upload pipeline: random key, streamed write, publish, public URL.

use crate::{
    errors::ErrorKind,
    services::blob_store::{Acl, BlobError, BlobStore, WriteOptions},
};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use serde::Serialize;
use std::{io, sync::Arc};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

/// Uploaded objects never change, so they may be cached for a day.
pub const CACHE_CONTROL: &str = "public, max-age=86400";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to open object writer: {0}")]
    Open(BlobError),
    #[error("failed to copy file into bucket: {0}")]
    Copy(BlobError),
    #[error("failed closing object writer: {0}")]
    Close(BlobError),
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::BlobWriteError
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadedImage {
    pub key: String,
    pub url: String,
}

#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn BlobStore>,
    public_base_url: String,
}

impl UploadService {
    pub fn new(store: Arc<dyn BlobStore>, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into(),
        }
    }

    /// Stream `bytes` into the blob store under a fresh `<uuid><ext>` key.
    ///
    /// A failure while finishing the writer is surfaced as-is; nothing is
    /// deleted to compensate.
    pub async fn upload<S>(
        &self,
        filename: &str,
        content_type: Option<String>,
        bytes: S,
    ) -> Result<UploadedImage, UploadError>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let key = object_key(Uuid::new_v4(), filename);
        let bucket = self.store.bucket();
        info!("Using bucket name: {}", bucket);

        let opts = WriteOptions {
            acl: Acl::PublicRead,
            content_type,
            cache_control: CACHE_CONTROL.to_string(),
        };
        let mut writer = self.store.open_writer(&key, opts).await.map_err(|err| {
            error!("failed to open object writer for {}: {}", key, err);
            UploadError::Open(err)
        })?;

        pin_mut!(bytes);
        while let Some(chunk) = bytes.next().await {
            let copied = match chunk {
                Ok(chunk) => writer.write(chunk).await,
                Err(err) => Err(BlobError::Io(err)),
            };
            if let Err(err) = copied {
                error!("failed to copy file into bucket: {}", err);
                return Err(UploadError::Copy(err));
            }
        }

        writer.finish().await.map_err(|err| {
            error!("failed closing object writer: {}", err);
            UploadError::Close(err)
        })?;

        let url = public_url(&self.public_base_url, bucket, &key);
        info!("Uploaded {} to {}", filename, url);
        Ok(UploadedImage { key, url })
    }
}

/// `<id><ext>`, keeping the filename's extension (dot included) verbatim.
pub fn object_key(id: Uuid, filename: &str) -> String {
    format!("{}{}", id, extension(filename))
}

/// Suffix starting at the last `.` of the final path element, or `""`.
fn extension(filename: &str) -> &str {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    match name.rfind('.') {
        Some(pos) => &name[pos..],
        None => "",
    }
}

pub fn public_url(base: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}
