mod common;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt, stream, stream::BoxStream};
use pet_records::{
    ErrorKind,
    models::object::StoredObject,
    services::{
        blob_store::{
            Acl, BlobError, BlobResult, BlobStore, BlobWriter, LocalBlobStore, WriteOptions,
        },
        upload_service::{CACHE_CONTROL, UploadError, UploadService},
    },
};
use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
    task::Poll,
};
use sqlx::SqlitePool;
use tokio::sync::oneshot;
use uuid::Uuid;

fn chunks(parts: &[&'static [u8]]) -> impl futures::Stream<Item = io::Result<Bytes>> + Send {
    stream::iter(parts.iter().map(|p| Ok::<_, io::Error>(Bytes::from_static(p))).collect::<Vec<_>>())
}

async fn local_store(dir: &std::path::Path) -> Arc<LocalBlobStore> {
    local_store_with_pool(dir).await.0
}

async fn local_store_with_pool(dir: &std::path::Path) -> (Arc<LocalBlobStore>, Arc<SqlitePool>) {
    let pool = common::memory_pool().await;
    let store = Arc::new(LocalBlobStore::new(pool.clone(), dir.to_path_buf(), "pet-images"));
    (store, pool)
}

fn files_under(dir: &std::path::Path) -> usize {
    let mut count = 0;
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            count += files_under(&path);
        } else {
            count += 1;
        }
    }
    count
}

#[tokio::test]
async fn upload_publishes_bytes_and_declared_content_type() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(dir.path()).await;
    let service = UploadService::new(store.clone(), "https://cdn.example.com");

    let uploaded = service
        .upload(
            "rex.png",
            Some("image/png".into()),
            chunks(&[b"\x89PNG", b"-rest-of-image"]),
        )
        .await
        .unwrap();

    assert!(uploaded.key.ends_with(".png"));
    assert_eq!(
        uploaded.url,
        format!("https://cdn.example.com/pet-images/{}", uploaded.key)
    );

    let (meta, body) = store.open_reader(&uploaded.key).await.unwrap();
    let bytes: Vec<Bytes> = body.try_collect().await.unwrap();
    assert_eq!(bytes.concat(), b"\x89PNG-rest-of-image".to_vec());
    assert_eq!(meta.content_type.as_deref(), Some("image/png"));
    assert_eq!(meta.cache_control, CACHE_CONTROL);
    assert_eq!(meta.acl, "public-read");
    assert_eq!(meta.size_bytes, 18);
    assert_eq!(meta.etag, format!("{:x}", md5::compute(b"\x89PNG-rest-of-image")));
}

#[tokio::test]
async fn identical_uploads_get_distinct_keys() {
    let dir = tempfile::tempdir().unwrap();
    let service = UploadService::new(local_store(dir.path()).await, "http://localhost:3000/objects");

    let first = service
        .upload("cat.jpg", Some("image/jpeg".into()), chunks(&[b"same"]))
        .await
        .unwrap();
    let second = service
        .upload("cat.jpg", Some("image/jpeg".into()), chunks(&[b"same"]))
        .await
        .unwrap();

    assert_ne!(first.key, second.key);
    assert_ne!(first.url, second.url);
}

#[tokio::test]
async fn filename_without_extension_yields_bare_uuid_key() {
    let dir = tempfile::tempdir().unwrap();
    let service = UploadService::new(local_store(dir.path()).await, "http://localhost:3000/objects");

    let uploaded = service
        .upload("snapshot", None, chunks(&[b"abc"]))
        .await
        .unwrap();
    assert!(Uuid::parse_str(&uploaded.key).is_ok());
}

#[tokio::test]
async fn failed_input_stream_leaves_nothing_published() {
    let dir = tempfile::tempdir().unwrap();
    let (store, pool) = local_store_with_pool(dir.path()).await;
    let service = UploadService::new(store, "http://localhost:3000/objects");

    let broken = stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")),
    ]);
    let err = service
        .upload("rex.png", Some("image/png".into()), broken)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Copy(_)));
    assert_eq!(err.kind(), ErrorKind::BlobWriteError);

    let published: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM objects")
        .fetch_one(&*pool)
        .await
        .unwrap();
    assert_eq!(published, 0);
    assert_eq!(files_under(dir.path()), 0);
}

/// In-memory store whose writers can be told to fail on finish, after the
/// bytes have already landed.
#[derive(Default)]
struct FlakyStore {
    objects: Arc<Mutex<HashMap<String, (WriteOptions, Vec<u8>)>>>,
    fail_finish: bool,
}

struct FlakyWriter {
    objects: Arc<Mutex<HashMap<String, (WriteOptions, Vec<u8>)>>>,
    key: String,
    fail_finish: bool,
}

#[async_trait]
impl BlobWriter for FlakyWriter {
    async fn write(&mut self, chunk: Bytes) -> BlobResult<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.get_mut(&self.key).unwrap().1.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(&mut self) -> BlobResult<StoredObject> {
        if self.fail_finish {
            return Err(BlobError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "finalize rejected",
            )));
        }
        let objects = self.objects.lock().unwrap();
        let (opts, bytes) = &objects[&self.key];
        Ok(StoredObject {
            id: Uuid::new_v4(),
            bucket: "flaky".into(),
            key: self.key.clone(),
            content_type: opts.content_type.clone(),
            cache_control: opts.cache_control.clone(),
            acl: opts.acl.as_str().into(),
            size_bytes: bytes.len() as i64,
            etag: format!("{:x}", md5::compute(bytes)),
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
    fn bucket(&self) -> &str {
        "flaky"
    }

    async fn open_writer(&self, key: &str, opts: WriteOptions) -> BlobResult<Box<dyn BlobWriter>> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (opts, Vec::new()));
        Ok(Box::new(FlakyWriter {
            objects: self.objects.clone(),
            key: key.to_string(),
            fail_finish: self.fail_finish,
        }))
    }

    async fn open_reader(
        &self,
        key: &str,
    ) -> BlobResult<(StoredObject, BoxStream<'static, io::Result<Bytes>>)> {
        Err(BlobError::NotFound {
            bucket: "flaky".into(),
            key: key.to_string(),
        })
    }
}

#[tokio::test]
async fn writer_receives_fixed_policy_headers() {
    let store = Arc::new(FlakyStore::default());
    let service = UploadService::new(store.clone(), "https://storage.example.com");

    let uploaded = service
        .upload("a.gif", Some("image/gif".into()), chunks(&[b"GIF89a"]))
        .await
        .unwrap();
    assert_eq!(uploaded.url, format!("https://storage.example.com/flaky/{}", uploaded.key));

    let objects = store.objects.lock().unwrap();
    let (opts, bytes) = &objects[&uploaded.key];
    assert_eq!(opts.acl, Acl::PublicRead);
    assert_eq!(opts.cache_control, "public, max-age=86400");
    assert_eq!(opts.content_type.as_deref(), Some("image/gif"));
    assert_eq!(bytes, b"GIF89a");
}

#[tokio::test]
async fn finish_failure_is_surfaced_without_cleanup() {
    let store = Arc::new(FlakyStore {
        fail_finish: true,
        ..Default::default()
    });
    let service = UploadService::new(store.clone(), "https://storage.example.com");

    let err = service
        .upload("a.gif", Some("image/gif".into()), chunks(&[b"GIF89a"]))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Close(_)));
    assert_eq!(err.kind(), ErrorKind::BlobWriteError);
    assert!(err.to_string().contains("finalize rejected"));

    // The partially committed object is left where the store put it.
    let objects = store.objects.lock().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects.values().next().unwrap().1, b"GIF89a");
}

#[tokio::test]
async fn reader_streams_are_boxed_and_sendable() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(dir.path()).await;
    let service = UploadService::new(store.clone(), "http://localhost:3000/objects");
    let uploaded = service
        .upload("x.bin", None, chunks(&[b"one", b"two"]))
        .await
        .unwrap();

    let (meta, body) = store.open_reader(&uploaded.key).await.unwrap();
    let handle = tokio::spawn(async move { body.map(|c| c.unwrap().len()).collect::<Vec<_>>().await });
    let total: usize = handle.await.unwrap().into_iter().sum();
    assert_eq!(total, 6);
    assert_eq!(meta.content_type, None);

    assert!(matches!(
        store.open_reader("missing.png").await,
        Err(BlobError::NotFound { .. })
    ));
}

#[tokio::test]
async fn awkward_filename_extension_is_kept_and_served() {
    let dir = tempfile::tempdir().unwrap();
    let store = local_store(dir.path()).await;
    let service = UploadService::new(store.clone(), "http://localhost:3000/objects");

    let uploaded = service
        .upload("C:\\my.pics\\rex", Some("image/png".into()), chunks(&[b"png"]))
        .await
        .unwrap();
    assert!(uploaded.key.ends_with(".pics\\rex"));

    let (meta, body) = store.open_reader(&uploaded.key).await.unwrap();
    let bytes: Vec<Bytes> = body.try_collect().await.unwrap();
    assert_eq!(bytes.concat(), b"png".to_vec());
    assert_eq!(meta.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn dropping_an_in_flight_upload_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (store, pool) = local_store_with_pool(dir.path()).await;
    let service = UploadService::new(store, "http://localhost:3000/objects");

    // First chunk flows, then the client stalls forever.
    let (stalled_tx, stalled_rx) = oneshot::channel::<()>();
    let mut stalled_tx = Some(stalled_tx);
    let body = stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"partial"))]).chain(
        stream::poll_fn(move |_| {
            if let Some(tx) = stalled_tx.take() {
                let _ = tx.send(());
            }
            Poll::<Option<io::Result<Bytes>>>::Pending
        }),
    );

    tokio::select! {
        res = service.upload("rex.png", Some("image/png".into()), body) => {
            panic!("upload finished on a stalled stream: {res:?}");
        }
        _ = stalled_rx => {}
    }

    assert_eq!(files_under(dir.path()), 0);
    let published: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM objects")
        .fetch_one(&*pool)
        .await
        .unwrap();
    assert_eq!(published, 0);
}
