//! Shared handler state, built once in `main` and cloned into every request.

use crate::services::{
    animal_repository::SqliteAnimalRepository, animal_service::AnimalService,
    blob_store::LocalBlobStore, upload_service::UploadService,
};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

#[derive(Clone)]
pub struct AppState {
    pub animals: AnimalService,
    pub uploads: UploadService,
    pub blobs: Arc<LocalBlobStore>,
    pub db: Arc<SqlitePool>,
    pub storage_dir: PathBuf,
}

impl AppState {
    /// Wire the SQLite-backed repository and local blob store together.
    pub fn new(
        db: Arc<SqlitePool>,
        storage_dir: impl Into<PathBuf>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let storage_dir = storage_dir.into();
        let repo = Arc::new(SqliteAnimalRepository::new(db.clone()));
        let blobs = Arc::new(LocalBlobStore::new(db.clone(), storage_dir.clone(), bucket));

        Self {
            animals: AnimalService::new(repo),
            uploads: UploadService::new(blobs.clone(), public_base_url),
            blobs,
            db,
            storage_dir,
        }
    }
}
