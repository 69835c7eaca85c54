#![allow(dead_code)]

use pet_records::{AppState, db, models::animal::AnimalDraft};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{path::Path, sync::Arc};

/// A single, never-recycled connection so the in-memory database survives
/// for the whole test.
pub async fn memory_pool() -> Arc<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    Arc::new(pool)
}

pub async fn app_state(storage_dir: &Path) -> AppState {
    AppState::new(
        memory_pool().await,
        storage_dir.to_path_buf(),
        "pet-images",
        "http://localhost:3000/objects",
    )
}

pub fn draft(kind: &str, name: &str, owners: &[&str]) -> AnimalDraft {
    AnimalDraft {
        kind: kind.to_string(),
        name: name.to_string(),
        birthday: 1_500_000_000,
        owners: owners.iter().map(|o| o.to_string()).collect(),
        image_url: String::new(),
    }
}
