//! src/services/animal_repository.rs
//!
//! AnimalRepository — create/read/query/delete over animal records. The
//! SQLite implementation keeps one row per animal with `owners` stored as a
//! JSON array, so owner lookups use `json_each` instead of a client-side
//! filter.

use crate::{
    errors::ErrorKind,
    models::animal::{Animal, AnimalRow, NewAnimal},
};
use async_trait::async_trait;
use sqlx::{SqlitePool, types::Json};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

const ANIMAL_SELECT_SQL: &str =
    "SELECT id, type, name, birthday, owners, image_url, created_at FROM animals";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("animal `{0}` not found")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(sqlx::Error),
    #[error("store write failed: {0}")]
    StoreWrite(sqlx::Error),
    #[error("store read failed: {0}")]
    StoreRead(sqlx::Error),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepoError::NotFound(_) => ErrorKind::NotFound,
            RepoError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            RepoError::StoreWrite(_) => ErrorKind::StoreWriteError,
            RepoError::StoreRead(_) => ErrorKind::StoreReadError,
        }
    }

    fn read(err: sqlx::Error) -> Self {
        if is_unavailable(&err) {
            RepoError::StoreUnavailable(err)
        } else {
            RepoError::StoreRead(err)
        }
    }

    fn write(err: sqlx::Error) -> Self {
        if is_unavailable(&err) {
            RepoError::StoreUnavailable(err)
        } else {
            RepoError::StoreWrite(err)
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence contract for animal records.
///
/// Implementations must be safe to share across request tasks. Dropping a
/// returned future aborts the underlying store call.
#[async_trait]
pub trait AnimalRepository: Send + Sync {
    /// Assign a fresh id and persist the record verbatim, `created_at` included.
    async fn create(&self, animal: NewAnimal) -> RepoResult<String>;

    /// Strongly consistent point lookup.
    async fn get_by_id(&self, id: &str) -> RepoResult<Animal>;

    /// Every record, in store order. Unbounded.
    async fn get_all(&self) -> RepoResult<Vec<Animal>>;

    /// Every record whose `owners` list contains `owner_id`.
    async fn get_by_owner_id(&self, owner_id: &str) -> RepoResult<Vec<Animal>>;

    /// Remove a record. Missing ids are not an error.
    async fn delete(&self, id: &str) -> RepoResult<()>;
}

#[derive(Clone)]
pub struct SqliteAnimalRepository {
    db: Arc<SqlitePool>,
}

impl SqliteAnimalRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AnimalRepository for SqliteAnimalRepository {
    async fn create(&self, animal: NewAnimal) -> RepoResult<String> {
        let id = Uuid::new_v4().to_string();
        let draft = &animal.draft;

        sqlx::query(
            "INSERT INTO animals (id, type, name, birthday, owners, image_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&draft.kind)
        .bind(&draft.name)
        .bind(draft.birthday)
        .bind(Json(&draft.owners))
        .bind(&draft.image_url)
        .bind(animal.created_at)
        .execute(&*self.db)
        .await
        .map_err(RepoError::write)?;

        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> RepoResult<Animal> {
        let row = sqlx::query_as::<_, AnimalRow>(&format!("{ANIMAL_SELECT_SQL} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&*self.db)
            .await
            .map_err(RepoError::read)?;

        row.map(Animal::from)
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    async fn get_all(&self) -> RepoResult<Vec<Animal>> {
        let rows = sqlx::query_as::<_, AnimalRow>(ANIMAL_SELECT_SQL)
            .fetch_all(&*self.db)
            .await
            .map_err(RepoError::read)?;

        Ok(rows.into_iter().map(Animal::from).collect())
    }

    async fn get_by_owner_id(&self, owner_id: &str) -> RepoResult<Vec<Animal>> {
        let rows = sqlx::query_as::<_, AnimalRow>(&format!(
            "{ANIMAL_SELECT_SQL} WHERE EXISTS (
                 SELECT 1 FROM json_each(animals.owners) WHERE json_each.value = ?
             )"
        ))
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await
        .map_err(RepoError::read)?;

        Ok(rows.into_iter().map(Animal::from).collect())
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM animals WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await
            .map_err(RepoError::write)?;

        if result.rows_affected() == 0 {
            debug!("animal {} already absent", id);
        }
        Ok(())
    }
}

/// Connection-level failures, as opposed to a statement the store rejected.
fn is_unavailable(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_unavailable() {
        assert_eq!(
            RepoError::read(sqlx::Error::PoolTimedOut).kind(),
            ErrorKind::StoreUnavailable
        );
        assert_eq!(
            RepoError::write(sqlx::Error::PoolClosed).kind(),
            ErrorKind::StoreUnavailable
        );
    }

    #[test]
    fn statement_failures_keep_direction() {
        assert_eq!(
            RepoError::read(sqlx::Error::RowNotFound).kind(),
            ErrorKind::StoreReadError
        );
        assert_eq!(
            RepoError::write(sqlx::Error::Protocol("bad".into())).kind(),
            ErrorKind::StoreWriteError
        );
    }

    #[test]
    fn store_errors_report_cause_once() {
        let err = RepoError::read(sqlx::Error::Protocol("disk image is malformed".into()));
        assert_eq!(err.to_string().matches("disk image is malformed").count(), 1);
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn not_found_message_names_id() {
        let err = RepoError::NotFound("abc".into());
        assert_eq!(err.to_string(), "animal `abc` not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
