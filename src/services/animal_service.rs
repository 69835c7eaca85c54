//! Animal use-case service.
//!
//! Stamps `created_at` at request time and otherwise passes straight through
//! to the repository. The timestamp is taken once, before the repository is
//! called, so any store-side retry reuses it.

use crate::{
    models::animal::{Animal, AnimalDraft, NewAnimal},
    services::animal_repository::{AnimalRepository, RepoResult},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AnimalService {
    repo: Arc<dyn AnimalRepository>,
}

impl AnimalService {
    pub fn new(repo: Arc<dyn AnimalRepository>) -> Self {
        Self { repo }
    }

    /// Create an animal stamped with the current unix time.
    pub async fn create_animal(&self, draft: AnimalDraft) -> RepoResult<String> {
        self.create_animal_at(draft, Utc::now().timestamp()).await
    }

    /// Create an animal stamped with `created_at`.
    pub async fn create_animal_at(&self, draft: AnimalDraft, created_at: i64) -> RepoResult<String> {
        let id = self.repo.create(NewAnimal { draft, created_at }).await?;
        info!("New animal ID: {}", id);
        Ok(id)
    }

    /// With `ids`, fetch exactly those records in the given order and fail on
    /// the first miss. Without, return every record.
    pub async fn list_animals(&self, ids: Option<&[String]>) -> RepoResult<Vec<Animal>> {
        match ids {
            Some(ids) => {
                let mut animals = Vec::with_capacity(ids.len());
                for id in ids {
                    animals.push(self.repo.get_by_id(id).await?);
                }
                Ok(animals)
            }
            None => self.repo.get_all().await,
        }
    }

    pub async fn get_animal(&self, id: &str) -> RepoResult<Animal> {
        self.repo.get_by_id(id).await
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> RepoResult<Vec<Animal>> {
        let animals = self.repo.get_by_owner_id(owner_id).await?;
        info!("Animals retrieved for owner {}: {}", owner_id, animals.len());
        Ok(animals)
    }

    pub async fn delete_animal(&self, id: &str) -> RepoResult<()> {
        self.repo.delete(id).await
    }
}
