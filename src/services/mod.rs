//! Core services: the animal repository and its orchestration layer, plus
//! the blob store and the image upload pipeline built on it.

pub mod animal_repository;
pub mod animal_service;
pub mod blob_store;
pub mod upload_service;
