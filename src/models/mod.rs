//! Core data models for the pet records service.
//!
//! `animal` holds the record stored by the repository; `object` holds the
//! metadata kept for every blob published by the upload pipeline.

pub mod animal;
pub mod object;
