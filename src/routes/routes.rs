//! Defines routes for animal records and image uploads.
//!
//! ## Structure
//! - **Animal endpoints**
//!   - `POST   /animals` — create, returns the new id
//!   - `GET    /animals` — list all, or `?animalID=..` (repeatable) for a subset
//!   - `GET    /animals/{animalID}` — fetch one
//!   - `DELETE /animals/{animalID}` — delete (idempotent)
//!   - `GET    /users/{userID}/animals` — animals owned by a user
//!
//! - **Image endpoints**
//!   - `POST   /images` — multipart upload, returns the public URL
//!   - `GET    /objects/{bucket}/{key}` — serve an uploaded image

use crate::{
    handlers::{
        animal_handlers::{delete_animal, get_animal, get_animals, get_users_animals, post_animal},
        health_handlers::{healthz, readyz},
        image_handlers::upload_image,
        object_handlers::get_object,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
};
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Largest accepted image upload.
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Build the router with every route, per-request tracing and a deadline.
///
/// A request that runs past `request_timeout` is answered with 408 and its
/// handler future is dropped, which aborts any in-flight store or disk work.
pub fn routes(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // animal records
        .route("/animals", get(get_animals).post(post_animal))
        .route(
            "/animals/{animalID}",
            get(get_animal).delete(delete_animal),
        )
        .route("/users/{userID}/animals", get(get_users_animals))
        // images
        .route(
            "/images",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/objects/{bucket}/{key}", get(get_object))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
