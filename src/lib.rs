//! Pet records service: animal CRUD over SQLite and public image uploads.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use errors::{AppError, Envelope, ErrorKind};
pub use state::AppState;
