use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

use crate::services::{animal_repository::RepoError, upload_service::UploadError};

/// Error categories surfaced by the core, independent of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    StoreUnavailable,
    StoreWriteError,
    StoreReadError,
    BlobWriteError,
    BadRequest,
    Internal,
}

impl ErrorKind {
    /// HTTP status for each kind. Point-lookup misses get their own 404
    /// instead of sharing the 500 used for backend failures.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::StoreUnavailable
            | ErrorKind::StoreWriteError
            | ErrorKind::StoreReadError
            | ErrorKind::BlobWriteError
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Response body shared by every endpoint: `{"error": .., "data": ..}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            error: None,
            data: Some(data),
        }
    }
}

/// A tagged error carrying the message that is sent back to the caller.
#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(Envelope::<()> {
            error: Some(self.message),
            data: None,
        });

        (self.kind.status(), body).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        AppError::new(err.kind(), err.to_string())
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::new(err.kind(), err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::internal(err.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kinds_map_to_500() {
        for kind in [
            ErrorKind::StoreUnavailable,
            ErrorKind::StoreWriteError,
            ErrorKind::StoreReadError,
            ErrorKind::BlobWriteError,
        ] {
            assert_eq!(kind.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn not_found_is_split_from_backend_failure() {
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::bad_request("missing file").status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn envelope_serializes_nulls() {
        let value = serde_json::to_value(Envelope::<()> {
            error: Some("boom".into()),
            data: None,
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"error": "boom", "data": null}));
    }
}
