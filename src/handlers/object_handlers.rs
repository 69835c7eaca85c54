//! `GET /objects/{bucket}/{key}` — serves published images so the URLs
//! returned by uploads resolve when running against the local blob store.

use crate::{
    errors::AppError,
    models::object::StoredObject,
    services::blob_store::{BlobError, BlobStore},
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};

pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    if bucket != state.blobs.bucket() {
        return Err(AppError::not_found(format!("bucket `{}` not found", bucket)));
    }

    let (meta, stream) = state.blobs.open_reader(&key).await.map_err(|err| match err {
        BlobError::NotFound { .. } | BlobError::InvalidKey => AppError::not_found(err.to_string()),
        other => AppError::internal(other.to_string()),
    })?;

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &StoredObject) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(meta.size_bytes.max(0) as u64),
    );

    if let Ok(value) = HeaderValue::from_str(&meta.cache_control) {
        headers.insert(header::CACHE_CONTROL, value);
    }

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.etag)) {
        headers.insert(header::ETAG, value);
    }
}
