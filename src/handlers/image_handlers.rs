//! `POST /images` — multipart image upload. The file part must be named
//! `image`; its bytes are streamed straight into the blob store.

use crate::{
    errors::{AppError, Envelope},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use futures::StreamExt;
use std::io;

const IMAGE_FIELD: &str = "image";

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Envelope<String>>, AppError> {
    let mut multipart = multipart.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);

        let stream = field.map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)));
        let uploaded = state.uploads.upload(&filename, content_type, stream).await?;
        return Ok(Json(Envelope::data(uploaded.url)));
    }

    Err(AppError::bad_request(format!(
        "request is missing the `{}` file part",
        IMAGE_FIELD
    )))
}
