//! HTTP handlers for animal records. Each one is a thin translation from the
//! request into an `AnimalService` call and back into the JSON envelope.

use crate::{
    errors::{AppError, Envelope},
    models::animal::{Animal, AnimalDraft},
    state::AppState,
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};

/// Query key for fetching a subset: `?animalID=a&animalID=b`.
const ANIMAL_ID_PARAM: &str = "animalID";

/// Route constraint on animal ids: 36 characters of `[0-9a-z-]`.
fn is_animal_id(id: &str) -> bool {
    id.len() == 36 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'z' | b'-'))
}

fn checked_id(id: &str) -> Result<&str, AppError> {
    if is_animal_id(id) {
        Ok(id)
    } else {
        Err(AppError::not_found(format!("no route for animal id `{}`", id)))
    }
}

/// `POST /animals`
pub async fn post_animal(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Envelope<String>>, AppError> {
    let draft: AnimalDraft = serde_json::from_slice(&body)
        .map_err(|err| AppError::bad_request(format!("invalid animal body: {}", err)))?;

    let id = state.animals.create_animal(draft).await?;
    Ok(Json(Envelope::data(id)))
}

/// `GET /animals` — every animal, or only the repeated `animalID` values.
pub async fn get_animals(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Envelope<Vec<Animal>>>, AppError> {
    let ids: Vec<String> = params
        .into_iter()
        .filter(|(name, _)| name == ANIMAL_ID_PARAM)
        .map(|(_, value)| value)
        .collect();

    let filter = (!ids.is_empty()).then_some(ids.as_slice());
    let animals = state.animals.list_animals(filter).await?;
    Ok(Json(Envelope::data(animals)))
}

/// `GET /animals/{animalID}`
pub async fn get_animal(
    State(state): State<AppState>,
    Path(animal_id): Path<String>,
) -> Result<Json<Envelope<Animal>>, AppError> {
    let animal = state.animals.get_animal(checked_id(&animal_id)?).await?;
    Ok(Json(Envelope::data(animal)))
}

/// `DELETE /animals/{animalID}`
pub async fn delete_animal(
    State(state): State<AppState>,
    Path(animal_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.animals.delete_animal(checked_id(&animal_id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /users/{userID}/animals`
pub async fn get_users_animals(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Envelope<Vec<Animal>>>, AppError> {
    let animals = state.animals.list_by_owner(&user_id).await?;
    Ok(Json(Envelope::data(animals)))
}
