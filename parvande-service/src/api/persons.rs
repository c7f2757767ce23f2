//! Person API endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{NewPerson, Person};
use crate::error::I18nError;
use crate::service::PersonDetail;

use super::AppState;

#[derive(Serialize)]
pub struct CreatePersonResponse {
    pub person: Person,
    /// False when a person with the same national id already existed
    pub created: bool,
}

pub async fn list_persons_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Person>>, I18nError> {
    let persons = state
        .service
        .list_persons()
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(persons))
}

/// Create a person, or return the existing record for the national id
pub async fn create_person_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewPerson>,
) -> Result<(StatusCode, Json<CreatePersonResponse>), I18nError> {
    let (person, created) = state
        .service
        .create_person(request)
        .map_err(|e| state.i18n_error(e))?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(CreatePersonResponse { person, created })))
}

pub async fn get_person_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PersonDetail>, I18nError> {
    let detail = state
        .service
        .person_detail(&id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(detail))
}
