//! Search API endpoint.

use axum::{
    Json,
    extract::{Query, State},
};
use std::sync::Arc;

use crate::error::I18nError;
use crate::service::{SearchParams, SearchResults};

use super::AppState;

/// Search persons and documents
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, I18nError> {
    let results = state
        .service
        .search(&params)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(results))
}
