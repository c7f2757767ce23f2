//! Folder API endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::Folder;
use crate::error::I18nError;
use crate::service::{FolderContents, FolderNode, NewFolder};

use super::AppState;

#[derive(Serialize)]
pub struct FolderTreeResponse {
    pub folders: Vec<FolderNode>,
}

pub async fn create_folder_handler(
    State(state): State<Arc<AppState>>,
    Path(person_id): Path<String>,
    Json(request): Json<NewFolder>,
) -> Result<(StatusCode, Json<Folder>), I18nError> {
    let folder = state
        .service
        .create_folder(&person_id, request)
        .map_err(|e| state.i18n_error(e))?;
    Ok((StatusCode::CREATED, Json(folder)))
}

/// The person's folders as a recursive tree
pub async fn folder_tree_handler(
    State(state): State<Arc<AppState>>,
    Path(person_id): Path<String>,
) -> Result<Json<FolderTreeResponse>, I18nError> {
    let folders = state
        .service
        .folder_tree(&person_id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(FolderTreeResponse { folders }))
}

pub async fn root_contents_handler(
    State(state): State<Arc<AppState>>,
    Path(person_id): Path<String>,
) -> Result<Json<FolderContents>, I18nError> {
    let contents = state
        .service
        .root_contents(&person_id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(contents))
}

pub async fn folder_contents_handler(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<String>,
) -> Result<Json<FolderContents>, I18nError> {
    let contents = state
        .service
        .folder_contents(&folder_id)
        .map_err(|e| state.i18n_error(e))?;
    Ok(Json(contents))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::*;
    use crate::db::test_support;
    use crate::service::testing as service_testing;
    use serde_json::json;

    #[tokio::test]
    async fn test_folder_endpoints() {
        let ts = service_testing::service();
        let person = test_support::person(&ts.service.db, "1111111111");
        let base = format!("/api/persons/{}", person.id);

        let (status, root) = send(
            app(&ts),
            json("POST", &format!("{}/folders", base), json!({"name": "مدارک"})),
        )
        .await;
        assert_eq!(status, 201);
        let root_id = root["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            app(&ts),
            json(
                "POST",
                &format!("{}/folders", base),
                json!({"name": "قراردادها", "parent_folder_id": root_id}),
            ),
        )
        .await;
        assert_eq!(status, 201);

        let (status, tree) = send(app(&ts), get(&format!("{}/folders", base))).await;
        assert_eq!(status, 200);
        assert_eq!(tree["folders"][0]["name"], json!("مدارک"));
        assert_eq!(tree["folders"][0]["level"], json!(0));
        assert_eq!(tree["folders"][0]["subfolders"][0]["level"], json!(1));

        let (status, contents) = send(app(&ts), get(&format!("{}/root", base))).await;
        assert_eq!(status, 200);
        assert_eq!(contents["subfolders"].as_array().unwrap().len(), 1);
        assert_eq!(contents["documents"], json!([]));

        let (status, contents) =
            send(app(&ts), get(&format!("/api/folders/{}/contents", root_id))).await;
        assert_eq!(status, 200);
        assert_eq!(contents["subfolders"][0]["name"], json!("قراردادها"));
    }

    #[tokio::test]
    async fn test_folder_for_unknown_person() {
        let ts = service_testing::service();
        let (status, error) = send(
            app(&ts),
            json("POST", "/api/persons/missing/folders", json!({"name": "x"})),
        )
        .await;
        assert_eq!(status, 404);
        assert_eq!(error["code"], json!("person_not_found"));

        let (status, _) = send(app(&ts), get("/api/folders/missing/contents")).await;
        assert_eq!(status, 404);
    }
}
