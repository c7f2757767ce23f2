//! Settings API endpoints for managing runtime-tunable configuration.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::AppState;
use crate::config::DynamicConfig;
use crate::error::{I18nError, ServiceError};

/// Response for GET /api/settings
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    /// All current settings (merged: defaults + DB overrides)
    pub settings: HashMap<String, serde_json::Value>,
    /// Which keys have DB overrides (vs using defaults)
    pub overridden: Vec<String>,
}

/// Request body for PUT /api/settings
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    /// Settings to update (key -> value). Use null to delete/revert to default.
    pub settings: HashMap<String, serde_json::Value>,
}

/// GET /api/settings - retrieve all settings with their current values
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SettingsResponse>, I18nError> {
    // Get DB overrides to know which keys are explicitly set
    let db_settings = state
        .service
        .db
        .get_all_settings()
        .map_err(|e| state.i18n_error(e))?;

    let config = state.service.runtime_config.dynamic();
    let mut overridden: Vec<String> = db_settings.keys().cloned().collect();
    overridden.sort();

    Ok(Json(SettingsResponse {
        settings: config.to_key_value_map(),
        overridden,
    }))
}

/// PUT /api/settings - update settings (triggers hot reload)
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, I18nError> {
    // Validate setting keys
    let valid_keys = DynamicConfig::valid_keys();
    for key in request.settings.keys() {
        if !valid_keys.contains(key.as_str()) {
            return Err(state.i18n_error(ServiceError::InvalidRequest {
                message: format!("Unknown setting key: {}", key),
            }));
        }
    }

    state
        .service
        .update_settings(request.settings)
        .map_err(|e| state.i18n_error(e))?;

    // Return updated settings
    get_settings_handler(State(state)).await
}

#[cfg(test)]
mod tests {
    use crate::api::testing::*;
    use crate::service::testing as service_testing;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_and_revert_setting() {
        let ts = service_testing::service();

        let (status, body) = send(
            app(&ts),
            json(
                "PUT",
                "/api/settings",
                json!({"settings": {"ocr.handwriting_variance_threshold": 55.5}}),
            ),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(
            body["settings"]["ocr.handwriting_variance_threshold"],
            json!(55.5)
        );
        assert_eq!(
            body["overridden"],
            json!(["ocr.handwriting_variance_threshold"])
        );
        assert_eq!(
            ts.service.runtime_config.dynamic().ocr.handwriting_variance_threshold,
            55.5
        );

        let (status, body) = send(
            app(&ts),
            json(
                "PUT",
                "/api/settings",
                json!({"settings": {"ocr.handwriting_variance_threshold": null}}),
            ),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["overridden"], json!([]));
        assert_eq!(
            body["settings"]["ocr.handwriting_variance_threshold"],
            json!(100.0)
        );
    }

    #[tokio::test]
    async fn test_unknown_key_rejected() {
        let ts = service_testing::service();
        let (status, body) = send(
            app(&ts),
            json("PUT", "/api/settings", json!({"settings": {"ocr.unknown_threshold": 1}})),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["code"], json!("invalid_request"));
    }
}
