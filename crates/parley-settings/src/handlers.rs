use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, put};
use axum::Router;
use parley_core::problem::Problem;
use parley_core::ErrorBuilder;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::services::{AiCredentials, SystemSettingsService, WidgetSettingsService, WidgetSettingsView};

pub struct AppState {
    pub widget_settings: Arc<WidgetSettingsService>,
    pub system_settings: Arc<SystemSettingsService>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateWidgetSettingsRequest {
    pub ai_enabled: Option<bool>,
    pub welcome_message: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAiSettingsRequest {
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// AI settings as exposed to the dashboard; the key itself is never echoed
#[derive(Debug, Serialize, ToSchema)]
pub struct AiSettingsResponse {
    pub configured: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl From<Option<AiCredentials>> for AiSettingsResponse {
    fn from(creds: Option<AiCredentials>) -> Self {
        match creds {
            Some(creds) => Self {
                configured: true,
                model: Some(creds.model),
                base_url: Some(creds.base_url),
            },
            None => Self {
                configured: false,
                model: None,
                base_url: None,
            },
        }
    }
}

/// Get widget settings for a tenant
#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/widget-settings",
    params(("tenant_id" = i32, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Widget settings", body = WidgetSettingsView),
        (status = 500, description = "Internal server error")
    ),
    tag = "Settings"
)]
pub async fn get_widget_settings(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<i32>,
) -> Result<Json<WidgetSettingsView>, Problem> {
    let view = state.widget_settings.get(tenant_id).await.map_err(|e| {
        error!("Failed to load widget settings: {}", e);
        ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
            .title("Failed to load widget settings")
            .detail(format!("Error: {}", e))
            .build()
    })?;

    Ok(Json(view))
}

/// Update widget settings for a tenant
#[utoipa::path(
    put,
    path = "/tenants/{tenant_id}/widget-settings",
    params(("tenant_id" = i32, Path, description = "Tenant ID")),
    request_body = UpdateWidgetSettingsRequest,
    responses(
        (status = 200, description = "Updated widget settings", body = WidgetSettingsView),
        (status = 500, description = "Internal server error")
    ),
    tag = "Settings"
)]
pub async fn update_widget_settings(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<i32>,
    Json(request): Json<UpdateWidgetSettingsRequest>,
) -> Result<Json<WidgetSettingsView>, Problem> {
    let view = state
        .widget_settings
        .update(tenant_id, request.ai_enabled, request.welcome_message)
        .await
        .map_err(|e| {
            error!("Failed to update widget settings: {}", e);
            ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
                .title("Failed to update widget settings")
                .detail(format!("Error: {}", e))
                .build()
        })?;

    Ok(Json(view))
}

/// Get the system AI credential status
#[utoipa::path(
    get,
    path = "/settings/ai",
    responses(
        (status = 200, description = "AI settings status", body = AiSettingsResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Settings"
)]
pub async fn get_ai_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AiSettingsResponse>, Problem> {
    let creds = state.system_settings.ai_credentials().await.map_err(|e| {
        error!("Failed to load AI settings: {}", e);
        ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
            .title("Failed to load AI settings")
            .detail(format!("Error: {}", e))
            .build()
    })?;

    Ok(Json(creds.into()))
}

/// Set the system AI credential
#[utoipa::path(
    put,
    path = "/settings/ai",
    request_body = UpdateAiSettingsRequest,
    responses(
        (status = 200, description = "AI settings stored", body = AiSettingsResponse),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Settings"
)]
pub async fn update_ai_settings(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateAiSettingsRequest>,
) -> Result<Json<AiSettingsResponse>, Problem> {
    if request.api_key.trim().is_empty() {
        return Err(ErrorBuilder::new(StatusCode::BAD_REQUEST)
            .title("API key must not be empty")
            .build());
    }

    state
        .system_settings
        .set_ai_credentials(
            request.api_key.trim(),
            request.model.as_deref(),
            request.base_url.as_deref(),
        )
        .await
        .map_err(|e| {
            error!("Failed to store AI settings: {}", e);
            ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
                .title("Failed to store AI settings")
                .detail(format!("Error: {}", e))
                .build()
        })?;

    let creds = state.system_settings.ai_credentials().await.map_err(|e| {
        error!("Failed to reload AI settings: {}", e);
        ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
            .title("Failed to reload AI settings")
            .build()
    })?;

    Ok(Json(creds.into()))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/tenants/{tenant_id}/widget-settings",
            get(get_widget_settings).put(update_widget_settings),
        )
        .route("/settings/ai", put(update_ai_settings).get(get_ai_settings))
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        get_widget_settings,
        update_widget_settings,
        get_ai_settings,
        update_ai_settings,
    ),
    components(schemas(
        WidgetSettingsView,
        UpdateWidgetSettingsRequest,
        UpdateAiSettingsRequest,
        AiSettingsResponse,
    )),
    tags(
        (name = "Settings", description = "Widget and system settings endpoints")
    )
)]
pub struct SettingsApiDoc;
