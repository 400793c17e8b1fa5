use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use parley_core::problem::Problem;
use parley_core::{ErrorBuilder, WidgetSession};
use serde::Deserialize;
use tracing::error;
use utoipa::ToSchema;

use crate::services::{AiChatReply, AiGateError, AiGateService};

pub struct AppState {
    pub gate: Arc<AiGateService>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiChatRequest {
    pub message: String,
}

/// Answer a visitor message with the AI assistant
#[utoipa::path(
    post,
    path = "/widget/chat/ai",
    request_body = AiChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = AiChatReply),
        (status = 400, description = "Empty message"),
        (status = 404, description = "Visitor not found"),
        (status = 401, description = "Missing or invalid widget token")
    ),
    security(("widget_token" = [])),
    tag = "AI"
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
    Json(request): Json<AiChatRequest>,
) -> Result<Json<AiChatReply>, Problem> {
    if request.message.trim().is_empty() {
        return Err(ErrorBuilder::new(StatusCode::BAD_REQUEST)
            .title("Message must not be empty")
            .build());
    }

    let reply = state
        .gate
        .handle_chat(&claims, request.message)
        .await
        .map_err(|e| match e {
            AiGateError::VisitorNotFound => ErrorBuilder::new(StatusCode::NOT_FOUND)
                .title("Visitor not found")
                .build(),
            other => {
                error!("AI chat failed: {}", other);
                ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .title("AI chat failed")
                    .build()
            }
        })?;

    Ok(Json(reply))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new().route("/widget/chat/ai", post(chat))
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(chat),
    components(schemas(AiChatRequest, AiChatReply, crate::services::AiReplyType)),
    tags(
        (name = "AI", description = "AI auto-response endpoints")
    )
)]
pub struct AiApiDoc;
