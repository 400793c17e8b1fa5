use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use parley_core::problem::Problem;
use parley_core::{ErrorBuilder, WidgetSession};
use serde_json::{json, Value};
use tracing::error;

use super::{visitor_problem, AppState};
use crate::services::session_service::SessionError;
use crate::types::{
    ActivityRequest, CreateSessionRequest, RatingRequest, SendMessageRequest, SessionResponse,
    SetStatusRequest, TypingRequest, UpsertVisitorRequest, UpsertVisitorResponse,
};

/// Exchange a widget key for a session token
#[utoipa::path(
    post,
    path = "/widget/session",
    request_body = CreateSessionRequest,
    responses(
        (status = 200, description = "Session token issued", body = SessionResponse),
        (status = 401, description = "Unknown widget key"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Widget"
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, Problem> {
    let issued = state
        .sessions
        .issue(&request.widget_key, request.visitor_id)
        .await
        .map_err(|e| match e {
            SessionError::UnknownWidgetKey => ErrorBuilder::new(StatusCode::UNAUTHORIZED)
                .title("Unknown widget key")
                .build(),
            other => {
                error!("Failed to issue widget session: {}", other);
                ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .title("Failed to issue widget session")
                    .build()
            }
        })?;

    Ok(Json(SessionResponse {
        token: issued.token,
        visitor_id: issued.claims.visitor_id,
    }))
}

/// Create or update the visitor addressed by the session token
#[utoipa::path(
    post,
    path = "/widget/visitor",
    request_body = UpsertVisitorRequest,
    responses(
        (status = 200, description = "Visitor upserted", body = UpsertVisitorResponse),
        (status = 400, description = "Invalid attributes"),
        (status = 401, description = "Missing or invalid widget token")
    ),
    security(("widget_token" = [])),
    tag = "Widget"
)]
pub async fn upsert_visitor(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
    Json(request): Json<UpsertVisitorRequest>,
) -> Result<Json<UpsertVisitorResponse>, Problem> {
    let outcome = state
        .visitors
        .upsert_visitor(&claims, request)
        .await
        .map_err(visitor_problem)?;

    Ok(Json(UpsertVisitorResponse {
        visitor_id: outcome.visitor.visitor_id,
        created: outcome.created,
        message: if outcome.created {
            "Visitor created".to_string()
        } else {
            "Visitor updated".to_string()
        },
    }))
}

/// Activity ping from the widget heartbeat
#[utoipa::path(
    post,
    path = "/widget/visitor/activity",
    request_body = ActivityRequest,
    responses(
        (status = 200, description = "Activity recorded"),
        (status = 401, description = "Missing or invalid widget token")
    ),
    security(("widget_token" = [])),
    tag = "Widget"
)]
pub async fn record_activity(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
    Json(request): Json<ActivityRequest>,
) -> Result<Json<Value>, Problem> {
    state
        .visitors
        .record_activity(claims.tenant_id, &claims.visitor_id, request.current_page)
        .await
        .map_err(visitor_problem)?;

    Ok(Json(json!({ "success": true })))
}

/// Explicit presence set from the widget
#[utoipa::path(
    post,
    path = "/widget/visitor/status",
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 404, description = "Visitor not found"),
        (status = 401, description = "Missing or invalid widget token")
    ),
    security(("widget_token" = [])),
    tag = "Widget"
)]
pub async fn set_status(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<Value>, Problem> {
    let visitor = state
        .visitors
        .set_status(claims.tenant_id, &claims.visitor_id, request.status)
        .await
        .map_err(visitor_problem)?;

    Ok(Json(json!({ "success": true, "status": visitor.status })))
}

/// Typing indicator toggle
#[utoipa::path(
    post,
    path = "/widget/visitor/typing",
    request_body = TypingRequest,
    responses(
        (status = 200, description = "Typing flag updated"),
        (status = 401, description = "Missing or invalid widget token")
    ),
    security(("widget_token" = [])),
    tag = "Widget"
)]
pub async fn set_typing(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
    Json(request): Json<TypingRequest>,
) -> Result<Json<Value>, Problem> {
    state
        .visitors
        .set_typing(claims.tenant_id, &claims.visitor_id, request.is_typing)
        .await
        .map_err(visitor_problem)?;

    Ok(Json(json!({ "success": true })))
}

/// Persist a visitor chat message
#[utoipa::path(
    post,
    path = "/widget/visitor/message",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "Message stored", body = crate::types::MessageView),
        (status = 400, description = "Empty message body"),
        (status = 404, description = "Visitor not found"),
        (status = 401, description = "Missing or invalid widget token")
    ),
    security(("widget_token" = [])),
    tag = "Widget"
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<crate::types::MessageView>, Problem> {
    let message = state
        .visitors
        .add_visitor_message(
            claims.tenant_id,
            &claims.visitor_id,
            request.body,
            request.metadata,
        )
        .await
        .map_err(visitor_problem)?;

    Ok(Json(message.into()))
}

/// Store a satisfaction rating for the chat
#[utoipa::path(
    post,
    path = "/widget/visitor/rating",
    request_body = RatingRequest,
    responses(
        (status = 200, description = "Rating stored"),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Visitor not found"),
        (status = 401, description = "Missing or invalid widget token")
    ),
    security(("widget_token" = [])),
    tag = "Widget"
)]
pub async fn rate_chat(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
    Json(request): Json<RatingRequest>,
) -> Result<Json<Value>, Problem> {
    state
        .visitors
        .rate_chat(
            claims.tenant_id,
            &claims.visitor_id,
            request.rating,
            request.comment,
        )
        .await
        .map_err(visitor_problem)?;

    Ok(Json(json!({ "success": true })))
}

/// End the chat session from the widget
#[utoipa::path(
    post,
    path = "/widget/visitor/end-chat",
    responses(
        (status = 200, description = "Chat ended"),
        (status = 404, description = "Visitor not found"),
        (status = 401, description = "Missing or invalid widget token")
    ),
    security(("widget_token" = [])),
    tag = "Widget"
)]
pub async fn end_chat(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
) -> Result<Json<Value>, Problem> {
    state
        .visitors
        .end_chat(claims.tenant_id, &claims.visitor_id)
        .await
        .map_err(visitor_problem)?;

    Ok(Json(json!({ "success": true })))
}
