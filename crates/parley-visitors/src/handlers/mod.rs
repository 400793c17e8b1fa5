pub mod dashboard;
pub mod widget;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use parley_core::problem::Problem;
use parley_core::ErrorBuilder;
use tracing::error;

use crate::services::{SessionService, VisitorError, VisitorService};

pub struct AppState {
    pub visitors: Arc<VisitorService>,
    pub sessions: Arc<SessionService>,
}

pub(crate) fn visitor_problem(err: VisitorError) -> Problem {
    match err {
        VisitorError::NotFound => ErrorBuilder::new(StatusCode::NOT_FOUND)
            .title("Visitor not found")
            .build(),
        VisitorError::Validation(message) => ErrorBuilder::new(StatusCode::BAD_REQUEST)
            .title("Invalid request")
            .detail(message)
            .build(),
        VisitorError::Database(e) => {
            error!("Visitor operation failed: {}", e);
            ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
                .title("Visitor operation failed")
                .build()
        }
    }
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/widget/session", post(widget::create_session))
        .route("/widget/visitor", post(widget::upsert_visitor))
        .route("/widget/visitor/activity", post(widget::record_activity))
        .route("/widget/visitor/status", post(widget::set_status))
        .route("/widget/visitor/typing", post(widget::set_typing))
        .route("/widget/visitor/message", post(widget::send_message))
        .route("/widget/visitor/rating", post(widget::rate_chat))
        .route("/widget/visitor/end-chat", post(widget::end_chat))
        .route("/tenants/{tenant_id}/visitors", get(dashboard::list_visitors))
        .route(
            "/tenants/{tenant_id}/visitors/{id}",
            get(dashboard::get_visitor),
        )
        .route(
            "/tenants/{tenant_id}/visitors/{id}/messages",
            get(dashboard::list_messages),
        )
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        widget::create_session,
        widget::upsert_visitor,
        widget::record_activity,
        widget::set_status,
        widget::set_typing,
        widget::send_message,
        widget::rate_chat,
        widget::end_chat,
        dashboard::list_visitors,
        dashboard::get_visitor,
        dashboard::list_messages,
    ),
    components(schemas(
        crate::types::CreateSessionRequest,
        crate::types::SessionResponse,
        crate::types::UpsertVisitorRequest,
        crate::types::UpsertVisitorResponse,
        crate::types::ActivityRequest,
        crate::types::SetStatusRequest,
        crate::types::TypingRequest,
        crate::types::SendMessageRequest,
        crate::types::RatingRequest,
        crate::types::VisitorView,
        crate::types::MessageView,
    )),
    tags(
        (name = "Widget", description = "Visitor-facing widget endpoints"),
        (name = "Visitors", description = "Agent dashboard visitor reads")
    )
)]
pub struct VisitorsApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_renders_timestamps_as_strings() {
        let doc = serde_json::to_value(VisitorsApiDoc::openapi()).unwrap();
        let visitor = &doc["components"]["schemas"]["VisitorView"]["properties"];
        assert_eq!(visitor["created_at"]["type"], "string");
        assert_eq!(visitor["created_at"]["format"], "date-time");
        assert_eq!(visitor["last_activity"]["type"], "string");
        let message = &doc["components"]["schemas"]["MessageView"]["properties"];
        assert_eq!(message["created_at"]["type"], "string");
    }
}
