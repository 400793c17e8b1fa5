use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use parley_core::problem::Problem;
use parley_core::{ErrorBuilder, WidgetSession};
use parley_entities::handoff_events;
use parley_entities::types::{AgentPresence, HandoffTrigger};
use parley_core::DBDateTime;
use parley_realtime::AgentProfile;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::services::{HandoffError, HandoffService, TransferOutcome};

pub struct AppState {
    pub handoffs: Arc<HandoffService>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestAgentResponse {
    pub success: bool,
    pub agent: Option<AgentProfile>,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HandoffView {
    pub id: i32,
    pub visitor_row_id: i32,
    pub brand_id: Option<i32>,
    pub from_agent_id: Option<i32>,
    pub to_agent_id: i32,
    pub trigger: HandoffTrigger,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DBDateTime,
}

impl From<handoff_events::Model> for HandoffView {
    fn from(e: handoff_events::Model) -> Self {
        Self {
            id: e.id,
            visitor_row_id: e.visitor_row_id,
            brand_id: e.brand_id,
            from_agent_id: e.from_agent_id,
            to_agent_id: e.to_agent_id,
            trigger: e.trigger,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPresenceRequest {
    pub presence: AgentPresence,
}

fn handoff_problem(err: HandoffError) -> Problem {
    match err {
        HandoffError::VisitorNotFound => ErrorBuilder::new(StatusCode::NOT_FOUND)
            .title("Visitor not found")
            .build(),
        HandoffError::AgentNotFound => ErrorBuilder::new(StatusCode::NOT_FOUND)
            .title("Agent not found")
            .build(),
        HandoffError::Database(e) => {
            error!("Hand-off operation failed: {}", e);
            ErrorBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
                .title("Hand-off operation failed")
                .build()
        }
    }
}

/// Ask for a human agent from the widget
#[utoipa::path(
    post,
    path = "/widget/visitor/request-agent",
    responses(
        (status = 200, description = "Request handled", body = RequestAgentResponse),
        (status = 404, description = "Visitor not found"),
        (status = 401, description = "Missing or invalid widget token")
    ),
    security(("widget_token" = [])),
    tag = "Handoff"
)]
pub async fn request_agent(
    State(state): State<Arc<AppState>>,
    WidgetSession(claims): WidgetSession,
) -> Result<Json<RequestAgentResponse>, Problem> {
    let outcome = state
        .handoffs
        .request_agent(claims.tenant_id, &claims.visitor_id)
        .await
        .map_err(handoff_problem)?;

    Ok(Json(match outcome {
        TransferOutcome::Assigned { agent, .. } => RequestAgentResponse {
            success: true,
            message: format!("You are being connected to {}", agent.name),
            agent: Some(AgentProfile::from(&agent)),
        },
        TransferOutcome::NoAgentAvailable => RequestAgentResponse {
            success: false,
            agent: None,
            message: "No agents are available right now, please try again later".to_string(),
        },
    }))
}

/// Hand-off audit trail for a tenant
#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/handoffs",
    params(("tenant_id" = i32, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Hand-off events, newest first", body = [HandoffView]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Handoff"
)]
pub async fn list_handoffs(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<i32>,
) -> Result<Json<Vec<HandoffView>>, Problem> {
    let events = state
        .handoffs
        .list_handoffs(tenant_id)
        .await
        .map_err(handoff_problem)?;

    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// Set an agent's presence flag
#[utoipa::path(
    put,
    path = "/tenants/{tenant_id}/agents/{agent_id}/presence",
    params(
        ("tenant_id" = i32, Path, description = "Tenant ID"),
        ("agent_id" = i32, Path, description = "Agent ID")
    ),
    request_body = SetPresenceRequest,
    responses(
        (status = 200, description = "Presence updated", body = AgentProfile),
        (status = 404, description = "Agent not found")
    ),
    tag = "Handoff"
)]
pub async fn set_presence(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, agent_id)): Path<(i32, i32)>,
    Json(request): Json<SetPresenceRequest>,
) -> Result<Json<AgentProfile>, Problem> {
    let agent = state
        .handoffs
        .set_agent_presence(tenant_id, agent_id, request.presence)
        .await
        .map_err(handoff_problem)?;

    Ok(Json(AgentProfile::from(&agent)))
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/widget/visitor/request-agent", post(request_agent))
        .route("/tenants/{tenant_id}/handoffs", get(list_handoffs))
        .route(
            "/tenants/{tenant_id}/agents/{agent_id}/presence",
            put(set_presence),
        )
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(request_agent, list_handoffs, set_presence),
    components(schemas(RequestAgentResponse, HandoffView, SetPresenceRequest, AgentProfile)),
    tags(
        (name = "Handoff", description = "AI-to-human hand-off endpoints")
    )
)]
pub struct HandoffApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_renders_timestamps_as_strings() {
        let doc = serde_json::to_value(HandoffApiDoc::openapi()).unwrap();
        let created_at = &doc["components"]["schemas"]["HandoffView"]["properties"]["created_at"];
        assert_eq!(created_at["type"], "string");
        assert_eq!(created_at["format"], "date-time");
    }
}
