use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use parley_core::problem::Problem;

use super::{visitor_problem, AppState};
use crate::types::{MessageView, VisitorView};

/// List a tenant's active visitors, most recently active first
#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/visitors",
    params(("tenant_id" = i32, Path, description = "Tenant ID")),
    responses(
        (status = 200, description = "Active visitors", body = [VisitorView]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Visitors"
)]
pub async fn list_visitors(
    State(state): State<Arc<AppState>>,
    Path(tenant_id): Path<i32>,
) -> Result<Json<Vec<VisitorView>>, Problem> {
    let visitors = state
        .visitors
        .list_active_visitors(tenant_id)
        .await
        .map_err(visitor_problem)?;

    Ok(Json(visitors.into_iter().map(Into::into).collect()))
}

/// Fetch one visitor row
#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/visitors/{id}",
    params(
        ("tenant_id" = i32, Path, description = "Tenant ID"),
        ("id" = i32, Path, description = "Visitor row ID")
    ),
    responses(
        (status = 200, description = "Visitor", body = VisitorView),
        (status = 404, description = "Visitor not found")
    ),
    tag = "Visitors"
)]
pub async fn get_visitor(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, id)): Path<(i32, i32)>,
) -> Result<Json<VisitorView>, Problem> {
    let visitor = state
        .visitors
        .get_visitor(tenant_id, id)
        .await
        .map_err(visitor_problem)?;

    Ok(Json(visitor.into()))
}

/// Conversation log for one visitor, oldest first
#[utoipa::path(
    get,
    path = "/tenants/{tenant_id}/visitors/{id}/messages",
    params(
        ("tenant_id" = i32, Path, description = "Tenant ID"),
        ("id" = i32, Path, description = "Visitor row ID")
    ),
    responses(
        (status = 200, description = "Messages", body = [MessageView]),
        (status = 404, description = "Visitor not found")
    ),
    tag = "Visitors"
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path((tenant_id, id)): Path<(i32, i32)>,
) -> Result<Json<Vec<MessageView>>, Problem> {
    let messages = state
        .visitors
        .list_messages(tenant_id, id)
        .await
        .map_err(visitor_problem)?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}
