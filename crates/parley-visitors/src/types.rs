use parley_entities::types::{MessageKind, SenderRole, VisitorStatus, WidgetState};
use parley_entities::{visitor_messages, visitors};
use parley_core::DBDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Exchange a widget key (plus an optional previously issued visitor id)
/// for a signed widget session token
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub widget_key: String,
    pub visitor_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub visitor_id: String,
}

/// Attributes reported by the widget on load and on page change.
///
/// Every field is optional: absent or empty values never overwrite what
/// the row already holds.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertVisitorRequest {
    pub session_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub current_page: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub widget_state: Option<WidgetState>,
    pub custom_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertVisitorResponse {
    pub visitor_id: String,
    pub created: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    pub current_page: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusRequest {
    pub status: VisitorStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub body: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

/// Visitor row as exposed to the agent dashboard
#[derive(Debug, Serialize, ToSchema)]
pub struct VisitorView {
    pub id: i32,
    pub visitor_id: String,
    pub tenant_id: i32,
    pub brand_id: Option<i32>,
    pub assigned_agent_id: Option<i32>,
    pub name: String,
    pub email: Option<String>,
    pub current_page: Option<String>,
    pub referrer: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub status: VisitorStatus,
    pub is_typing: bool,
    pub messages_count: i32,
    pub visits_count: i32,
    pub is_active: bool,
    pub session_duration: i32,
    pub satisfaction_rating: Option<i32>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DBDateTime,
    #[schema(value_type = String, format = DateTime)]
    pub last_activity: DBDateTime,
}

impl From<visitors::Model> for VisitorView {
    fn from(v: visitors::Model) -> Self {
        Self {
            id: v.id,
            visitor_id: v.visitor_id,
            tenant_id: v.tenant_id,
            brand_id: v.brand_id,
            assigned_agent_id: v.assigned_agent_id,
            name: v.name,
            email: v.email,
            current_page: v.current_page,
            referrer: v.referrer,
            country: v.country,
            city: v.city,
            status: v.status,
            is_typing: v.is_typing,
            messages_count: v.messages_count,
            visits_count: v.visits_count,
            is_active: v.is_active,
            session_duration: v.session_duration,
            satisfaction_rating: v.satisfaction_rating,
            created_at: v.created_at,
            last_activity: v.last_activity,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageView {
    pub id: i32,
    pub sender_role: SenderRole,
    pub sender_id: Option<i32>,
    pub sender_name: Option<String>,
    pub body: String,
    pub kind: MessageKind,
    pub is_read: bool,
    pub metadata: Option<serde_json::Value>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DBDateTime,
}

impl From<visitor_messages::Model> for MessageView {
    fn from(m: visitor_messages::Model) -> Self {
        Self {
            id: m.id,
            sender_role: m.sender_role,
            sender_id: m.sender_id,
            sender_name: m.sender_name,
            body: m.body,
            kind: m.kind,
            is_read: m.is_read,
            metadata: m.metadata,
            created_at: m.created_at,
        }
    }
}
