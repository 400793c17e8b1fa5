use parley_entities::types::{HandoffTrigger, MessageKind, SenderRole, VisitorStatus};
use parley_entities::agents;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Public identity of an agent, safe to hand to a visitor-facing widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AgentProfile {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl From<&agents::Model> for AgentProfile {
    fn from(agent: &agents::Model) -> Self {
        Self {
            id: agent.id,
            name: agent.name.clone(),
            email: agent.email.clone(),
            avatar_url: agent.avatar_url.clone(),
        }
    }
}

/// Events pushed to realtime subscribers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    VisitorCreated {
        visitor_id: String,
        tenant_id: i32,
        name: String,
    },
    VisitorUpdated {
        visitor_id: String,
        tenant_id: i32,
        status: VisitorStatus,
    },
    MessageCreated {
        visitor_id: String,
        tenant_id: i32,
        sender_role: SenderRole,
        body: String,
        kind: MessageKind,
    },
    AgentAssigned {
        visitor_id: String,
        tenant_id: i32,
        agent: AgentProfile,
        trigger: HandoffTrigger,
    },
    ChatEnded {
        visitor_id: String,
        tenant_id: i32,
    },
    RatingSubmitted {
        visitor_id: String,
        tenant_id: i32,
        rating: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = ChatEvent::ChatEnded {
            visitor_id: "v-1".to_string(),
            tenant_id: 9,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "chat_ended");
        assert_eq!(json["visitor_id"], "v-1");
        assert_eq!(json["tenant_id"], 9);
    }
}
