use std::sync::Arc;

use parley_entities::types::{
    AgentPresence, HandoffTrigger, MessageKind, SenderRole, VisitorStatus,
};
use parley_entities::{agents, handoff_events, visitor_messages, visitors};
use parley_realtime::{AgentProfile, ChatEvent, Notifier};
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder,
};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::selector::AgentSelector;

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Visitor not found")]
    VisitorNotFound,

    #[error("Agent not found")]
    AgentNotFound,
}

/// Result of a transfer attempt
#[derive(Debug)]
pub enum TransferOutcome {
    Assigned {
        visitor: visitors::Model,
        agent: agents::Model,
    },
    /// No eligible agent right now; the visitor row is untouched
    NoAgentAvailable,
}

/// Coordinates AI-to-human and visitor-requested hand-offs.
///
/// The visitor row update is the commit point; the audit row and the
/// realtime notifications after it are best-effort.
pub struct HandoffService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn Notifier>,
    selector: Arc<dyn AgentSelector>,
}

impl HandoffService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        notifier: Arc<dyn Notifier>,
        selector: Arc<dyn AgentSelector>,
    ) -> Self {
        Self {
            db,
            notifier,
            selector,
        }
    }

    async fn require_visitor(
        &self,
        tenant_id: i32,
        visitor_id: &str,
    ) -> Result<visitors::Model, HandoffError> {
        visitors::Entity::find()
            .filter(visitors::Column::TenantId.eq(tenant_id))
            .filter(visitors::Column::VisitorId.eq(visitor_id))
            .one(self.db.as_ref())
            .await?
            .ok_or(HandoffError::VisitorNotFound)
    }

    /// Hand the chat to an agent on the visitor's brand roster.
    ///
    /// When no agent is eligible the visitor keeps its current state and
    /// the caller renders a "try again later" reply.
    pub async fn transfer_chat_to_agent(
        &self,
        tenant_id: i32,
        visitor_id: &str,
        brand_id: i32,
        trigger: HandoffTrigger,
    ) -> Result<TransferOutcome, HandoffError> {
        let visitor = self.require_visitor(tenant_id, visitor_id).await?;

        let Some(agent) = self
            .selector
            .select_for_brand(self.db.as_ref(), tenant_id, brand_id)
            .await?
        else {
            debug!(tenant_id, brand_id, "no eligible agent for brand");
            return Ok(TransferOutcome::NoAgentAvailable);
        };

        let visitor = self.assign(visitor, &agent, Some(brand_id), trigger).await?;
        Ok(TransferOutcome::Assigned { visitor, agent })
    }

    /// Explicit "talk to a human" request from the widget; picks any
    /// online agent tenant-wide and records the request as a system
    /// message in the conversation.
    pub async fn request_agent(
        &self,
        tenant_id: i32,
        visitor_id: &str,
    ) -> Result<TransferOutcome, HandoffError> {
        let visitor = self.require_visitor(tenant_id, visitor_id).await?;

        let Some(agent) = self
            .selector
            .select_any_online(self.db.as_ref(), tenant_id)
            .await?
        else {
            debug!(tenant_id, "no online agent for visitor request");
            return Ok(TransferOutcome::NoAgentAvailable);
        };

        let request_note = visitor_messages::ActiveModel {
            visitor_row_id: Set(visitor.id),
            tenant_id: Set(tenant_id),
            sender_role: Set(SenderRole::System),
            sender_name: Set(Some("System".to_string())),
            body: Set("Visitor requested a human agent".to_string()),
            kind: Set(MessageKind::System),
            is_read: Set(false),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await;
        if let Err(e) = request_note {
            error!("Failed to record agent request message: {}", e);
        }

        let brand_id = visitor.brand_id;
        let visitor = self
            .assign(visitor, &agent, brand_id, HandoffTrigger::VisitorRequest)
            .await?;
        Ok(TransferOutcome::Assigned { visitor, agent })
    }

    async fn assign(
        &self,
        visitor: visitors::Model,
        agent: &agents::Model,
        brand_id: Option<i32>,
        trigger: HandoffTrigger,
    ) -> Result<visitors::Model, HandoffError> {
        let from_agent_id = visitor.assigned_agent_id;
        let visitor_row_id = visitor.id;
        let public_id = visitor.visitor_id.clone();
        let tenant_id = visitor.tenant_id;

        // Partial update so a concurrent attribute merge on the same row
        // is not overwritten.
        let visitor = visitors::ActiveModel {
            id: Unchanged(visitor_row_id),
            assigned_agent_id: Set(Some(agent.id)),
            status: Set(VisitorStatus::WaitingForAgent),
            last_activity: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .update(self.db.as_ref())
        .await?;

        let audit = handoff_events::ActiveModel {
            tenant_id: Set(tenant_id),
            visitor_row_id: Set(visitor_row_id),
            brand_id: Set(brand_id),
            from_agent_id: Set(from_agent_id),
            to_agent_id: Set(agent.id),
            trigger: Set(trigger),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await;
        if let Err(e) = audit {
            warn!("Failed to write hand-off audit row: {}", e);
        }

        let event = ChatEvent::AgentAssigned {
            visitor_id: public_id.clone(),
            tenant_id,
            agent: AgentProfile::from(agent),
            trigger,
        };
        self.notifier.broadcast_to_tenant(tenant_id, event.clone());
        self.notifier.notify_visitor(tenant_id, &public_id, event.clone());
        self.notifier.notify_agent(tenant_id, agent.id, event);

        debug!(
            tenant_id,
            agent_id = agent.id,
            visitor_id = %public_id,
            "chat handed off"
        );

        Ok(visitor)
    }

    /// Hand-off audit trail for the dashboard, newest first
    pub async fn list_handoffs(
        &self,
        tenant_id: i32,
    ) -> Result<Vec<handoff_events::Model>, HandoffError> {
        Ok(handoff_events::Entity::find()
            .filter(handoff_events::Column::TenantId.eq(tenant_id))
            .order_by(handoff_events::Column::CreatedAt, Order::Desc)
            .all(self.db.as_ref())
            .await?)
    }

    /// Update an agent's presence flag; going online refreshes the
    /// last-login timestamp the selector keys on
    pub async fn set_agent_presence(
        &self,
        tenant_id: i32,
        agent_id: i32,
        presence: AgentPresence,
    ) -> Result<agents::Model, HandoffError> {
        let agent = agents::Entity::find_by_id(agent_id)
            .filter(agents::Column::TenantId.eq(tenant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or(HandoffError::AgentNotFound)?;

        let mut active = agents::ActiveModel {
            id: Unchanged(agent.id),
            presence: Set(presence),
            ..Default::default()
        };
        if presence == AgentPresence::Online {
            active.last_login_at = Set(Some(chrono::Utc::now()));
        }
        Ok(active.update(self.db.as_ref()).await?)
    }
}
