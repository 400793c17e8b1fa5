use std::sync::Arc;
use std::time::Duration;

use parley_core::WidgetClaims;
use parley_entities::types::{HandoffTrigger, MessageKind, SenderRole};
use parley_entities::{visitor_messages, visitors};
use parley_handoff::{HandoffError, HandoffService, TransferOutcome};
use parley_realtime::{AgentProfile, ChatEvent, Notifier};
use parley_settings::{SystemSettingsService, WidgetSettingsService};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use crate::engine::{AiEngine, AiRequest};

/// Upper bound on one engine call; expiry degrades to a fallback reply
const ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

const FALLBACK_REPLY: &str =
    "Sorry, I couldn't process that right now. Please try again in a moment.";

#[derive(Error, Debug)]
pub enum AiGateError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Settings error: {0}")]
    Settings(#[from] parley_settings::SettingsError),

    #[error("Visitor not found")]
    VisitorNotFound,
}

impl From<HandoffError> for AiGateError {
    fn from(err: HandoffError) -> Self {
        match err {
            HandoffError::Database(e) => AiGateError::Database(e),
            HandoffError::VisitorNotFound | HandoffError::AgentNotFound => {
                AiGateError::VisitorNotFound
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AiReplyType {
    /// Normal assistant answer
    Ai,
    /// Chat handed to a human agent
    Transfer,
    /// Engine asked for a transfer but none could be made
    TransferFailed,
    /// AI is switched off for this tenant
    Disabled,
    /// No AI credential configured
    NotConfigured,
    /// Engine failed or timed out
    Fallback,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AiChatReply {
    pub response: String,
    pub reply_type: AiReplyType,
    pub agent: Option<AgentProfile>,
}

impl AiChatReply {
    fn plain(response: impl Into<String>, reply_type: AiReplyType) -> Self {
        Self {
            response: response.into(),
            reply_type,
            agent: None,
        }
    }
}

/// Gates widget messages through precondition checks, the AI engine and
/// the hand-off coordinator.
///
/// Message persistence on this path is audit-grade: a failed insert is
/// logged and the reply still goes out.
pub struct AiGateService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn Notifier>,
    widget_settings: Arc<WidgetSettingsService>,
    system_settings: Arc<SystemSettingsService>,
    handoffs: Arc<HandoffService>,
    engine: Arc<dyn AiEngine>,
    engine_timeout: Duration,
}

impl AiGateService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        notifier: Arc<dyn Notifier>,
        widget_settings: Arc<WidgetSettingsService>,
        system_settings: Arc<SystemSettingsService>,
        handoffs: Arc<HandoffService>,
        engine: Arc<dyn AiEngine>,
    ) -> Self {
        Self {
            db,
            notifier,
            widget_settings,
            system_settings,
            handoffs,
            engine,
            engine_timeout: ENGINE_TIMEOUT,
        }
    }

    #[cfg(test)]
    fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = timeout;
        self
    }

    /// Answer one visitor message.
    ///
    /// Precondition checks short-circuit in order: tenant AI toggle, then
    /// system credential. Both produce graceful replies, never errors.
    pub async fn handle_chat(
        &self,
        claims: &WidgetClaims,
        message: String,
    ) -> Result<AiChatReply, AiGateError> {
        let settings = self.widget_settings.get(claims.tenant_id).await?;
        if !settings.ai_enabled {
            return Ok(AiChatReply::plain(
                "AI assistance is not enabled. An agent will be with you shortly.",
                AiReplyType::Disabled,
            ));
        }

        let Some(credentials) = self.system_settings.ai_credentials().await? else {
            return Ok(AiChatReply::plain(
                "AI assistance is not configured. An agent will be with you shortly.",
                AiReplyType::NotConfigured,
            ));
        };

        let visitor = visitors::Entity::find()
            .filter(visitors::Column::TenantId.eq(claims.tenant_id))
            .filter(visitors::Column::VisitorId.eq(&claims.visitor_id))
            .one(self.db.as_ref())
            .await?
            .ok_or(AiGateError::VisitorNotFound)?;

        let request = AiRequest {
            message: message.clone(),
            tenant_id: claims.tenant_id,
            brand_id: claims.brand_id,
            visitor_name: visitor.name.clone(),
            current_page: visitor.current_page.clone(),
        };

        let reply = match tokio::time::timeout(
            self.engine_timeout,
            self.engine.generate(&credentials, &request),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!("AI engine failed: {}", e);
                return Ok(AiChatReply::plain(FALLBACK_REPLY, AiReplyType::Fallback));
            }
            Err(_) => {
                warn!(timeout_secs = self.engine_timeout.as_secs(), "AI engine timed out");
                return Ok(AiChatReply::plain(FALLBACK_REPLY, AiReplyType::Fallback));
            }
        };

        if reply.is_transfer_request {
            return self.handle_transfer(&visitor, reply.response).await;
        }

        self.persist_ai_message(
            &visitor,
            &reply.response,
            json!({
                "confidence": reply.confidence,
                "tokens_used": reply.tokens_used,
                "original_message": message,
            }),
        )
        .await;

        Ok(AiChatReply::plain(reply.response, AiReplyType::Ai))
    }

    async fn handle_transfer(
        &self,
        visitor: &visitors::Model,
        fallback_text: String,
    ) -> Result<AiChatReply, AiGateError> {
        let Some(brand_id) = visitor.brand_id else {
            debug!(visitor_id = %visitor.visitor_id, "transfer requested but visitor has no brand");
            return Ok(AiChatReply::plain(
                "I'm unable to transfer you to an agent right now.",
                AiReplyType::TransferFailed,
            ));
        };

        let outcome = self
            .handoffs
            .transfer_chat_to_agent(
                visitor.tenant_id,
                &visitor.visitor_id,
                brand_id,
                HandoffTrigger::Ai,
            )
            .await?;

        match outcome {
            TransferOutcome::Assigned { agent, .. } => {
                let body = format!("You've been connected to {}", agent.name);
                self.persist_system_message(
                    visitor,
                    &body,
                    json!({
                        "transfer": true,
                        "trigger": "ai",
                        "agent_id": agent.id,
                        "agent_name": agent.name,
                    }),
                )
                .await;

                Ok(AiChatReply {
                    response: body,
                    reply_type: AiReplyType::Transfer,
                    agent: Some(AgentProfile::from(&agent)),
                })
            }
            TransferOutcome::NoAgentAvailable => {
                self.persist_ai_message(
                    visitor,
                    &fallback_text,
                    json!({ "transfer_failed": true }),
                )
                .await;

                Ok(AiChatReply::plain(fallback_text, AiReplyType::TransferFailed))
            }
        }
    }

    async fn persist_ai_message(
        &self,
        visitor: &visitors::Model,
        body: &str,
        metadata: serde_json::Value,
    ) {
        let inserted = visitor_messages::ActiveModel {
            visitor_row_id: Set(visitor.id),
            tenant_id: Set(visitor.tenant_id),
            sender_role: Set(SenderRole::Ai),
            sender_name: Set(Some("AI Assistant".to_string())),
            body: Set(body.to_string()),
            kind: Set(MessageKind::Text),
            is_read: Set(false),
            metadata: Set(Some(metadata)),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await;

        match inserted {
            Ok(message) => {
                self.notifier.broadcast_to_tenant(
                    visitor.tenant_id,
                    ChatEvent::MessageCreated {
                        visitor_id: visitor.visitor_id.clone(),
                        tenant_id: visitor.tenant_id,
                        sender_role: SenderRole::Ai,
                        body: message.body,
                        kind: message.kind,
                    },
                );
            }
            Err(e) => error!("Failed to persist AI message: {}", e),
        }
    }

    async fn persist_system_message(
        &self,
        visitor: &visitors::Model,
        body: &str,
        metadata: serde_json::Value,
    ) {
        let inserted = visitor_messages::ActiveModel {
            visitor_row_id: Set(visitor.id),
            tenant_id: Set(visitor.tenant_id),
            sender_role: Set(SenderRole::System),
            sender_name: Set(Some("System".to_string())),
            body: Set(body.to_string()),
            kind: Set(MessageKind::System),
            is_read: Set(false),
            metadata: Set(Some(metadata)),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await;

        match inserted {
            Ok(message) => {
                self.notifier.broadcast_to_tenant(
                    visitor.tenant_id,
                    ChatEvent::MessageCreated {
                        visitor_id: visitor.visitor_id.clone(),
                        tenant_id: visitor.tenant_id,
                        sender_role: SenderRole::System,
                        body: message.body,
                        kind: message.kind,
                    },
                );
            }
            Err(e) => error!("Failed to persist transfer message: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AiEngineError, AiReply};
    use async_trait::async_trait;
    use parley_database::test_utils::TestDatabase;
    use parley_entities::types::{AgentAccountStatus, AgentPresence, VisitorStatus, WidgetState};
    use parley_entities::{agent_brands, agents, brands, tenants};
    use parley_handoff::MostRecentlySeenSelector;
    use parley_realtime::testing::RecordingNotifier;
    use parley_settings::AiCredentials;

    enum Script {
        Reply(&'static str),
        Transfer(&'static str),
        Fail,
        Hang,
    }

    struct ScriptedEngine(Script);

    #[async_trait]
    impl AiEngine for ScriptedEngine {
        async fn generate(
            &self,
            _credentials: &AiCredentials,
            _request: &AiRequest,
        ) -> Result<AiReply, AiEngineError> {
            match self.0 {
                Script::Reply(text) => Ok(AiReply {
                    response: text.to_string(),
                    confidence: 0.9,
                    tokens_used: Some(42),
                    is_transfer_request: false,
                }),
                Script::Transfer(text) => Ok(AiReply {
                    response: text.to_string(),
                    confidence: 0.9,
                    tokens_used: Some(42),
                    is_transfer_request: true,
                }),
                Script::Fail => Err(AiEngineError::Malformed("boom".to_string())),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
            }
        }
    }

    struct Harness {
        _db: TestDatabase,
        db: Arc<DatabaseConnection>,
        notifier: Arc<RecordingNotifier>,
        tenant_id: i32,
        brand_id: i32,
    }

    async fn harness() -> Harness {
        let test_db = TestDatabase::new().await.unwrap();
        let db = test_db.db.clone();

        let tenant = tenants::ActiveModel {
            name: Set("Acme".to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db.as_ref())
        .await
        .unwrap();

        let brand = brands::ActiveModel {
            tenant_id: Set(tenant.id),
            name: Set("Acme Support".to_string()),
            widget_key: Set("wk_live_acme".to_string()),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db.as_ref())
        .await
        .unwrap();

        Harness {
            _db: test_db,
            db,
            notifier: Arc::new(RecordingNotifier::new()),
            tenant_id: tenant.id,
            brand_id: brand.id,
        }
    }

    async fn seed_visitor(h: &Harness, brand_id: Option<i32>) -> visitors::Model {
        visitors::ActiveModel {
            visitor_id: Set("v-1".to_string()),
            session_id: Set("s-1".to_string()),
            tenant_id: Set(h.tenant_id),
            brand_id: Set(brand_id),
            name: Set("Ada".to_string()),
            referrer: Set("Direct".to_string()),
            status: Set(VisitorStatus::Online),
            is_typing: Set(false),
            widget_state: Set(WidgetState::Maximized),
            messages_count: Set(0),
            visits_count: Set(1),
            is_active: Set(true),
            session_duration: Set(0),
            ..Default::default()
        }
        .insert(h.db.as_ref())
        .await
        .unwrap()
    }

    async fn seed_online_agent(h: &Harness) -> agents::Model {
        let agent = agents::ActiveModel {
            tenant_id: Set(h.tenant_id),
            name: Set("Grace".to_string()),
            email: Set("grace@example.com".to_string()),
            account_status: Set(AgentAccountStatus::Active),
            presence: Set(AgentPresence::Online),
            last_login_at: Set(Some(chrono::Utc::now())),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(h.db.as_ref())
        .await
        .unwrap();

        agent_brands::ActiveModel {
            agent_id: Set(agent.id),
            brand_id: Set(h.brand_id),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(h.db.as_ref())
        .await
        .unwrap();

        agent
    }

    async fn enable_ai(h: &Harness, configured: bool) {
        WidgetSettingsService::new(h.db.clone())
            .update(h.tenant_id, Some(true), None)
            .await
            .unwrap();
        if configured {
            SystemSettingsService::new(h.db.clone())
                .set_ai_credentials("sk-test", None, None)
                .await
                .unwrap();
        }
    }

    fn gate(h: &Harness, script: Script) -> AiGateService {
        AiGateService::new(
            h.db.clone(),
            h.notifier.clone(),
            Arc::new(WidgetSettingsService::new(h.db.clone())),
            Arc::new(SystemSettingsService::new(h.db.clone())),
            Arc::new(HandoffService::new(
                h.db.clone(),
                h.notifier.clone(),
                Arc::new(MostRecentlySeenSelector::new()),
            )),
            Arc::new(ScriptedEngine(script)),
        )
    }

    fn claims(h: &Harness) -> WidgetClaims {
        WidgetClaims::new(h.tenant_id, Some(h.brand_id), "v-1".to_string())
    }

    #[tokio::test]
    async fn test_disabled_short_circuits_before_engine() {
        let h = harness().await;
        seed_visitor(&h, Some(h.brand_id)).await;
        // ai_enabled defaults to false and no credential exists

        let reply = gate(&h, Script::Fail)
            .handle_chat(&claims(&h), "hi".to_string())
            .await
            .unwrap();
        assert_eq!(reply.reply_type, AiReplyType::Disabled);
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let h = harness().await;
        seed_visitor(&h, Some(h.brand_id)).await;
        enable_ai(&h, false).await;

        let reply = gate(&h, Script::Fail)
            .handle_chat(&claims(&h), "hi".to_string())
            .await
            .unwrap();
        assert_eq!(reply.reply_type, AiReplyType::NotConfigured);
    }

    #[tokio::test]
    async fn test_normal_reply_is_persisted_and_broadcast() {
        let h = harness().await;
        let visitor = seed_visitor(&h, Some(h.brand_id)).await;
        enable_ai(&h, true).await;

        let reply = gate(&h, Script::Reply("We are open 9 to 5."))
            .handle_chat(&claims(&h), "opening hours?".to_string())
            .await
            .unwrap();
        assert_eq!(reply.reply_type, AiReplyType::Ai);
        assert_eq!(reply.response, "We are open 9 to 5.");

        let stored = visitor_messages::Entity::find()
            .filter(visitor_messages::Column::VisitorRowId.eq(visitor.id))
            .all(h.db.as_ref())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sender_role, SenderRole::Ai);
        let metadata = stored[0].metadata.as_ref().unwrap();
        assert_eq!(metadata["original_message"], "opening hours?");

        assert!(h
            .notifier
            .tenant_events
            .lock()
            .unwrap()
            .iter()
            .any(|(_, e)| matches!(e, ChatEvent::MessageCreated { .. })));
    }

    #[tokio::test]
    async fn test_transfer_assigns_agent_and_records_system_message() {
        let h = harness().await;
        let visitor = seed_visitor(&h, Some(h.brand_id)).await;
        let agent = seed_online_agent(&h).await;
        enable_ai(&h, true).await;

        let reply = gate(&h, Script::Transfer("Connecting you now."))
            .handle_chat(&claims(&h), "let me talk to a human".to_string())
            .await
            .unwrap();
        assert_eq!(reply.reply_type, AiReplyType::Transfer);
        assert_eq!(reply.agent.as_ref().unwrap().id, agent.id);

        let updated = visitors::Entity::find_by_id(visitor.id)
            .one(h.db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.assigned_agent_id, Some(agent.id));
        assert_eq!(updated.status, VisitorStatus::WaitingForAgent);

        let stored = visitor_messages::Entity::find()
            .filter(visitor_messages::Column::VisitorRowId.eq(visitor.id))
            .all(h.db.as_ref())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sender_role, SenderRole::System);
        assert!(stored[0].body.contains("Grace"));
    }

    #[tokio::test]
    async fn test_transfer_without_brand_leaves_state_unchanged() {
        let h = harness().await;
        let visitor = seed_visitor(&h, None).await;
        seed_online_agent(&h).await;
        enable_ai(&h, true).await;

        let reply = gate(&h, Script::Transfer("Connecting you now."))
            .handle_chat(
                &WidgetClaims::new(h.tenant_id, None, "v-1".to_string()),
                "human please".to_string(),
            )
            .await
            .unwrap();
        assert_eq!(reply.reply_type, AiReplyType::TransferFailed);

        let updated = visitors::Entity::find_by_id(visitor.id)
            .one(h.db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.assigned_agent_id, None);
        assert_eq!(updated.status, VisitorStatus::Online);
    }

    #[tokio::test]
    async fn test_transfer_without_agent_returns_fallback_text() {
        let h = harness().await;
        seed_visitor(&h, Some(h.brand_id)).await;
        enable_ai(&h, true).await;

        let reply = gate(&h, Script::Transfer("Nobody is free, sorry."))
            .handle_chat(&claims(&h), "human please".to_string())
            .await
            .unwrap();
        assert_eq!(reply.reply_type, AiReplyType::TransferFailed);
        assert_eq!(reply.response, "Nobody is free, sorry.");
    }

    #[tokio::test]
    async fn test_engine_failure_yields_fallback() {
        let h = harness().await;
        seed_visitor(&h, Some(h.brand_id)).await;
        enable_ai(&h, true).await;

        let reply = gate(&h, Script::Fail)
            .handle_chat(&claims(&h), "hi".to_string())
            .await
            .unwrap();
        assert_eq!(reply.reply_type, AiReplyType::Fallback);
    }

    #[tokio::test]
    async fn test_engine_timeout_yields_fallback() {
        let h = harness().await;
        seed_visitor(&h, Some(h.brand_id)).await;
        enable_ai(&h, true).await;

        let reply = gate(&h, Script::Hang)
            .with_engine_timeout(Duration::from_millis(50))
            .handle_chat(&claims(&h), "hi".to_string())
            .await
            .unwrap();
        assert_eq!(reply.reply_type, AiReplyType::Fallback);
    }
}
