use std::sync::Arc;

use parley_core::WidgetClaims;
use parley_entities::types::{MessageKind, SenderRole, VisitorStatus};
use parley_entities::{visitor_messages, visitors};
use parley_realtime::{ChatEvent, Notifier};
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder,
};
use thiserror::Error;
use tracing::debug;

use crate::types::UpsertVisitorRequest;

#[derive(Error, Debug)]
pub enum VisitorError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Visitor not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Outcome of an upsert: the row plus whether it was freshly created
pub struct UpsertOutcome {
    pub visitor: visitors::Model,
    pub created: bool,
}

/// Tracks visitor sessions and their message log.
///
/// Identity always comes from verified token claims; request bodies only
/// carry attributes. Activity-derived presence merges relax `offline` and
/// `away` into `idle` but never downgrade an engaged status; only an
/// explicit status set or the end-of-chat paths may do that.
pub struct VisitorService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn Notifier>,
}

impl VisitorService {
    pub fn new(db: Arc<DatabaseConnection>, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    async fn find_visitor(
        &self,
        tenant_id: i32,
        visitor_id: &str,
    ) -> Result<Option<visitors::Model>, VisitorError> {
        Ok(visitors::Entity::find()
            .filter(visitors::Column::TenantId.eq(tenant_id))
            .filter(visitors::Column::VisitorId.eq(visitor_id))
            .one(self.db.as_ref())
            .await?)
    }

    async fn require_visitor(
        &self,
        tenant_id: i32,
        visitor_id: &str,
    ) -> Result<visitors::Model, VisitorError> {
        self.find_visitor(tenant_id, visitor_id)
            .await?
            .ok_or(VisitorError::NotFound)
    }

    /// Create or merge the visitor row addressed by the token claims.
    ///
    /// On merge only present, non-empty attributes overwrite; a new
    /// session id marks a returning visit and increments `visits_count`.
    pub async fn upsert_visitor(
        &self,
        claims: &WidgetClaims,
        request: UpsertVisitorRequest,
    ) -> Result<UpsertOutcome, VisitorError> {
        if request.session_id.trim().is_empty() {
            return Err(VisitorError::Validation(
                "sessionId must not be empty".to_string(),
            ));
        }

        let existing = self.find_visitor(claims.tenant_id, &claims.visitor_id).await?;

        match existing {
            None => {
                let visitor = visitors::ActiveModel {
                    visitor_id: Set(claims.visitor_id.clone()),
                    session_id: Set(request.session_id),
                    tenant_id: Set(claims.tenant_id),
                    brand_id: Set(claims.brand_id),
                    name: Set(non_empty(request.name).unwrap_or_else(|| "Visitor".to_string())),
                    email: Set(non_empty(request.email)),
                    phone: Set(non_empty(request.phone)),
                    current_page: Set(non_empty(request.current_page)),
                    referrer: Set(non_empty(request.referrer).unwrap_or_else(|| "Direct".to_string())),
                    user_agent: Set(non_empty(request.user_agent)),
                    country: Set(non_empty(request.country)),
                    city: Set(non_empty(request.city)),
                    status: Set(VisitorStatus::Idle),
                    is_typing: Set(false),
                    widget_state: Set(request
                        .widget_state
                        .unwrap_or(parley_entities::types::WidgetState::Minimized)),
                    messages_count: Set(0),
                    visits_count: Set(1),
                    is_active: Set(true),
                    session_duration: Set(0),
                    custom_data: Set(request.custom_data),
                    ..Default::default()
                }
                .insert(self.db.as_ref())
                .await?;

                self.notifier.broadcast_to_tenant(
                    visitor.tenant_id,
                    ChatEvent::VisitorCreated {
                        visitor_id: visitor.visitor_id.clone(),
                        tenant_id: visitor.tenant_id,
                        name: visitor.name.clone(),
                    },
                );

                debug!(visitor_id = %visitor.visitor_id, "visitor created");
                Ok(UpsertOutcome { visitor, created: true })
            }
            Some(current) => {
                let returning = current.session_id != request.session_id;
                let now = chrono::Utc::now();

                // Only the columns this request provides go into the
                // UPDATE, so two in-flight merges cannot overwrite each
                // other's fields.
                let mut active = visitors::ActiveModel {
                    id: Unchanged(current.id),
                    ..Default::default()
                };
                if returning {
                    active.visits_count = Set(current.visits_count + 1);
                    active.session_id = Set(request.session_id);
                    active.is_active = Set(true);
                }
                if let Some(name) = non_empty(request.name) {
                    active.name = Set(name);
                }
                if let Some(email) = non_empty(request.email) {
                    active.email = Set(Some(email));
                }
                if let Some(phone) = non_empty(request.phone) {
                    active.phone = Set(Some(phone));
                }
                if let Some(page) = non_empty(request.current_page) {
                    active.current_page = Set(Some(page));
                }
                if let Some(referrer) = non_empty(request.referrer) {
                    active.referrer = Set(referrer);
                }
                if let Some(user_agent) = non_empty(request.user_agent) {
                    active.user_agent = Set(Some(user_agent));
                }
                if let Some(country) = non_empty(request.country) {
                    active.country = Set(Some(country));
                }
                if let Some(city) = non_empty(request.city) {
                    active.city = Set(Some(city));
                }
                if let Some(widget_state) = request.widget_state {
                    active.widget_state = Set(widget_state);
                }
                if let Some(custom_data) = request.custom_data {
                    active.custom_data = Set(Some(custom_data));
                }
                active.status = Set(relax_status(current.status));
                active.last_activity = Set(now);
                active.session_duration = Set(elapsed_seconds(current.created_at, now));

                let visitor = active.update(self.db.as_ref()).await?;

                self.notifier.broadcast_to_tenant(
                    visitor.tenant_id,
                    ChatEvent::VisitorUpdated {
                        visitor_id: visitor.visitor_id.clone(),
                        tenant_id: visitor.tenant_id,
                        status: visitor.status,
                    },
                );

                Ok(UpsertOutcome { visitor, created: false })
            }
        }
    }

    /// Fire-and-forget activity ping; unknown visitors are ignored
    pub async fn record_activity(
        &self,
        tenant_id: i32,
        visitor_id: &str,
        current_page: Option<String>,
    ) -> Result<(), VisitorError> {
        let Some(visitor) = self.find_visitor(tenant_id, visitor_id).await? else {
            debug!(visitor_id, "activity ping for unknown visitor ignored");
            return Ok(());
        };

        let now = chrono::Utc::now();

        let mut active = visitors::ActiveModel {
            id: Unchanged(visitor.id),
            status: Set(relax_status(visitor.status)),
            last_activity: Set(now),
            session_duration: Set(elapsed_seconds(visitor.created_at, now)),
            ..Default::default()
        };
        if let Some(page) = non_empty(current_page) {
            active.current_page = Set(Some(page));
        }
        active.update(self.db.as_ref()).await?;

        Ok(())
    }

    /// Explicit status set from the widget.
    ///
    /// `offline` with no assigned agent closes the AI-only session and
    /// emits `ChatEnded` once; a row that is already inactive stays
    /// silent.
    pub async fn set_status(
        &self,
        tenant_id: i32,
        visitor_id: &str,
        status: VisitorStatus,
    ) -> Result<visitors::Model, VisitorError> {
        let visitor = self.require_visitor(tenant_id, visitor_id).await?;

        let ends_session =
            status == VisitorStatus::Offline && visitor.assigned_agent_id.is_none();
        let was_active = visitor.is_active;
        let id = visitor.visitor_id.clone();

        let mut active = visitors::ActiveModel {
            id: Unchanged(visitor.id),
            status: Set(status),
            last_activity: Set(chrono::Utc::now()),
            ..Default::default()
        };
        if ends_session {
            active.is_active = Set(false);
        }
        let visitor = active.update(self.db.as_ref()).await?;

        if ends_session && was_active {
            let event = ChatEvent::ChatEnded {
                visitor_id: id.clone(),
                tenant_id,
            };
            self.notifier.broadcast_to_tenant(tenant_id, event.clone());
            self.notifier.notify_visitor(tenant_id, &id, event);
        } else {
            self.notifier.broadcast_to_tenant(
                tenant_id,
                ChatEvent::VisitorUpdated {
                    visitor_id: id,
                    tenant_id,
                    status: visitor.status,
                },
            );
        }

        Ok(visitor)
    }

    /// Fire-and-forget typing flag; unknown visitors are ignored
    pub async fn set_typing(
        &self,
        tenant_id: i32,
        visitor_id: &str,
        is_typing: bool,
    ) -> Result<(), VisitorError> {
        let Some(visitor) = self.find_visitor(tenant_id, visitor_id).await? else {
            return Ok(());
        };

        visitors::ActiveModel {
            id: Unchanged(visitor.id),
            is_typing: Set(is_typing),
            last_activity: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .update(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Persist a visitor-sent message and broadcast it to the tenant
    pub async fn add_visitor_message(
        &self,
        tenant_id: i32,
        visitor_id: &str,
        body: String,
        metadata: Option<serde_json::Value>,
    ) -> Result<visitor_messages::Model, VisitorError> {
        if body.trim().is_empty() {
            return Err(VisitorError::Validation(
                "message body must not be empty".to_string(),
            ));
        }

        let visitor = self.require_visitor(tenant_id, visitor_id).await?;

        let message = visitor_messages::ActiveModel {
            visitor_row_id: Set(visitor.id),
            tenant_id: Set(tenant_id),
            sender_role: Set(SenderRole::Visitor),
            sender_id: Set(None),
            sender_name: Set(Some(visitor.name.clone())),
            body: Set(body),
            kind: Set(MessageKind::Text),
            is_read: Set(false),
            metadata: Set(metadata),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await?;

        let id = visitor.visitor_id.clone();

        visitors::ActiveModel {
            id: Unchanged(visitor.id),
            messages_count: Set(visitor.messages_count + 1),
            status: Set(relax_status(visitor.status)),
            is_typing: Set(false),
            last_activity: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .update(self.db.as_ref())
        .await?;

        self.notifier.broadcast_to_tenant(
            tenant_id,
            ChatEvent::MessageCreated {
                visitor_id: id,
                tenant_id,
                sender_role: SenderRole::Visitor,
                body: message.body.clone(),
                kind: message.kind,
            },
        );

        Ok(message)
    }

    /// Close the session from the widget's end-chat control
    pub async fn end_chat(&self, tenant_id: i32, visitor_id: &str) -> Result<(), VisitorError> {
        let visitor = self.require_visitor(tenant_id, visitor_id).await?;

        let was_active = visitor.is_active;
        let id = visitor.visitor_id.clone();

        visitors::ActiveModel {
            id: Unchanged(visitor.id),
            assigned_agent_id: Set(None),
            status: Set(VisitorStatus::Offline),
            is_active: Set(false),
            last_activity: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .update(self.db.as_ref())
        .await?;

        if was_active {
            let event = ChatEvent::ChatEnded {
                visitor_id: id.clone(),
                tenant_id,
            };
            self.notifier.broadcast_to_tenant(tenant_id, event.clone());
            self.notifier.notify_visitor(tenant_id, &id, event);
        }

        Ok(())
    }

    /// Store a satisfaction rating for the chat
    pub async fn rate_chat(
        &self,
        tenant_id: i32,
        visitor_id: &str,
        rating: i32,
        comment: Option<String>,
    ) -> Result<(), VisitorError> {
        if !(1..=5).contains(&rating) {
            return Err(VisitorError::Validation(
                "rating must be between 1 and 5".to_string(),
            ));
        }

        let visitor = self.require_visitor(tenant_id, visitor_id).await?;
        let id = visitor.visitor_id.clone();

        visitors::ActiveModel {
            id: Unchanged(visitor.id),
            satisfaction_rating: Set(Some(rating)),
            satisfaction_comment: Set(non_empty(comment)),
            ..Default::default()
        }
        .update(self.db.as_ref())
        .await?;

        self.notifier.broadcast_to_tenant(
            tenant_id,
            ChatEvent::RatingSubmitted {
                visitor_id: id,
                tenant_id,
                rating,
            },
        );

        Ok(())
    }

    /// Active visitors for the dashboard, most recently active first
    pub async fn list_active_visitors(
        &self,
        tenant_id: i32,
    ) -> Result<Vec<visitors::Model>, VisitorError> {
        Ok(visitors::Entity::find()
            .filter(visitors::Column::TenantId.eq(tenant_id))
            .filter(visitors::Column::IsActive.eq(true))
            .order_by(visitors::Column::LastActivity, Order::Desc)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn get_visitor(
        &self,
        tenant_id: i32,
        id: i32,
    ) -> Result<visitors::Model, VisitorError> {
        visitors::Entity::find_by_id(id)
            .filter(visitors::Column::TenantId.eq(tenant_id))
            .one(self.db.as_ref())
            .await?
            .ok_or(VisitorError::NotFound)
    }

    /// Conversation log for one visitor, oldest first
    pub async fn list_messages(
        &self,
        tenant_id: i32,
        id: i32,
    ) -> Result<Vec<visitor_messages::Model>, VisitorError> {
        let visitor = self.get_visitor(tenant_id, id).await?;

        Ok(visitor_messages::Entity::find()
            .filter(visitor_messages::Column::VisitorRowId.eq(visitor.id))
            .order_by(visitor_messages::Column::CreatedAt, Order::Asc)
            .all(self.db.as_ref())
            .await?)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Activity-derived presence merge: only a dormant status is revived
fn relax_status(current: VisitorStatus) -> VisitorStatus {
    if current.is_engaged() {
        current
    } else {
        VisitorStatus::Idle
    }
}

fn elapsed_seconds(from: parley_core::DBDateTime, to: parley_core::DBDateTime) -> i32 {
    (to - from).num_seconds().max(0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_database::test_utils::TestDatabase;
    use parley_realtime::testing::RecordingNotifier;

    async fn seed_tenant(db: &DatabaseConnection) -> i32 {
        parley_entities::tenants::ActiveModel {
            name: Set("Acme".to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
        .id
    }

    struct Harness {
        _db: TestDatabase,
        service: VisitorService,
        notifier: Arc<RecordingNotifier>,
        tenant_id: i32,
    }

    async fn harness() -> Harness {
        let test_db = TestDatabase::new().await.unwrap();
        let tenant_id = seed_tenant(test_db.db.as_ref()).await;
        let notifier = Arc::new(RecordingNotifier::new());
        let service = VisitorService::new(test_db.db.clone(), notifier.clone());
        Harness {
            _db: test_db,
            service,
            notifier,
            tenant_id,
        }
    }

    fn claims(tenant_id: i32) -> WidgetClaims {
        WidgetClaims::new(tenant_id, None, "v-1".to_string())
    }

    fn base_request() -> UpsertVisitorRequest {
        UpsertVisitorRequest {
            session_id: "s-1".to_string(),
            name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upsert_creates_with_defaults() {
        let h = harness().await;

        let outcome = h
            .service
            .upsert_visitor(&claims(h.tenant_id), base_request())
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.visitor.status, VisitorStatus::Idle);
        assert_eq!(outcome.visitor.referrer, "Direct");
        assert_eq!(outcome.visitor.visits_count, 1);
        assert_eq!(h.notifier.tenant_event_count(), 1);
    }

    #[tokio::test]
    async fn test_upsert_merge_keeps_non_empty_values() {
        let h = harness().await;
        let claims = claims(h.tenant_id);

        h.service
            .upsert_visitor(&claims, base_request())
            .await
            .unwrap();

        // same session, empty name and absent email must not erase
        let merge = UpsertVisitorRequest {
            session_id: "s-1".to_string(),
            name: Some("  ".to_string()),
            current_page: Some("/pricing".to_string()),
            ..Default::default()
        };
        let outcome = h.service.upsert_visitor(&claims, merge).await.unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.visitor.name, "Ada");
        assert_eq!(outcome.visitor.email.as_deref(), Some("ada@example.com"));
        assert_eq!(outcome.visitor.current_page.as_deref(), Some("/pricing"));
        assert_eq!(outcome.visitor.visits_count, 1);
    }

    #[tokio::test]
    async fn test_upsert_new_session_counts_returning_visit() {
        let h = harness().await;
        let claims = claims(h.tenant_id);

        h.service
            .upsert_visitor(&claims, base_request())
            .await
            .unwrap();

        let returning = UpsertVisitorRequest {
            session_id: "s-2".to_string(),
            ..Default::default()
        };
        let outcome = h.service.upsert_visitor(&claims, returning).await.unwrap();

        assert_eq!(outcome.visitor.visits_count, 2);
        assert_eq!(outcome.visitor.session_id, "s-2");
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_both_fields() {
        let h = harness().await;
        let claims = claims(h.tenant_id);

        h.service
            .upsert_visitor(&claims, base_request())
            .await
            .unwrap();

        let name_update = UpsertVisitorRequest {
            session_id: "s-1".to_string(),
            name: Some("Grace".to_string()),
            ..Default::default()
        };
        let page_update = UpsertVisitorRequest {
            session_id: "s-1".to_string(),
            current_page: Some("/pricing".to_string()),
            ..Default::default()
        };
        let (a, b) = tokio::join!(
            h.service.upsert_visitor(&claims, name_update),
            h.service.upsert_visitor(&claims, page_update)
        );
        a.unwrap();
        b.unwrap();

        // last write wins per field, not per row
        let visitor = h
            .service
            .list_active_visitors(h.tenant_id)
            .await
            .unwrap()
            .remove(0);
        assert_eq!(visitor.name, "Grace");
        assert_eq!(visitor.current_page.as_deref(), Some("/pricing"));
    }

    #[tokio::test]
    async fn test_activity_does_not_downgrade_waiting_status() {
        let h = harness().await;
        let claims = claims(h.tenant_id);

        h.service
            .upsert_visitor(&claims, base_request())
            .await
            .unwrap();
        h.service
            .set_status(h.tenant_id, "v-1", VisitorStatus::WaitingForAgent)
            .await
            .unwrap();

        h.service
            .record_activity(h.tenant_id, "v-1", Some("/docs".to_string()))
            .await
            .unwrap();

        let visitor = h
            .service
            .list_active_visitors(h.tenant_id)
            .await
            .unwrap()
            .remove(0);
        assert_eq!(visitor.status, VisitorStatus::WaitingForAgent);
        assert_eq!(visitor.current_page.as_deref(), Some("/docs"));
    }

    #[tokio::test]
    async fn test_activity_relaxes_away_to_idle() {
        let h = harness().await;
        let claims = claims(h.tenant_id);

        h.service
            .upsert_visitor(&claims, base_request())
            .await
            .unwrap();
        h.service
            .set_status(h.tenant_id, "v-1", VisitorStatus::Away)
            .await
            .unwrap();

        h.service
            .record_activity(h.tenant_id, "v-1", None)
            .await
            .unwrap();

        let visitor = h
            .service
            .list_active_visitors(h.tenant_id)
            .await
            .unwrap()
            .remove(0);
        assert_eq!(visitor.status, VisitorStatus::Idle);
    }

    #[tokio::test]
    async fn test_activity_for_unknown_visitor_is_silent() {
        let h = harness().await;
        h.service
            .record_activity(h.tenant_id, "nobody", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_offline_without_agent_ends_session_once() {
        let h = harness().await;
        let claims = claims(h.tenant_id);

        h.service
            .upsert_visitor(&claims, base_request())
            .await
            .unwrap();

        let visitor = h
            .service
            .set_status(h.tenant_id, "v-1", VisitorStatus::Offline)
            .await
            .unwrap();
        assert!(!visitor.is_active);

        // second offline must not emit a second ChatEnded
        h.service
            .set_status(h.tenant_id, "v-1", VisitorStatus::Offline)
            .await
            .unwrap();

        let ended: Vec<_> = h
            .notifier
            .tenant_events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| matches!(e, ChatEvent::ChatEnded { .. }))
            .cloned()
            .collect();
        assert_eq!(ended.len(), 1);
        assert_eq!(h.notifier.visitor_events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_status_unknown_visitor_is_not_found() {
        let h = harness().await;
        let err = h
            .service
            .set_status(h.tenant_id, "nobody", VisitorStatus::Online)
            .await
            .unwrap_err();
        assert!(matches!(err, VisitorError::NotFound));
    }

    #[tokio::test]
    async fn test_message_increments_count_and_broadcasts() {
        let h = harness().await;
        let claims = claims(h.tenant_id);

        h.service
            .upsert_visitor(&claims, base_request())
            .await
            .unwrap();

        let message = h
            .service
            .add_visitor_message(h.tenant_id, "v-1", "hello there".to_string(), None)
            .await
            .unwrap();
        assert_eq!(message.sender_role, SenderRole::Visitor);
        assert_eq!(message.sender_name.as_deref(), Some("Ada"));

        let visitor = h.service.get_visitor(h.tenant_id, message.visitor_row_id).await.unwrap();
        assert_eq!(visitor.messages_count, 1);

        let events = h.notifier.tenant_events.lock().unwrap();
        assert!(events
            .iter()
            .any(|(_, e)| matches!(e, ChatEvent::MessageCreated { body, .. } if body == "hello there")));
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let h = harness().await;
        let claims = claims(h.tenant_id);
        h.service
            .upsert_visitor(&claims, base_request())
            .await
            .unwrap();

        let err = h
            .service
            .add_visitor_message(h.tenant_id, "v-1", "   ".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VisitorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rating_bounds_and_event() {
        let h = harness().await;
        let claims = claims(h.tenant_id);
        h.service
            .upsert_visitor(&claims, base_request())
            .await
            .unwrap();

        let err = h
            .service
            .rate_chat(h.tenant_id, "v-1", 6, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VisitorError::Validation(_)));

        h.service
            .rate_chat(h.tenant_id, "v-1", 4, Some("great".to_string()))
            .await
            .unwrap();

        let events = h.notifier.tenant_events.lock().unwrap();
        assert!(events
            .iter()
            .any(|(_, e)| matches!(e, ChatEvent::RatingSubmitted { rating: 4, .. })));
    }
}
