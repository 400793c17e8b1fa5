use async_trait::async_trait;
use parley_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};

use crate::types::{VisitorStatus, WidgetState};

/// One durable row per browser-identified visitor.
///
/// `visitor_id` is the client-stable token, `session_id` the per-browser
/// session. The row is mutated by three independent call paths (activity
/// ping, message send, hand-off) with no locking; per-field last-write-wins
/// is the accepted consistency model.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "visitors")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub visitor_id: String,
    pub session_id: String,
    pub tenant_id: i32,
    pub brand_id: Option<i32>,
    pub assigned_agent_id: Option<i32>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub current_page: Option<String>,
    pub referrer: String,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub status: VisitorStatus,
    pub is_typing: bool,
    pub widget_state: WidgetState,
    pub messages_count: i32,
    pub visits_count: i32,
    /// False once the session ended (offline with no assigned agent)
    pub is_active: bool,
    /// Seconds elapsed since the row was created, refreshed on activity
    pub session_duration: i32,
    pub satisfaction_rating: Option<i32>,
    pub satisfaction_comment: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub custom_data: Option<serde_json::Value>,
    pub created_at: DBDateTime,
    pub last_activity: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenants::Entity",
        from = "Column::TenantId",
        to = "super::tenants::Column::Id"
    )]
    Tenants,
    #[sea_orm(
        belongs_to = "super::brands::Entity",
        from = "Column::BrandId",
        to = "super::brands::Column::Id"
    )]
    Brands,
    #[sea_orm(
        belongs_to = "super::agents::Entity",
        from = "Column::AssignedAgentId",
        to = "super::agents::Column::Id"
    )]
    AssignedAgent,
    #[sea_orm(has_many = "super::visitor_messages::Entity")]
    VisitorMessages,
}

impl Related<super::tenants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenants.def()
    }
}

impl Related<super::visitor_messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VisitorMessages.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            let now = chrono::Utc::now();
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.last_activity.is_not_set() {
                self.last_activity = Set(now);
            }
        }
        Ok(self)
    }
}
