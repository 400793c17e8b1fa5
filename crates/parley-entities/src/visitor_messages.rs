use async_trait::async_trait;
use parley_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};

use crate::types::{MessageKind, SenderRole};

/// A single turn in a visitor conversation, ordered by creation time.
/// Immutable once created except for the read flag.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "visitor_messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub visitor_row_id: i32,
    pub tenant_id: i32,
    pub sender_role: SenderRole,
    /// Agent id for agent messages; null for visitor/ai/system senders
    pub sender_id: Option<i32>,
    pub sender_name: Option<String>,
    pub body: String,
    pub kind: MessageKind,
    pub is_read: bool,
    /// AI confidence, token counts, transfer markers, widget extras
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::visitors::Entity",
        from = "Column::VisitorRowId",
        to = "super::visitors::Column::Id"
    )]
    Visitors,
}

impl Related<super::visitors::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Visitors.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(chrono::Utc::now());
        }
        Ok(self)
    }
}
