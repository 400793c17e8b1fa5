use async_trait::async_trait;
use parley_core::DBDateTime;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};

use crate::types::HandoffTrigger;

/// Durable audit row for an AI→agent (or visitor-requested) hand-off.
/// The system message alone cannot reconstruct re-transfer chains, so
/// every transfer also writes one of these.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "handoff_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant_id: i32,
    pub visitor_row_id: i32,
    pub brand_id: Option<i32>,
    pub from_agent_id: Option<i32>,
    pub to_agent_id: i32,
    pub trigger: HandoffTrigger,
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
    #[sea_orm(
        belongs_to = "super::agents::Entity",
        from = "Column::ToAgentId",
        to = "super::agents::Column::Id"
    )]
    ToAgent,
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
