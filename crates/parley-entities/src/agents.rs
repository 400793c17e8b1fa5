use sea_orm::entity::prelude::*;
use parley_core::DBDateTime;
use serde::{Deserialize, Serialize};

use crate::types::{AgentAccountStatus, AgentPresence};

/// A dashboard user who can receive transferred chats.
///
/// Availability is derived, never stored: presence `online` plus account
/// `active`, and (for brand-scoped hand-off) an active agent↔brand
/// assignment.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant_id: i32,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub account_status: AgentAccountStatus,
    pub presence: AgentPresence,
    pub last_login_at: Option<DBDateTime>,
    pub created_at: DBDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenants::Entity",
        from = "Column::TenantId",
        to = "super::tenants::Column::Id"
    )]
    Tenants,
    #[sea_orm(has_many = "super::agent_brands::Entity")]
    AgentBrands,
}

impl Related<super::tenants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenants.def()
    }
}

impl Related<super::agent_brands::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AgentBrands.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
