use sea_orm::entity::prelude::*;
use parley_core::DBDateTime;
use serde::{Deserialize, Serialize};

/// A brand is a sub-identity under a tenant with its own agent roster.
/// The `widget_key` is the per-brand credential embedded in the snippet.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "brands")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tenant_id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub widget_key: String,
    pub is_active: bool,
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
