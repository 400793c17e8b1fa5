use async_trait::async_trait;
use chrono::Duration;
use parley_entities::types::{AgentAccountStatus, AgentPresence};
use parley_entities::{agent_brands, agents};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, Order, QueryFilter, QueryOrder};

/// Window in which a logged-in agent still counts as reachable even if
/// their presence flag has not flipped to online
const RECENTLY_SEEN_WINDOW_MINUTES: i64 = 5;

/// Strategy for picking the agent a chat is handed to.
///
/// Implementations only read; the transfer service owns all mutation.
#[async_trait]
pub trait AgentSelector: Send + Sync {
    /// Pick an agent assigned to the given brand, or None when the brand
    /// has no eligible roster at all
    async fn select_for_brand(
        &self,
        db: &DatabaseConnection,
        tenant_id: i32,
        brand_id: i32,
    ) -> Result<Option<agents::Model>, DbErr>;

    /// Pick any online agent in the tenant, ignoring brand rosters
    async fn select_any_online(
        &self,
        db: &DatabaseConnection,
        tenant_id: i32,
    ) -> Result<Option<agents::Model>, DbErr>;
}

/// Default strategy: the most recently seen eligible agent wins.
///
/// Eligibility for a brand means an active assignment row and an active
/// account. "Recently seen" is presence online or a login within the
/// last few minutes; when nobody qualifies the first assigned agent is
/// returned as a best-effort fallback so the chat is not dropped.
#[derive(Default)]
pub struct MostRecentlySeenSelector;

impl MostRecentlySeenSelector {
    pub fn new() -> Self {
        Self
    }

    fn recently_seen(agent: &agents::Model) -> bool {
        if agent.presence == AgentPresence::Online {
            return true;
        }
        match agent.last_login_at {
            Some(at) => {
                chrono::Utc::now() - at < Duration::minutes(RECENTLY_SEEN_WINDOW_MINUTES)
            }
            None => false,
        }
    }
}

#[async_trait]
impl AgentSelector for MostRecentlySeenSelector {
    async fn select_for_brand(
        &self,
        db: &DatabaseConnection,
        tenant_id: i32,
        brand_id: i32,
    ) -> Result<Option<agents::Model>, DbErr> {
        let assignments = agent_brands::Entity::find()
            .filter(agent_brands::Column::BrandId.eq(brand_id))
            .filter(agent_brands::Column::IsActive.eq(true))
            .order_by(agent_brands::Column::Id, Order::Asc)
            .all(db)
            .await?;

        if assignments.is_empty() {
            return Ok(None);
        }

        let agent_ids: Vec<i32> = assignments.iter().map(|a| a.agent_id).collect();
        let roster = agents::Entity::find()
            .filter(agents::Column::Id.is_in(agent_ids.clone()))
            .filter(agents::Column::TenantId.eq(tenant_id))
            .filter(agents::Column::AccountStatus.eq(AgentAccountStatus::Active))
            .all(db)
            .await?;

        if roster.is_empty() {
            return Ok(None);
        }

        let mut seen: Vec<&agents::Model> =
            roster.iter().filter(|a| Self::recently_seen(a)).collect();

        if seen.is_empty() {
            // nobody reachable right now; hand to the first assignment so
            // the chat lands in somebody's queue
            let first = agent_ids
                .iter()
                .find_map(|id| roster.iter().find(|a| a.id == *id))
                .cloned();
            return Ok(first);
        }

        seen.sort_by(|a, b| b.last_login_at.cmp(&a.last_login_at));
        Ok(seen.first().map(|a| (*a).clone()))
    }

    async fn select_any_online(
        &self,
        db: &DatabaseConnection,
        tenant_id: i32,
    ) -> Result<Option<agents::Model>, DbErr> {
        agents::Entity::find()
            .filter(agents::Column::TenantId.eq(tenant_id))
            .filter(agents::Column::AccountStatus.eq(AgentAccountStatus::Active))
            .filter(agents::Column::Presence.eq(AgentPresence::Online))
            .order_by(agents::Column::LastLoginAt, Order::Desc)
            .one(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_database::test_utils::TestDatabase;
    use sea_orm::{ActiveValue::Set, ActiveModelTrait};

    struct Fixture {
        _db: TestDatabase,
        db: std::sync::Arc<DatabaseConnection>,
        tenant_id: i32,
        brand_id: i32,
    }

    async fn fixture() -> Fixture {
        let test_db = TestDatabase::new().await.unwrap();
        let db = test_db.db.clone();

        let tenant = parley_entities::tenants::ActiveModel {
            name: Set("Acme".to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db.as_ref())
        .await
        .unwrap();

        let brand = parley_entities::brands::ActiveModel {
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

        Fixture {
            _db: test_db,
            db,
            tenant_id: tenant.id,
            brand_id: brand.id,
        }
    }

    async fn seed_agent(
        f: &Fixture,
        name: &str,
        presence: AgentPresence,
        last_login_minutes_ago: Option<i64>,
        assigned: bool,
    ) -> agents::Model {
        let agent = agents::ActiveModel {
            tenant_id: Set(f.tenant_id),
            name: Set(name.to_string()),
            email: Set(format!("{}@example.com", name)),
            account_status: Set(AgentAccountStatus::Active),
            presence: Set(presence),
            last_login_at: Set(
                last_login_minutes_ago.map(|m| chrono::Utc::now() - Duration::minutes(m))
            ),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(f.db.as_ref())
        .await
        .unwrap();

        if assigned {
            agent_brands::ActiveModel {
                agent_id: Set(agent.id),
                brand_id: Set(f.brand_id),
                is_active: Set(true),
                created_at: Set(chrono::Utc::now()),
                ..Default::default()
            }
            .insert(f.db.as_ref())
            .await
            .unwrap();
        }

        agent
    }

    #[tokio::test]
    async fn test_no_assignments_means_no_agent() {
        let f = fixture().await;
        seed_agent(&f, "unassigned", AgentPresence::Online, Some(1), false).await;

        let selector = MostRecentlySeenSelector::new();
        let picked = selector
            .select_for_brand(f.db.as_ref(), f.tenant_id, f.brand_id)
            .await
            .unwrap();
        assert!(picked.is_none());
    }

    #[tokio::test]
    async fn test_most_recent_login_wins_among_online() {
        let f = fixture().await;
        seed_agent(&f, "older", AgentPresence::Online, Some(60), true).await;
        let newer = seed_agent(&f, "newer", AgentPresence::Online, Some(2), true).await;

        let selector = MostRecentlySeenSelector::new();
        let picked = selector
            .select_for_brand(f.db.as_ref(), f.tenant_id, f.brand_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id, newer.id);
    }

    #[tokio::test]
    async fn test_recent_login_counts_even_when_offline() {
        let f = fixture().await;
        let just_left = seed_agent(&f, "just-left", AgentPresence::Offline, Some(2), true).await;
        seed_agent(&f, "long-gone", AgentPresence::Offline, Some(600), true).await;

        let selector = MostRecentlySeenSelector::new();
        let picked = selector
            .select_for_brand(f.db.as_ref(), f.tenant_id, f.brand_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id, just_left.id);
    }

    #[tokio::test]
    async fn test_fallback_to_first_assignment_when_nobody_seen() {
        let f = fixture().await;
        let first = seed_agent(&f, "first", AgentPresence::Offline, Some(600), true).await;
        seed_agent(&f, "second", AgentPresence::Offline, None, true).await;

        let selector = MostRecentlySeenSelector::new();
        let picked = selector
            .select_for_brand(f.db.as_ref(), f.tenant_id, f.brand_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id, first.id);
    }

    #[tokio::test]
    async fn test_suspended_accounts_are_excluded() {
        let f = fixture().await;
        let agent = seed_agent(&f, "suspended", AgentPresence::Online, Some(1), true).await;
        let mut active: agents::ActiveModel = agent.into();
        active.account_status = Set(AgentAccountStatus::Suspended);
        active.update(f.db.as_ref()).await.unwrap();

        let selector = MostRecentlySeenSelector::new();
        let picked = selector
            .select_for_brand(f.db.as_ref(), f.tenant_id, f.brand_id)
            .await
            .unwrap();
        assert!(picked.is_none());
    }

    #[tokio::test]
    async fn test_select_any_online_ignores_brand() {
        let f = fixture().await;
        let online = seed_agent(&f, "online", AgentPresence::Online, Some(3), false).await;
        seed_agent(&f, "away", AgentPresence::Away, Some(1), true).await;

        let selector = MostRecentlySeenSelector::new();
        let picked = selector
            .select_any_online(f.db.as_ref(), f.tenant_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(picked.id, online.id);
    }
}
