use std::sync::Arc;

use parley_core::{WidgetClaims, WidgetTokenService};
use parley_entities::brands;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Unknown widget key")]
    UnknownWidgetKey,

    #[error("Token error: {0}")]
    Token(#[from] parley_core::WidgetTokenError),
}

/// Issued session with its sealed token
#[derive(Debug)]
pub struct IssuedSession {
    pub token: String,
    pub claims: WidgetClaims,
}

/// Mints widget session tokens from brand widget keys.
///
/// The widget key is the only credential the embedded snippet carries;
/// everything after this exchange trusts the sealed token, never
/// client-supplied ids.
pub struct SessionService {
    db: Arc<DatabaseConnection>,
    tokens: Arc<WidgetTokenService>,
}

impl SessionService {
    pub fn new(db: Arc<DatabaseConnection>, tokens: Arc<WidgetTokenService>) -> Self {
        Self { db, tokens }
    }

    /// Exchange a widget key for a sealed session token.
    ///
    /// A returning widget passes the visitor id it stored locally so the
    /// token keeps addressing the same durable row; first-time widgets
    /// get a fresh id.
    pub async fn issue(
        &self,
        widget_key: &str,
        visitor_id: Option<String>,
    ) -> Result<IssuedSession, SessionError> {
        let brand = brands::Entity::find()
            .filter(brands::Column::WidgetKey.eq(widget_key))
            .filter(brands::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await?
            .ok_or(SessionError::UnknownWidgetKey)?;

        let visitor_id = visitor_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let claims = WidgetClaims::new(brand.tenant_id, Some(brand.id), visitor_id);
        let token = self.tokens.issue(&claims)?;

        debug!(
            tenant_id = claims.tenant_id,
            brand_id = brand.id,
            "widget session issued"
        );

        Ok(IssuedSession { token, claims })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_database::test_utils::TestDatabase;
    use sea_orm::{ActiveValue::Set, ActiveModelTrait};

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef";

    async fn seed_brand(db: &DatabaseConnection) -> brands::Model {
        let tenant = parley_entities::tenants::ActiveModel {
            name: Set("Acme".to_string()),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap();

        brands::ActiveModel {
            tenant_id: Set(tenant.id),
            name: Set("Acme Support".to_string()),
            widget_key: Set("wk_live_acme".to_string()),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    fn service(db: Arc<DatabaseConnection>) -> SessionService {
        SessionService::new(db, Arc::new(WidgetTokenService::new(TEST_KEY).unwrap()))
    }

    #[tokio::test]
    async fn test_issue_mints_verifiable_token() {
        let test_db = TestDatabase::new().await.unwrap();
        let brand = seed_brand(test_db.db.as_ref()).await;
        let service = service(test_db.db.clone());

        let issued = service.issue("wk_live_acme", None).await.unwrap();
        assert_eq!(issued.claims.tenant_id, brand.tenant_id);
        assert_eq!(issued.claims.brand_id, Some(brand.id));
        assert!(!issued.claims.visitor_id.is_empty());

        let tokens = WidgetTokenService::new(TEST_KEY).unwrap();
        let verified = tokens.verify(&issued.token).unwrap();
        assert_eq!(verified.visitor_id, issued.claims.visitor_id);
    }

    #[tokio::test]
    async fn test_issue_keeps_returning_visitor_id() {
        let test_db = TestDatabase::new().await.unwrap();
        seed_brand(test_db.db.as_ref()).await;
        let service = service(test_db.db.clone());

        let issued = service
            .issue("wk_live_acme", Some("v-returning".to_string()))
            .await
            .unwrap();
        assert_eq!(issued.claims.visitor_id, "v-returning");
    }

    #[tokio::test]
    async fn test_issue_rejects_unknown_key() {
        let test_db = TestDatabase::new().await.unwrap();
        seed_brand(test_db.db.as_ref()).await;
        let service = service(test_db.db.clone());

        let err = service.issue("wk_live_wrong", None).await.unwrap_err();
        assert!(matches!(err, SessionError::UnknownWidgetKey));
    }
}
