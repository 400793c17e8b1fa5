use std::sync::Arc;

use parley_entities::{system_settings, widget_settings};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

const AI_API_KEY: &str = "ai.api_key";
const AI_MODEL: &str = "ai.model";
const AI_BASE_URL: &str = "ai.base_url";

const DEFAULT_AI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Per-tenant widget configuration as seen by callers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WidgetSettingsView {
    pub tenant_id: i32,
    pub ai_enabled: bool,
    pub welcome_message: Option<String>,
}

impl WidgetSettingsView {
    fn defaults(tenant_id: i32) -> Self {
        Self {
            tenant_id,
            ai_enabled: false,
            welcome_message: None,
        }
    }
}

/// Read/write store for per-tenant widget configuration
pub struct WidgetSettingsService {
    db: Arc<DatabaseConnection>,
}

impl WidgetSettingsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Missing rows read as defaults; a tenant gets a row on first write
    pub async fn get(&self, tenant_id: i32) -> Result<WidgetSettingsView, SettingsError> {
        let row = widget_settings::Entity::find()
            .filter(widget_settings::Column::TenantId.eq(tenant_id))
            .one(self.db.as_ref())
            .await?;

        Ok(match row {
            Some(row) => WidgetSettingsView {
                tenant_id,
                ai_enabled: row.ai_enabled,
                welcome_message: row.welcome_message,
            },
            None => WidgetSettingsView::defaults(tenant_id),
        })
    }

    pub async fn update(
        &self,
        tenant_id: i32,
        ai_enabled: Option<bool>,
        welcome_message: Option<String>,
    ) -> Result<WidgetSettingsView, SettingsError> {
        let existing = widget_settings::Entity::find()
            .filter(widget_settings::Column::TenantId.eq(tenant_id))
            .one(self.db.as_ref())
            .await?;

        let now = chrono::Utc::now();
        let saved = match existing {
            Some(row) => {
                let mut active: widget_settings::ActiveModel = row.into();
                if let Some(ai_enabled) = ai_enabled {
                    active.ai_enabled = Set(ai_enabled);
                }
                if let Some(message) = welcome_message {
                    active.welcome_message = Set(Some(message));
                }
                active.updated_at = Set(now);
                active.update(self.db.as_ref()).await?
            }
            None => {
                widget_settings::ActiveModel {
                    tenant_id: Set(tenant_id),
                    ai_enabled: Set(ai_enabled.unwrap_or(false)),
                    welcome_message: Set(welcome_message),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(self.db.as_ref())
                .await?
            }
        };

        Ok(WidgetSettingsView {
            tenant_id,
            ai_enabled: saved.ai_enabled,
            welcome_message: saved.welcome_message,
        })
    }
}

/// System-wide AI credential
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AiCredentials {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Key/value store for system-wide settings
pub struct SystemSettingsService {
    db: Arc<DatabaseConnection>,
}

impl SystemSettingsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(system_settings::Entity::find()
            .filter(system_settings::Column::Key.eq(key))
            .one(self.db.as_ref())
            .await?
            .map(|row| row.value))
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let existing = system_settings::Entity::find()
            .filter(system_settings::Column::Key.eq(key))
            .one(self.db.as_ref())
            .await?;

        let now = chrono::Utc::now();
        match existing {
            Some(row) => {
                let mut active: system_settings::ActiveModel = row.into();
                active.value = Set(value.to_string());
                active.updated_at = Set(now);
                active.update(self.db.as_ref()).await?;
            }
            None => {
                system_settings::ActiveModel {
                    key: Set(key.to_string()),
                    value: Set(value.to_string()),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(self.db.as_ref())
                .await?;
            }
        }
        Ok(())
    }

    /// None when no AI credential has been configured
    pub async fn ai_credentials(&self) -> Result<Option<AiCredentials>, SettingsError> {
        let api_key = match self.get_value(AI_API_KEY).await? {
            Some(key) if !key.is_empty() => key,
            _ => return Ok(None),
        };

        let model = self
            .get_value(AI_MODEL)
            .await?
            .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string());
        let base_url = self
            .get_value(AI_BASE_URL)
            .await?
            .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string());

        Ok(Some(AiCredentials {
            api_key,
            model,
            base_url,
        }))
    }

    pub async fn set_ai_credentials(
        &self,
        api_key: &str,
        model: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<(), SettingsError> {
        self.set_value(AI_API_KEY, api_key).await?;
        if let Some(model) = model {
            self.set_value(AI_MODEL, model).await?;
        }
        if let Some(base_url) = base_url {
            self.set_value(AI_BASE_URL, base_url).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_database::test_utils::TestDatabase;

    #[tokio::test]
    async fn test_widget_settings_default_when_missing() {
        let test_db = TestDatabase::new().await.unwrap();
        let service = WidgetSettingsService::new(test_db.db.clone());

        let view = service.get(1).await.unwrap();
        assert!(!view.ai_enabled);
        assert!(view.welcome_message.is_none());
    }

    #[tokio::test]
    async fn test_widget_settings_update_roundtrip() {
        let test_db = TestDatabase::new().await.unwrap();
        let service = WidgetSettingsService::new(test_db.db.clone());

        // tenant row needed for the FK
        seed_tenant(&test_db, "Acme").await;

        let view = service
            .update(1, Some(true), Some("Hi there".to_string()))
            .await
            .unwrap();
        assert!(view.ai_enabled);

        let view = service.get(1).await.unwrap();
        assert!(view.ai_enabled);
        assert_eq!(view.welcome_message.as_deref(), Some("Hi there"));

        // Partial update leaves the other field untouched
        let view = service.update(1, Some(false), None).await.unwrap();
        assert!(!view.ai_enabled);
        assert_eq!(view.welcome_message.as_deref(), Some("Hi there"));
    }

    #[tokio::test]
    async fn test_ai_credentials_absent_by_default() {
        let test_db = TestDatabase::new().await.unwrap();
        let service = SystemSettingsService::new(test_db.db.clone());

        assert!(service.ai_credentials().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ai_credentials_set_and_defaults() {
        let test_db = TestDatabase::new().await.unwrap();
        let service = SystemSettingsService::new(test_db.db.clone());

        service
            .set_ai_credentials("sk-test", None, None)
            .await
            .unwrap();

        let creds = service.ai_credentials().await.unwrap().unwrap();
        assert_eq!(creds.api_key, "sk-test");
        assert_eq!(creds.model, DEFAULT_AI_MODEL);
        assert_eq!(creds.base_url, DEFAULT_AI_BASE_URL);

        service
            .set_ai_credentials("sk-test", Some("gpt-4o"), None)
            .await
            .unwrap();
        let creds = service.ai_credentials().await.unwrap().unwrap();
        assert_eq!(creds.model, "gpt-4o");
    }

    async fn seed_tenant(test_db: &TestDatabase, name: &str) {
        use parley_entities::tenants;
        use sea_orm::{ActiveModelTrait, Set};

        tenants::ActiveModel {
            name: Set(name.to_string()),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(test_db.db.as_ref())
        .await
        .unwrap();
    }
}
