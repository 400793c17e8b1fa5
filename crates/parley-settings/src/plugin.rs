use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parley_core::plugin::{
    ParleyPlugin, PluginContext, PluginError, PluginRoutes, ServiceRegistrationContext,
};
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::services::{SystemSettingsService, WidgetSettingsService};

/// Settings plugin
///
/// Provides per-tenant widget settings and the system key-value store
/// holding the AI credential.
#[derive(Default)]
pub struct SettingsPlugin;

impl ParleyPlugin for SettingsPlugin {
    fn name(&self) -> &'static str {
        "settings"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let db = context.require_service::<DatabaseConnection>();

            context.register_service(Arc::new(WidgetSettingsService::new(db.clone())));
            context.register_service(Arc::new(SystemSettingsService::new(db)));

            debug!("Settings services registered successfully");
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let widget_settings = context.get_service::<WidgetSettingsService>()?;
        let system_settings = context.get_service::<SystemSettingsService>()?;

        let routes = crate::handlers::configure_routes().with_state(Arc::new(
            crate::handlers::AppState {
                widget_settings,
                system_settings,
            },
        ));

        Some(PluginRoutes { router: routes })
    }

    fn openapi_schema(&self) -> Option<utoipa::openapi::OpenApi> {
        use utoipa::OpenApi;
        Some(crate::handlers::SettingsApiDoc::openapi())
    }
}
