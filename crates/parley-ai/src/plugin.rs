use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parley_core::plugin::{
    ParleyPlugin, PluginContext, PluginError, PluginRoutes, ServiceRegistrationContext,
};
use parley_handoff::HandoffService;
use parley_realtime::Notifier;
use parley_settings::{SystemSettingsService, WidgetSettingsService};
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::engine::{AiEngine, OpenAiChatEngine};
use crate::services::AiGateService;

/// AI response gate plugin; register it after the settings, realtime and
/// hand-off plugins.
#[derive(Default)]
pub struct AiPlugin;

impl ParleyPlugin for AiPlugin {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let db = context.require_service::<DatabaseConnection>();
            let notifier = context.require_service::<dyn Notifier>();
            let widget_settings = context.require_service::<WidgetSettingsService>();
            let system_settings = context.require_service::<SystemSettingsService>();
            let handoffs = context.require_service::<HandoffService>();

            let engine: Arc<dyn AiEngine> = Arc::new(OpenAiChatEngine::new());
            context.register_service(Arc::new(AiGateService::new(
                db,
                notifier,
                widget_settings,
                system_settings,
                handoffs,
                engine,
            )));

            debug!("AI services registered successfully");
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let gate = context.get_service::<AiGateService>()?;

        let routes = crate::handlers::configure_routes()
            .with_state(Arc::new(crate::handlers::AppState { gate }));

        Some(PluginRoutes { router: routes })
    }

    fn openapi_schema(&self) -> Option<utoipa::openapi::OpenApi> {
        use utoipa::OpenApi;
        Some(crate::handlers::AiApiDoc::openapi())
    }
}
