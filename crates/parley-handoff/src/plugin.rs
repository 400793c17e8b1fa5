use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parley_core::plugin::{
    ParleyPlugin, PluginContext, PluginError, PluginRoutes, ServiceRegistrationContext,
};
use parley_realtime::Notifier;
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::selector::{AgentSelector, MostRecentlySeenSelector};
use crate::services::HandoffService;

/// Hand-off coordination plugin; register it after the realtime plugin.
#[derive(Default)]
pub struct HandoffPlugin;

impl ParleyPlugin for HandoffPlugin {
    fn name(&self) -> &'static str {
        "handoff"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let db = context.require_service::<DatabaseConnection>();
            let notifier = context.require_service::<dyn Notifier>();

            let selector: Arc<dyn AgentSelector> = Arc::new(MostRecentlySeenSelector::new());
            context.register_service(Arc::new(HandoffService::new(db, notifier, selector)));

            debug!("Hand-off services registered successfully");
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let handoffs = context.get_service::<HandoffService>()?;

        let routes = crate::handlers::configure_routes()
            .with_state(Arc::new(crate::handlers::AppState { handoffs }));

        Some(PluginRoutes { router: routes })
    }

    fn openapi_schema(&self) -> Option<utoipa::openapi::OpenApi> {
        use utoipa::OpenApi;
        Some(crate::handlers::HandoffApiDoc::openapi())
    }
}
