use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parley_core::plugin::{
    ParleyPlugin, PluginContext, PluginError, PluginRoutes, ServiceRegistrationContext,
};
use parley_core::WidgetTokenService;
use parley_realtime::Notifier;
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::services::{SessionService, VisitorService};

/// Visitor session tracking plugin.
///
/// Depends on the database connection, the widget token service, and the
/// realtime notifier; register it after the realtime plugin.
#[derive(Default)]
pub struct VisitorsPlugin;

impl ParleyPlugin for VisitorsPlugin {
    fn name(&self) -> &'static str {
        "visitors"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let db = context.require_service::<DatabaseConnection>();
            let tokens = context.require_service::<WidgetTokenService>();
            let notifier = context.require_service::<dyn Notifier>();

            context.register_service(Arc::new(VisitorService::new(db.clone(), notifier)));
            context.register_service(Arc::new(SessionService::new(db, tokens)));

            debug!("Visitor services registered successfully");
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let visitors = context.get_service::<VisitorService>()?;
        let sessions = context.get_service::<SessionService>()?;

        let routes = crate::handlers::configure_routes()
            .with_state(Arc::new(crate::handlers::AppState { visitors, sessions }));

        Some(PluginRoutes { router: routes })
    }

    fn openapi_schema(&self) -> Option<utoipa::openapi::OpenApi> {
        use utoipa::OpenApi;
        Some(crate::handlers::VisitorsApiDoc::openapi())
    }
}
