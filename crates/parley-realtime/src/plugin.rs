use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parley_core::plugin::{
    ParleyPlugin, PluginContext, PluginError, PluginRoutes, ServiceRegistrationContext,
};
use tracing::debug;

use crate::notifier::{ChannelNotifier, Notifier};

/// Realtime fan-out plugin
///
/// Registers the concrete `ChannelNotifier` (for the WebSocket endpoints)
/// and the `dyn Notifier` capability other plugins inject into their
/// services.
#[derive(Default)]
pub struct RealtimePlugin;

impl ParleyPlugin for RealtimePlugin {
    fn name(&self) -> &'static str {
        "realtime"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let notifier = Arc::new(ChannelNotifier::new());
            context.register_service(notifier.clone());
            context.register_service::<dyn Notifier>(notifier);

            debug!("Realtime services registered successfully");
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let notifier = context.get_service::<ChannelNotifier>()?;

        let routes = crate::handlers::configure_routes()
            .with_state(Arc::new(crate::handlers::AppState { notifier }));

        Some(PluginRoutes { router: routes })
    }
}
