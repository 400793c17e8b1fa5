use std::sync::Arc;

use axum::{Extension, Router};
use clap::Args;
use parley_ai::AiPlugin;
use parley_core::plugin::PluginManager;
use parley_core::WidgetTokenService;
use parley_handoff::HandoffPlugin;
use parley_realtime::RealtimePlugin;
use parley_settings::SettingsPlugin;
use parley_visitors::VisitorsPlugin;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use utoipa_swagger_ui::SwaggerUi;

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1:3000", env = "PARLEY_ADDRESS")]
    pub address: String,

    /// Database connection URL
    #[arg(long, env = "PARLEY_DATABASE_URL")]
    pub database_url: String,

    /// Secret for sealing widget session tokens (64 hex chars or 32 raw bytes)
    #[arg(long, env = "PARLEY_WIDGET_SECRET")]
    pub widget_secret: String,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        debug!("Initializing database connection...");
        let db = parley_database::establish_connection(&self.database_url).await?;

        let tokens = Arc::new(WidgetTokenService::new(&self.widget_secret)?);

        let mut plugin_manager = PluginManager::new();
        {
            let context = plugin_manager.service_context();
            context.register_service(db.clone());
            context.register_service(tokens.clone());
        }

        // Registration order matters: settings and realtime provide the
        // services the visitor, hand-off and AI plugins depend on
        plugin_manager.register_plugin(Box::new(SettingsPlugin));
        plugin_manager.register_plugin(Box::new(RealtimePlugin));
        plugin_manager.register_plugin(Box::new(VisitorsPlugin));
        plugin_manager.register_plugin(Box::new(HandoffPlugin));
        plugin_manager.register_plugin(Box::new(AiPlugin));

        plugin_manager
            .initialize_plugins()
            .await
            .map_err(|e| anyhow::anyhow!("Plugin initialization failed: {}", e))?;
        debug!("All plugins initialized successfully");

        let api_doc = plugin_manager
            .get_unified_openapi()
            .map_err(|e| anyhow::anyhow!("Failed to build OpenAPI schema: {}", e))?;

        let app = plugin_manager
            .build_application()
            .map_err(|e| anyhow::anyhow!("Failed to build application: {}", e))?
            .merge(
                Router::new()
                    .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api_doc)),
            )
            .layer(Extension(tokens))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive());

        let listener = TcpListener::bind(&self.address).await?;
        info!("Parley server listening on {}", self.address);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("Parley server exited");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
