//! Plugin system for modular service registration and route configuration
//!
//! Each domain crate exposes a `ParleyPlugin` that registers its services
//! into a type-keyed registry, contributes an axum router, and supplies its
//! OpenAPI schema. The manager initializes plugins in registration order,
//! so dependency providers must be registered before their consumers.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use axum::Router;
use thiserror::Error;
use tracing::debug;
use utoipa::openapi::security::SecurityScheme;
use utoipa::openapi::{ComponentsBuilder, OpenApi};

/// Errors that can occur during plugin operations
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin registration failed for '{plugin_name}': {error}")]
    PluginRegistrationFailed { plugin_name: String, error: String },

    #[error("Service '{service_type}' is required but not registered")]
    ServiceNotFound { service_type: String },

    #[error("Failed to initialize plugin system: {0}")]
    InitializationFailed(String),
}

/// Core plugin trait that defines the plugin interface
pub trait ParleyPlugin: Send + Sync {
    /// Unique identifier for this plugin
    fn name(&self) -> &'static str;

    /// Register services that this plugin provides
    ///
    /// Use `context.require_service::<T>()` to get dependencies and
    /// `context.register_service(service)` to provide services for
    /// later plugins.
    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>>;

    /// Configure HTTP routes for this plugin
    ///
    /// Return None if this plugin doesn't provide HTTP endpoints.
    fn configure_routes(&self, _context: &PluginContext) -> Option<PluginRoutes> {
        None
    }

    /// Provide OpenAPI schema for this plugin's endpoints
    fn openapi_schema(&self) -> Option<OpenApi> {
        None
    }
}

/// Route configuration returned by plugins
pub struct PluginRoutes {
    /// The actual router with handlers
    pub router: Router,
}

impl PluginRoutes {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

/// Type-safe service registry for dependency injection
pub struct ServiceRegistry {
    services: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: Mutex::new(HashMap::new()),
        }
    }

    /// Register a service for other plugins to use
    pub fn register<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        debug!("Registering service: {}", std::any::type_name::<T>());
        self.services
            .lock()
            .unwrap()
            .insert(TypeId::of::<T>(), Box::new(service));
    }

    /// Get a service if it's registered
    pub fn get<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.services
            .lock()
            .unwrap()
            .get(&TypeId::of::<T>())
            .and_then(|any| any.downcast_ref::<Arc<T>>())
            .cloned()
    }

    /// Require a service - panics with a helpful error if not available
    pub fn require<T: Send + Sync + 'static + ?Sized>(&self) -> Arc<T> {
        self.get::<T>().unwrap_or_else(|| {
            panic!(
                "Service '{}' is required but not registered. \
                 Make sure the plugin providing this service is registered first.",
                std::any::type_name::<T>()
            )
        })
    }
}

/// Read-only context provided to plugins during route configuration
pub struct PluginContext {
    service_registry: Arc<ServiceRegistry>,
}

impl PluginContext {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            service_registry: registry,
        }
    }

    /// Get a service if it's available (for optional dependencies)
    pub fn get_service<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.service_registry.get::<T>()
    }

    /// Require a service - panics with a clear error if not available
    pub fn require_service<T: Send + Sync + 'static + ?Sized>(&self) -> Arc<T> {
        self.service_registry.require::<T>()
    }
}

/// Context for service registration during plugin initialization
pub struct ServiceRegistrationContext {
    service_registry: Arc<ServiceRegistry>,
}

impl Default for ServiceRegistrationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceRegistrationContext {
    pub fn new() -> Self {
        Self {
            service_registry: Arc::new(ServiceRegistry::new()),
        }
    }

    /// Register a service for other plugins to use
    pub fn register_service<T: Send + Sync + 'static + ?Sized>(&self, service: Arc<T>) {
        self.service_registry.register(service);
    }

    /// Get a service if it's available
    pub fn get_service<T: Send + Sync + 'static + ?Sized>(&self) -> Option<Arc<T>> {
        self.service_registry.get::<T>()
    }

    /// Require a service - panics with a clear error if not available
    pub fn require_service<T: Send + Sync + 'static + ?Sized>(&self) -> Arc<T> {
        self.service_registry.require::<T>()
    }

    /// Create a read-only context for route configuration
    pub fn create_plugin_context(&self) -> PluginContext {
        PluginContext::new(self.service_registry.clone())
    }
}

/// Plugin manager that handles registration, initialization, and application
/// building
pub struct PluginManager {
    plugins: Vec<Box<dyn ParleyPlugin>>,
    context: ServiceRegistrationContext,
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            context: ServiceRegistrationContext::new(),
        }
    }

    /// Register a plugin (order matters for dependencies)
    pub fn register_plugin(&mut self, plugin: Box<dyn ParleyPlugin>) {
        debug!("Registering plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    /// Access the registration context for seeding core services (database
    /// connection, configuration) before plugin initialization
    pub fn service_context(&self) -> &ServiceRegistrationContext {
        &self.context
    }

    /// Initialize all plugins in registration order
    pub async fn initialize_plugins(&mut self) -> Result<(), PluginError> {
        debug!("Initializing {} plugins", self.plugins.len());

        for plugin in &self.plugins {
            debug!("Initializing plugin: {}", plugin.name());
            plugin.register_services(&self.context).await.map_err(|e| {
                PluginError::PluginRegistrationFailed {
                    plugin_name: plugin.name().to_string(),
                    error: e.to_string(),
                }
            })?;
        }

        Ok(())
    }

    /// Build the complete application with all plugin routes under `/api`
    pub fn build_application(&self) -> Result<Router, PluginError> {
        let plugin_context = self.context.create_plugin_context();
        let mut api_router = Router::new();

        for plugin in &self.plugins {
            if let Some(plugin_routes) = plugin.configure_routes(&plugin_context) {
                debug!("Adding routes for plugin: {}", plugin.name());
                api_router = api_router.merge(plugin_routes.router);
            }
        }

        Ok(Router::new().nest("/api", api_router))
    }

    /// Get the unified OpenAPI schema from all plugins
    pub fn get_unified_openapi(&self) -> Result<OpenApi, PluginError> {
        use utoipa::openapi::*;

        let mut combined = OpenApiBuilder::new()
            .info(
                InfoBuilder::new()
                    .title("Parley")
                    .description(Some(
                        "Multi-tenant live-chat API with AI auto-response and agent hand-off",
                    ))
                    .version("1.0.0")
                    .build(),
            )
            .servers(Some(vec![ServerBuilder::new()
                .url("/api")
                .description(Some("Base path for all API endpoints"))
                .build()]))
            .components(Some(
                ComponentsBuilder::new()
                    .security_scheme("widget_token", self.create_widget_token_scheme())
                    .build(),
            ))
            .build();

        for plugin in &self.plugins {
            if let Some(schema) = plugin.openapi_schema() {
                debug!("Merging OpenAPI schema for plugin: {}", plugin.name());
                combined = merge_openapi_schemas(combined, schema);
            }
        }

        Ok(combined)
    }

    fn create_widget_token_scheme(&self) -> SecurityScheme {
        use utoipa::openapi::security::*;

        SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
            "X-Widget-Token",
            "Widget session token issued by POST /widget/session",
        )))
    }
}

fn merge_openapi_schemas(mut base: OpenApi, plugin_schema: OpenApi) -> OpenApi {
    for (path, path_item) in plugin_schema.paths.paths {
        base.paths.paths.insert(path, path_item);
    }

    if let Some(plugin_components) = plugin_schema.components {
        let base_components = base
            .components
            .get_or_insert_with(|| ComponentsBuilder::new().build());

        for (name, schema) in plugin_components.schemas {
            base_components.schemas.insert(name, schema);
        }
        for (name, response) in plugin_components.responses {
            base_components.responses.insert(name, response);
        }
    }

    if let Some(plugin_tags) = plugin_schema.tags {
        base.tags.get_or_insert_with(Vec::new).extend(plugin_tags);
    }

    base
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(u32);

    #[test]
    fn test_registry_register_and_get() {
        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Dummy(7)));

        let got = registry.get::<Dummy>().unwrap();
        assert_eq!(got.0, 7);
        assert!(registry.get::<String>().is_none());
    }

    #[test]
    fn test_registry_trait_object() {
        trait Marker: Send + Sync {
            fn id(&self) -> u32;
        }
        impl Marker for Dummy {
            fn id(&self) -> u32 {
                self.0
            }
        }

        let registry = ServiceRegistry::new();
        let service: Arc<dyn Marker> = Arc::new(Dummy(3));
        registry.register::<dyn Marker>(service);

        assert_eq!(registry.require::<dyn Marker>().id(), 3);
    }

    struct NoopPlugin;

    impl ParleyPlugin for NoopPlugin {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn register_services<'a>(
            &'a self,
            _context: &'a ServiceRegistrationContext,
        ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn test_manager_initializes_plugins() {
        let mut manager = PluginManager::new();
        manager.register_plugin(Box::new(NoopPlugin));
        manager.initialize_plugins().await.unwrap();
        manager.build_application().unwrap();
    }
}
