use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use common::codec::DiscoveryContext;
use common::config::Configuration;
use common::registry::ServiceDiscovery;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub mod endpoints;

/// Shared state accessed by route handlers. The payload type is fixed per
/// deployment; handlers stay generic over it through the associated type.
pub trait RouterState: std::fmt::Debug + Clone + Send + Sync + 'static {
    type Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    fn registry(&self) -> &ServiceDiscovery<Self::Payload>;
    fn config(&self) -> &Configuration;

    fn context(&self) -> &DiscoveryContext<Self::Payload> {
        self.registry().context()
    }
}

/// RouterState implementation wiring the registry and configuration built at
/// process start. Dependencies are constructed explicitly and passed in; the
/// gateway keeps no global singletons.
#[derive(Clone)]
pub struct InMemoryStateImpl<T> {
    registry: ServiceDiscovery<T>,
    config: Configuration,
}

impl<T> std::fmt::Debug for InMemoryStateImpl<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateImpl")
            .field("registry", &self.registry)
            .field("config", &"Configuration")
            .finish()
    }
}

impl<T> InMemoryStateImpl<T> {
    pub fn new(registry: ServiceDiscovery<T>, config: Configuration) -> Self {
        Self { registry, config }
    }
}

impl<T> RouterState for InMemoryStateImpl<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Payload = T;

    fn registry(&self) -> &ServiceDiscovery<T> {
        &self.registry
    }

    fn config(&self) -> &Configuration {
        &self.config
    }
}

/// Create a new router instance with all routes configured
pub fn create_router<S: RouterState>(state: S) -> Router {
    Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest("/v1", endpoints::service::router())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
