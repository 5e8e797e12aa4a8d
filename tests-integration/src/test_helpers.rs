use std::sync::Arc;
use std::time::Duration;

use common::backend::MemoryBackend;
use common::codec::DiscoveryContext;
use common::config::Configuration;
use common::model::{ServiceInstance, ServiceType};
use common::registry::ServiceDiscovery;
use gateway::InMemoryStateImpl;

/// Gateway state over a fresh in-process backend, with fast retry backoff so
/// outage tests don't sleep through the default policy.
///
/// Must be called from within a tokio runtime (the registry spawns its
/// invalidation task on construction).
pub fn test_state() -> (InMemoryStateImpl<String>, MemoryBackend) {
    let mut config = Configuration::default();
    config.discovery.retry.backoff = Duration::from_millis(10);

    let backend = MemoryBackend::new();
    let context: DiscoveryContext<String> =
        DiscoveryContext::new(config.discovery.max_staleness);
    let registry = ServiceDiscovery::new(
        Arc::new(backend.clone()),
        context,
        config.discovery.clone(),
    );
    (InMemoryStateImpl::new(registry, config), backend)
}

pub fn test_instance(name: &str, id: &str, payload: &str) -> ServiceInstance<String> {
    ServiceInstance {
        service_name: name.to_string(),
        instance_id: id.to_string(),
        address: "10.0.0.5".to_string(),
        port: 8080,
        service_type: ServiceType::Static,
        registration_time_millis: 1_700_000_000_000,
        payload: payload.to_string(),
    }
}
