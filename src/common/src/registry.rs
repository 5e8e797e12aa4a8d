use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::timeout;

use crate::backend::{BackendError, CoordinationBackend, WatchEvent};
use crate::codec::DiscoveryContext;
use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::model::{ServiceInstance, ServiceType};

/// Cached snapshot of one service's instance list. `fetched_at` of `None`
/// means invalidated: the next read goes to the backend.
struct CacheSlot<T> {
    instances: Vec<ServiceInstance<T>>,
    fetched_at: Option<Instant>,
}

type Cache<T> = RwLock<HashMap<String, Arc<Mutex<CacheSlot<T>>>>>;

/// The discovery engine: register/unregister/query operations over the
/// coordination store, with per-service snapshot caching and watch-driven
/// invalidation.
///
/// Instances live at `base_path/serviceName/instanceId`. DYNAMIC instances
/// are ephemeral nodes, so the store removes them when the owning session
/// ends; the watch on the service path makes such removals invalidate the
/// cache the same way an explicit unregistration does.
pub struct ServiceDiscovery<T> {
    backend: Arc<dyn CoordinationBackend>,
    context: DiscoveryContext<T>,
    config: DiscoveryConfig,
    cache: Arc<Cache<T>>,
    watch_tx: mpsc::UnboundedSender<WatchEvent>,
}

impl<T> Clone for ServiceDiscovery<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            context: self.context.clone(),
            config: self.config.clone(),
            cache: Arc::clone(&self.cache),
            watch_tx: self.watch_tx.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ServiceDiscovery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDiscovery")
            .field("context", &self.context)
            .field("base_path", &self.config.base_path)
            .finish()
    }
}

fn unavailable(err: BackendError) -> DiscoveryError {
    DiscoveryError::BackendUnavailable(err.to_string())
}

impl<T> ServiceDiscovery<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Build the registry and spawn its invalidation task. Watch events are
    /// delivered over a channel into that task, never mutated into the cache
    /// from backend threads directly.
    pub fn new(
        backend: Arc<dyn CoordinationBackend>,
        context: DiscoveryContext<T>,
        config: DiscoveryConfig,
    ) -> Self {
        let cache: Arc<Cache<T>> = Arc::new(RwLock::new(HashMap::new()));
        let (watch_tx, watch_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_invalidation(Arc::downgrade(&cache), watch_rx));
        Self {
            backend,
            context,
            config,
            cache,
            watch_tx,
        }
    }

    pub fn context(&self) -> &DiscoveryContext<T> {
        &self.context
    }

    /// Write or overwrite the instance record. Idempotent: re-registering the
    /// same (serviceName, instanceId) replaces the prior record entirely, so
    /// caller-side retries after a timeout are safe.
    pub async fn register(&self, instance: &ServiceInstance<T>) -> Result<(), DiscoveryError> {
        instance.validate()?;
        let data = self.context.encode_instance(instance)?;
        let path = self.instance_path(&instance.service_name, &instance.instance_id);
        let ephemeral = instance.service_type == ServiceType::Dynamic;

        self.bounded(self.backend.create_or_update(&path, data, ephemeral))
            .await?
            .map_err(unavailable)?;

        self.invalidate(&instance.service_name).await;
        log::debug!(
            "registered instance {} for service {}",
            instance.instance_id,
            instance.service_name
        );
        Ok(())
    }

    /// Remove the instance record; `NotFound` when it is not registered.
    pub async fn unregister(
        &self,
        service_name: &str,
        instance_id: &str,
    ) -> Result<(), DiscoveryError> {
        let path = self.instance_path(service_name, instance_id);
        match self.bounded(self.backend.delete(&path)).await? {
            Ok(()) => {}
            Err(BackendError::NoNode(_)) => {
                return Err(DiscoveryError::NotFound {
                    service_name: service_name.to_string(),
                    instance_id: instance_id.to_string(),
                });
            }
            Err(err) => return Err(unavailable(err)),
        }

        self.invalidate(service_name).await;
        log::debug!("unregistered instance {instance_id} for service {service_name}");
        Ok(())
    }

    /// Snapshot of the instances of `service_name`: the cached list when
    /// younger than the staleness bound, a fresh backend fetch otherwise.
    ///
    /// The slot mutex keeps at most one backend fetch per service in flight;
    /// concurrent callers wait on it and then serve the snapshot it produced.
    pub async fn query_instances(
        &self,
        service_name: &str,
    ) -> Result<Vec<ServiceInstance<T>>, DiscoveryError> {
        let slot = self.slot(service_name).await;
        let mut slot = slot.lock().await;

        if let Some(fetched_at) = slot.fetched_at
            && fetched_at.elapsed() < self.context.max_staleness()
        {
            return Ok(slot.instances.clone());
        }

        let instances = self.fetch_instances(service_name).await?;
        slot.instances = instances.clone();
        slot.fetched_at = Some(Instant::now());
        Ok(instances)
    }

    /// Exactly the names with at least one live instance at the time of the
    /// call. Always a fresh backend read; an empty registry is an empty list,
    /// not an error.
    pub async fn query_service_names(&self) -> Result<Vec<String>, DiscoveryError> {
        let names = self
            .bounded(self.backend.get_children(&self.config.base_path))
            .await?
            .map_err(unavailable)?;

        let mut live = Vec::with_capacity(names.len());
        for name in names {
            let children = self
                .bounded(self.backend.get_children(&self.service_path(&name)))
                .await?
                .map_err(unavailable)?;
            if !children.is_empty() {
                live.push(name);
            }
        }
        Ok(live)
    }

    async fn fetch_instances(
        &self,
        service_name: &str,
    ) -> Result<Vec<ServiceInstance<T>>, DiscoveryError> {
        let children = self
            .bounded(self.backend.get_children(&self.service_path(service_name)))
            .await?
            .map_err(unavailable)?;

        let mut instances = Vec::with_capacity(children.len());
        for child in children {
            let node = self.instance_path(service_name, &child);
            match self.bounded(self.backend.get_data(&node)).await? {
                Ok(bytes) => match self.context.decode_instance(&bytes) {
                    Ok(instance) => instances.push(instance),
                    Err(err) => {
                        log::warn!("skipping undecodable instance record at {node}: {err}");
                    }
                },
                // Removed between the child listing and the read
                Err(BackendError::NoNode(_)) => {}
                Err(err) => return Err(unavailable(err)),
            }
        }
        Ok(instances)
    }

    /// Cache slot for `service_name`, created on first interest. Creation
    /// installs the backend watch on the service path; when that fails the
    /// periodic staleness bound still limits how old a snapshot can get.
    async fn slot(&self, service_name: &str) -> Arc<Mutex<CacheSlot<T>>> {
        if let Some(slot) = self.cache.read().await.get(service_name) {
            return Arc::clone(slot);
        }

        let mut cache = self.cache.write().await;
        if let Some(slot) = cache.get(service_name) {
            return Arc::clone(slot);
        }

        let path = self.service_path(service_name);
        match timeout(
            self.config.backend_timeout,
            self.backend.watch(&path, self.watch_tx.clone()),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => log::warn!("failed to install watch on {path}: {err}"),
            Err(_) => log::warn!("watch installation on {path} timed out"),
        }

        let slot = Arc::new(Mutex::new(CacheSlot {
            instances: Vec::new(),
            fetched_at: None,
        }));
        cache.insert(service_name.to_string(), Arc::clone(&slot));
        slot
    }

    async fn invalidate(&self, service_name: &str) {
        let slot = self.cache.read().await.get(service_name).cloned();
        if let Some(slot) = slot {
            slot.lock().await.fetched_at = None;
        }
    }

    /// Bound a backend call by the configured timeout. The outer error is the
    /// timeout; the inner result is the backend's own.
    async fn bounded<R>(
        &self,
        call: impl Future<Output = Result<R, BackendError>>,
    ) -> Result<Result<R, BackendError>, DiscoveryError> {
        timeout(self.config.backend_timeout, call)
            .await
            .map_err(|_| {
                DiscoveryError::BackendUnavailable(format!(
                    "backend call timed out after {:?}",
                    self.config.backend_timeout
                ))
            })
    }

    fn service_path(&self, service_name: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_path.trim_end_matches('/'),
            service_name
        )
    }

    fn instance_path(&self, service_name: &str, instance_id: &str) -> String {
        format!("{}/{}", self.service_path(service_name), instance_id)
    }
}

/// Consume watch events and mark the affected slot stale. Ends when the
/// registry (and with it the cache) is dropped or all senders close.
async fn run_invalidation<T>(
    cache: Weak<Cache<T>>,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(cache) = cache.upgrade() else {
            break;
        };
        let service_name = event.path.rsplit('/').next().unwrap_or_default();
        let slot = cache.read().await.get(service_name).cloned();
        if let Some(slot) = slot {
            slot.lock().await.fetched_at = None;
            log::debug!("invalidated cached instances for service {service_name}");
        }
    }
}
