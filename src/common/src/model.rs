use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::DiscoveryError;

/// Liveness model of a registered instance.
///
/// DYNAMIC instances are written as ephemeral nodes and disappear when the
/// owning backend session ends; STATIC instances persist until explicitly
/// unregistered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceType {
    Dynamic,
    Static,
}

/// One registered, addressable endpoint of a named service.
///
/// The payload is an opaque typed value that travels through JSON without the
/// registry knowing its shape; the concrete type is fixed per deployment by
/// the [`DiscoveryContext`](crate::codec::DiscoveryContext).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance<T> {
    pub service_name: String,
    pub instance_id: String,
    pub address: String,
    pub port: u16,
    pub service_type: ServiceType,
    pub registration_time_millis: i64,
    pub payload: T,
}

impl<T> ServiceInstance<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn builder() -> ServiceInstanceBuilder<T> {
        ServiceInstanceBuilder::default()
    }

    /// Check identity invariants. Names become backend path segments, so a
    /// `/` inside one would corrupt the tree layout.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        validate_identity(&self.service_name, &self.instance_id)?;
        if self.address.is_empty() {
            return Err(DiscoveryError::InvalidInstance(
                "address must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_identity(
    service_name: &str,
    instance_id: &str,
) -> Result<(), DiscoveryError> {
    if service_name.is_empty() {
        return Err(DiscoveryError::InvalidInstance(
            "service name must not be empty".to_string(),
        ));
    }
    if instance_id.is_empty() {
        return Err(DiscoveryError::InvalidInstance(
            "instance id must not be empty".to_string(),
        ));
    }
    if service_name.contains('/') || instance_id.contains('/') {
        return Err(DiscoveryError::InvalidInstance(
            "service name and instance id must not contain '/'".to_string(),
        ));
    }
    Ok(())
}

/// Builder for [`ServiceInstance`]. The instance id defaults to a fresh UUID
/// and the registration timestamp is stamped at build time.
pub struct ServiceInstanceBuilder<T> {
    service_name: Option<String>,
    instance_id: Option<String>,
    address: Option<String>,
    port: u16,
    service_type: ServiceType,
    payload: Option<T>,
}

impl<T> Default for ServiceInstanceBuilder<T> {
    fn default() -> Self {
        Self {
            service_name: None,
            instance_id: None,
            address: None,
            port: 0,
            service_type: ServiceType::Dynamic,
            payload: None,
        }
    }
}

impl<T> ServiceInstanceBuilder<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn service_type(mut self, service_type: ServiceType) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn payload(mut self, payload: T) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn build(self) -> Result<ServiceInstance<T>, DiscoveryError> {
        let service_name = self.service_name.unwrap_or_default();
        let instance_id = self
            .instance_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let address = self.address.unwrap_or_default();
        let payload = self.payload.ok_or_else(|| {
            DiscoveryError::InvalidInstance("payload must be set".to_string())
        })?;

        let instance = ServiceInstance {
            service_name,
            instance_id,
            address,
            port: self.port,
            service_type: self.service_type,
            registration_time_millis: chrono::Utc::now().timestamp_millis(),
            payload,
        };
        instance.validate()?;
        Ok(instance)
    }
}

/// Wire object for the service name listing: `{"names": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServiceNames {
    pub names: Vec<String>,
}

/// Wire object for an instance listing: `{"services": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceInstances<T> {
    pub services: Vec<ServiceInstance<T>>,
}

impl<T> Default for ServiceInstances<T> {
    fn default() -> Self {
        Self {
            services: Vec::new(),
        }
    }
}
