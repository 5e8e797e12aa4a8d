use std::marker::PhantomData;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::DiscoveryError;
use crate::model::{ServiceInstance, ServiceInstances, ServiceNames};

/// Per-deployment binding of a payload type to its JSON codec and to the
/// cache refresh timing.
///
/// Built once at startup and cloned into the registry and gateway; immutable
/// after construction. The registry core never inspects payload bytes beyond
/// what these codec calls do.
pub struct DiscoveryContext<T> {
    max_staleness: Duration,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for DiscoveryContext<T> {
    fn clone(&self) -> Self {
        Self {
            max_staleness: self.max_staleness,
            _payload: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for DiscoveryContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryContext")
            .field("max_staleness", &self.max_staleness)
            .finish()
    }
}

impl<T> DiscoveryContext<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(max_staleness: Duration) -> Self {
        Self {
            max_staleness,
            _payload: PhantomData,
        }
    }

    /// Maximum age a cached instance list may reach before a backend fetch
    /// is forced.
    pub fn max_staleness(&self) -> Duration {
        self.max_staleness
    }

    pub fn encode_instance(
        &self,
        instance: &ServiceInstance<T>,
    ) -> Result<Vec<u8>, DiscoveryError> {
        Ok(serde_json::to_vec(instance)?)
    }

    pub fn decode_instance(&self, bytes: &[u8]) -> Result<ServiceInstance<T>, DiscoveryError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn encode_instance_list(
        &self,
        list: &ServiceInstances<T>,
    ) -> Result<Vec<u8>, DiscoveryError> {
        Ok(serde_json::to_vec(list)?)
    }

    pub fn decode_instance_list(
        &self,
        bytes: &[u8],
    ) -> Result<ServiceInstances<T>, DiscoveryError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn encode_name_list(&self, names: &ServiceNames) -> Result<Vec<u8>, DiscoveryError> {
        Ok(serde_json::to_vec(names)?)
    }

    pub fn decode_name_list(&self, bytes: &[u8]) -> Result<ServiceNames, DiscoveryError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceType;

    fn context() -> DiscoveryContext<String> {
        DiscoveryContext::new(Duration::from_secs(1))
    }

    fn instance(id: &str) -> ServiceInstance<String> {
        ServiceInstance {
            service_name: "web".to_string(),
            instance_id: id.to_string(),
            address: "10.0.0.5".to_string(),
            port: 8080,
            service_type: ServiceType::Dynamic,
            registration_time_millis: 1_700_000_000_000,
            payload: "From Test".to_string(),
        }
    }

    #[test]
    fn test_instance_round_trip() {
        let ctx = context();
        let original = instance("i-1");
        let bytes = ctx.encode_instance(&original).unwrap();
        let decoded = ctx.decode_instance(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_instance_list_round_trip() {
        let ctx = context();
        let list = ServiceInstances {
            services: vec![instance("i-1"), instance("i-2")],
        };
        let bytes = ctx.encode_instance_list(&list).unwrap();
        assert_eq!(ctx.decode_instance_list(&bytes).unwrap(), list);

        // The empty list is a valid wire value, not an error
        let empty = ServiceInstances::<String>::default();
        let bytes = ctx.encode_instance_list(&empty).unwrap();
        assert_eq!(ctx.decode_instance_list(&bytes).unwrap(), empty);
    }

    #[test]
    fn test_name_list_round_trip() {
        let ctx = context();
        let names = ServiceNames {
            names: vec!["a".to_string(), "b".to_string()],
        };
        let bytes = ctx.encode_name_list(&names).unwrap();
        assert_eq!(ctx.decode_name_list(&bytes).unwrap(), names);

        let empty = ServiceNames::default();
        let bytes = ctx.encode_name_list(&empty).unwrap();
        assert_eq!(ctx.decode_name_list(&bytes).unwrap(), empty);
    }

    #[test]
    fn test_malformed_bytes_fail_decode() {
        let ctx = context();
        let err = ctx.decode_instance(b"{not json").unwrap_err();
        assert_eq!(err.kind(), "MALFORMED_PAYLOAD");
    }

    #[test]
    fn test_type_mismatched_payload_fails_decode() {
        // A context typed for struct-shaped payloads must reject a string payload
        #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq, Clone)]
        struct Meta {
            weight: u32,
        }

        let string_ctx = context();
        let typed_ctx: DiscoveryContext<Meta> = DiscoveryContext::new(Duration::from_secs(1));

        let bytes = string_ctx.encode_instance(&instance("i-1")).unwrap();
        let err = typed_ctx.decode_instance(&bytes).unwrap_err();
        assert_eq!(err.kind(), "MALFORMED_PAYLOAD");
    }
}
