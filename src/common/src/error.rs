use thiserror::Error;

/// Errors surfaced by the discovery registry and payload codec.
///
/// The gateway maps each variant to an HTTP status class; `kind()` is the
/// stable string that goes on the wire, so backend-internal detail stays out
/// of response bodies.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Malformed identity (empty name/id/address, path separator in a name)
    /// or a body that does not match the request path.
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    /// Unregistration of an instance that is not registered.
    #[error("instance '{instance_id}' not found for service '{service_name}'")]
    NotFound {
        service_name: String,
        instance_id: String,
    },

    /// Payload bytes that do not decode to the configured payload type.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// Coordination store unreachable or the call timed out. Transient;
    /// retryable by the caller.
    #[error("coordination backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl DiscoveryError {
    /// Stable error kind for wire responses.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryError::InvalidInstance(_) => "INVALID_INSTANCE",
            DiscoveryError::NotFound { .. } => "NOT_FOUND",
            DiscoveryError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            DiscoveryError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
        }
    }

    /// True for errors the caller may retry (backend-caused, transient).
    pub fn is_retryable(&self) -> bool {
        matches!(self, DiscoveryError::BackendUnavailable(_))
    }
}
