pub mod backend;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod retry;

pub use codec::DiscoveryContext;
pub use error::DiscoveryError;
pub use model::{ServiceInstance, ServiceType};
pub use registry::ServiceDiscovery;
