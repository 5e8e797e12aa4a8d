//! Coordination store interface consumed by the discovery registry.
//!
//! Any tree-structured, strongly consistent, watchable key-value store
//! satisfies this contract; [`memory::MemoryBackend`] ships for standalone
//! and test use.

pub mod memory;

pub use memory::MemoryBackend;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Fired into a watch channel when a watched path or one of its direct
/// children changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// The watched path the event applies to.
    pub path: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no node at '{0}'")]
    NoNode(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Contract with the coordination store.
///
/// The store provides per-path atomicity; the registry serializes nothing
/// itself. All operations are subject to the registry's per-call timeout.
#[async_trait]
pub trait CoordinationBackend: Send + Sync {
    /// Write `data` at `path`, replacing any prior record entirely.
    /// Ephemeral nodes are removed by the store when the owning session ends.
    async fn create_or_update(
        &self,
        path: &str,
        data: Vec<u8>,
        ephemeral: bool,
    ) -> Result<(), BackendError>;

    /// Remove the node at `path`. `NoNode` when absent.
    async fn delete(&self, path: &str) -> Result<(), BackendError>;

    /// Direct child names of `path`, in stable sorted order. A missing path
    /// yields an empty list, not an error.
    async fn get_children(&self, path: &str) -> Result<Vec<String>, BackendError>;

    /// Data stored at `path`. `NoNode` when absent.
    async fn get_data(&self, path: &str) -> Result<Vec<u8>, BackendError>;

    /// Install a persistent watch on `path`. Events arrive asynchronously on
    /// `events` whenever the node or a direct child changes; delivery stops
    /// when the receiver is dropped.
    async fn watch(
        &self,
        path: &str,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<(), BackendError>;
}
