use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{BackendError, CoordinationBackend, WatchEvent};

struct Node {
    data: Vec<u8>,
    /// Session that owns this node when it was created ephemeral.
    owner_session: Option<u64>,
}

struct State {
    nodes: BTreeMap<String, Node>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<WatchEvent>>>,
    next_session: u64,
    available: bool,
}

/// In-process coordination backend.
///
/// Stores the tree as a flat sorted path map, so child listings are stable
/// and a service with zero instances simply has no entries. Each handle
/// carries a session id; ephemeral nodes created through a handle vanish when
/// that session is expired, which models the session/liveness mechanism of a
/// ZooKeeper-like store.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    session: u64,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                nodes: BTreeMap::new(),
                watchers: HashMap::new(),
                next_session: 2,
                available: true,
            })),
            session: 1,
        }
    }

    /// Derive a handle over the same tree with a fresh session, as a second
    /// client connection would have.
    pub fn new_session(&self) -> Self {
        let mut state = self.state.lock().expect("memory backend lock poisoned");
        let session = state.next_session;
        state.next_session += 1;
        Self {
            state: Arc::clone(&self.state),
            session,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session
    }

    /// Drop this handle's session: every ephemeral node it owns is removed
    /// and watchers are notified, exactly as on explicit deletion.
    pub fn expire_session(&self) {
        let mut state = self.state.lock().expect("memory backend lock poisoned");
        let expired: Vec<String> = state
            .nodes
            .iter()
            .filter(|(_, node)| node.owner_session == Some(self.session))
            .map(|(path, _)| path.clone())
            .collect();
        for path in expired {
            state.nodes.remove(&path);
            notify(&mut state, &path);
        }
    }

    /// Simulate a backend outage: while unavailable every call fails with
    /// `BackendError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        let mut state = self.state.lock().expect("memory backend lock poisoned");
        state.available = available;
    }

    fn lock_available(&self) -> Result<std::sync::MutexGuard<'_, State>, BackendError> {
        let state = self.state.lock().expect("memory backend lock poisoned");
        if !state.available {
            return Err(BackendError::Unavailable(
                "memory backend marked unavailable".to_string(),
            ));
        }
        Ok(state)
    }
}

fn parent(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some(("", _)) | None => None,
        Some((parent, _)) => Some(parent),
    }
}

/// Notify watchers of `path` and of its parent; closed receivers are pruned.
fn notify(state: &mut State, path: &str) {
    let mut targets = vec![path.to_string()];
    if let Some(parent) = parent(path) {
        targets.push(parent.to_string());
    }
    for target in targets {
        if let Some(senders) = state.watchers.get_mut(&target) {
            senders.retain(|tx| {
                tx.send(WatchEvent {
                    path: target.clone(),
                })
                .is_ok()
            });
            if senders.is_empty() {
                state.watchers.remove(&target);
            }
        }
    }
}

#[async_trait]
impl CoordinationBackend for MemoryBackend {
    async fn create_or_update(
        &self,
        path: &str,
        data: Vec<u8>,
        ephemeral: bool,
    ) -> Result<(), BackendError> {
        let mut state = self.lock_available()?;
        let owner_session = ephemeral.then_some(self.session);
        state.nodes.insert(
            path.to_string(),
            Node {
                data,
                owner_session,
            },
        );
        notify(&mut state, path);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), BackendError> {
        let mut state = self.lock_available()?;
        if state.nodes.remove(path).is_none() {
            return Err(BackendError::NoNode(path.to_string()));
        }
        notify(&mut state, path);
        Ok(())
    }

    async fn get_children(&self, path: &str) -> Result<Vec<String>, BackendError> {
        let state = self.lock_available()?;
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut children: Vec<String> = state
            .nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| {
                let rest = &key[prefix.len()..];
                rest.split('/').next().unwrap_or(rest).to_string()
            })
            .collect();
        children.dedup();
        Ok(children)
    }

    async fn get_data(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        let state = self.lock_available()?;
        state
            .nodes
            .get(path)
            .map(|node| node.data.clone())
            .ok_or_else(|| BackendError::NoNode(path.to_string()))
    }

    async fn watch(
        &self,
        path: &str,
        events: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<(), BackendError> {
        let mut state = self.lock_available()?;
        state
            .watchers
            .entry(path.to_string())
            .or_default()
            .push(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_delete() {
        let backend = MemoryBackend::new();
        backend
            .create_or_update("/d/web/i-1", b"a".to_vec(), false)
            .await
            .unwrap();

        assert_eq!(backend.get_data("/d/web/i-1").await.unwrap(), b"a");

        backend
            .create_or_update("/d/web/i-1", b"b".to_vec(), false)
            .await
            .unwrap();
        assert_eq!(backend.get_data("/d/web/i-1").await.unwrap(), b"b");

        backend.delete("/d/web/i-1").await.unwrap();
        assert!(matches!(
            backend.get_data("/d/web/i-1").await,
            Err(BackendError::NoNode(_))
        ));
        assert!(matches!(
            backend.delete("/d/web/i-1").await,
            Err(BackendError::NoNode(_))
        ));
    }

    #[tokio::test]
    async fn test_children_are_sorted_and_deduped() {
        let backend = MemoryBackend::new();
        backend
            .create_or_update("/d/web/i-2", b"".to_vec(), false)
            .await
            .unwrap();
        backend
            .create_or_update("/d/web/i-1", b"".to_vec(), false)
            .await
            .unwrap();
        backend
            .create_or_update("/d/api/i-9", b"".to_vec(), false)
            .await
            .unwrap();

        assert_eq!(backend.get_children("/d/web").await.unwrap(), ["i-1", "i-2"]);
        assert_eq!(backend.get_children("/d").await.unwrap(), ["api", "web"]);
        // Missing paths list as empty rather than erroring
        assert!(backend.get_children("/d/missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_session_expiry_removes_ephemeral_nodes_and_notifies() {
        let backend = MemoryBackend::new();
        let other = backend.new_session();
        assert_ne!(backend.session_id(), other.session_id());

        let (tx, mut rx) = mpsc::unbounded_channel();
        backend.watch("/d/web", tx).await.unwrap();

        other
            .create_or_update("/d/web/i-1", b"".to_vec(), true)
            .await
            .unwrap();
        backend
            .create_or_update("/d/web/i-2", b"".to_vec(), false)
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().path, "/d/web");
        assert_eq!(rx.recv().await.unwrap().path, "/d/web");

        other.expire_session();
        assert_eq!(rx.recv().await.unwrap().path, "/d/web");

        // Only the ephemeral node owned by the expired session is gone
        assert_eq!(backend.get_children("/d/web").await.unwrap(), ["i-2"]);
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails_every_call() {
        let backend = MemoryBackend::new();
        backend.set_available(false);

        assert!(matches!(
            backend.create_or_update("/d/x", b"".to_vec(), false).await,
            Err(BackendError::Unavailable(_))
        ));
        assert!(matches!(
            backend.get_children("/d").await,
            Err(BackendError::Unavailable(_))
        ));

        backend.set_available(true);
        backend
            .create_or_update("/d/x", b"".to_vec(), false)
            .await
            .unwrap();
    }
}
