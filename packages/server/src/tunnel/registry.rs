//! In-memory registry of live agent connections.
//!
//! Owned by the process entry point and injected into the tunnel server and
//! the delivery workers. Lookups take the read lock (the worker hot path);
//! register/unregister take the write lock, held only to mutate the map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common::tunnel::ServerMessage;
use tokio::sync::{mpsc, RwLock};

/// Why a push into the connection's outbound channel was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The bounded channel is full: the agent is a slow consumer and the
    /// attempt counts as failed.
    Saturated,
    /// The connection's writer task has gone away.
    Closed,
}

/// Reasons recorded when a tunnel session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// A newer connection for the same subscriber took over.
    Displaced,
    /// No pong within the heartbeat grace period.
    HeartbeatTimeout,
    /// The agent closed the socket or the stream ended.
    Disconnected,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Displaced => "displaced",
            CloseReason::HeartbeatTimeout => "heartbeat_timeout",
            CloseReason::Disconnected => "disconnected",
        }
    }
}

/// Handle to one live agent connection.
pub struct AgentHandle {
    pub connection_id: String,
    pub subscriber_id: String,
    pub connected_at: DateTime<Utc>,
    outbound: mpsc::Sender<ServerMessage>,
    close: mpsc::Sender<(u16, &'static str)>,
    started: Instant,
    last_pong_ms: AtomicU64,
}

impl AgentHandle {
    /// Build a handle plus the receiving halves consumed by the socket
    /// tasks. `capacity` bounds the outbound signal channel.
    pub fn new(
        connection_id: String,
        subscriber_id: String,
        capacity: usize,
    ) -> (
        Arc<Self>,
        mpsc::Receiver<ServerMessage>,
        mpsc::Receiver<(u16, &'static str)>,
    ) {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (close_tx, close_rx) = mpsc::channel(1);
        let handle = Arc::new(Self {
            connection_id,
            subscriber_id,
            connected_at: Utc::now(),
            outbound: outbound_tx,
            close: close_tx,
            started: Instant::now(),
            last_pong_ms: AtomicU64::new(0),
        });
        (handle, outbound_rx, close_rx)
    }

    /// Non-blocking enqueue onto the connection's outbound channel.
    pub fn try_push(&self, message: ServerMessage) -> Result<(), PushError> {
        self.outbound.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::Saturated,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Ask the writer task to close the socket with the given code. Safe to
    /// call more than once; later calls are ignored.
    pub fn close(&self, code: u16, reason: &'static str) {
        let _ = self.close.try_send((code, reason));
    }

    /// Record a heartbeat response.
    pub fn note_pong(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last_pong_ms.store(elapsed, Ordering::Relaxed);
    }

    /// Time since the last pong (or since connect, before the first pong).
    pub fn pong_age(&self) -> Duration {
        let elapsed = self.started.elapsed().as_millis() as u64;
        let last = self.last_pong_ms.load(Ordering::Relaxed);
        Duration::from_millis(elapsed.saturating_sub(last))
    }
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<AgentHandle>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, returning the one it displaced, if any.
    pub async fn register(&self, handle: Arc<AgentHandle>) -> Option<Arc<AgentHandle>> {
        self.agents
            .write()
            .await
            .insert(handle.subscriber_id.clone(), handle)
    }

    /// Remove the entry only if it still belongs to `connection_id`, so a
    /// tearing-down connection never clobbers its replacement.
    pub async fn remove_if(&self, subscriber_id: &str, connection_id: &str) -> bool {
        let mut agents = self.agents.write().await;
        match agents.get(subscriber_id) {
            Some(current) if current.connection_id == connection_id => {
                agents.remove(subscriber_id);
                true
            }
            _ => false,
        }
    }

    /// O(1) lookup of the live connection for a subscriber.
    pub async fn get(&self, subscriber_id: &str) -> Option<Arc<AgentHandle>> {
        self.agents.read().await.get(subscriber_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ServerMessage {
        ServerMessage::Ping
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = AgentRegistry::new();
        let (handle, _rx, _close) = AgentHandle::new("conn_a".into(), "sub_1".into(), 4);

        assert!(registry.register(handle).await.is_none());
        let found = registry.get("sub_1").await.expect("registered");
        assert_eq!(found.connection_id, "conn_a");
        assert!(registry.get("sub_2").await.is_none());
    }

    #[tokio::test]
    async fn test_register_returns_displaced_connection() {
        let registry = AgentRegistry::new();
        let (a, _rx_a, _close_a) = AgentHandle::new("conn_a".into(), "sub_1".into(), 4);
        let (b, _rx_b, _close_b) = AgentHandle::new("conn_b".into(), "sub_1".into(), 4);

        registry.register(a).await;
        let displaced = registry.register(b).await.expect("a was displaced");
        assert_eq!(displaced.connection_id, "conn_a");
        assert_eq!(registry.get("sub_1").await.unwrap().connection_id, "conn_b");
    }

    #[tokio::test]
    async fn test_remove_if_skips_replaced_entry() {
        let registry = AgentRegistry::new();
        let (a, _rx_a, _close_a) = AgentHandle::new("conn_a".into(), "sub_1".into(), 4);
        let (b, _rx_b, _close_b) = AgentHandle::new("conn_b".into(), "sub_1".into(), 4);

        registry.register(a).await;
        registry.register(b).await;

        // The old connection tearing down must not evict its replacement.
        assert!(!registry.remove_if("sub_1", "conn_a").await);
        assert!(registry.get("sub_1").await.is_some());

        assert!(registry.remove_if("sub_1", "conn_b").await);
        assert!(registry.get("sub_1").await.is_none());
    }

    #[tokio::test]
    async fn test_try_push_saturates_at_capacity() {
        let (handle, _rx, _close) = AgentHandle::new("conn_a".into(), "sub_1".into(), 2);

        assert!(handle.try_push(frame()).is_ok());
        assert!(handle.try_push(frame()).is_ok());
        assert_eq!(handle.try_push(frame()), Err(PushError::Saturated));
    }

    #[tokio::test]
    async fn test_try_push_after_receiver_dropped() {
        let (handle, rx, _close) = AgentHandle::new("conn_a".into(), "sub_1".into(), 2);
        drop(rx);
        assert_eq!(handle.try_push(frame()), Err(PushError::Closed));
    }

    #[tokio::test]
    async fn test_pong_age_resets_on_pong() {
        let (handle, _rx, _close) = AgentHandle::new("conn_a".into(), "sub_1".into(), 2);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(handle.pong_age() >= Duration::from_millis(20));
        handle.note_pong();
        assert!(handle.pong_age() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (handle, _rx, mut close_rx) = AgentHandle::new("conn_a".into(), "sub_1".into(), 2);
        handle.close(1011, "heartbeat timeout");
        handle.close(1011, "heartbeat timeout");
        assert_eq!(close_rx.recv().await, Some((1011, "heartbeat timeout")));
    }
}
