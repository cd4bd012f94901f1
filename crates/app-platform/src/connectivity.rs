//! Network connectivity monitoring
//!
//! Platform glue reports connectivity changes into a [`NetworkMonitor`];
//! consumers read the current state or subscribe to transitions.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Network connectivity state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NetworkState {
    /// Connected to network
    Online,

    /// Disconnected from network
    Offline,

    /// Network state unknown
    Unknown,
}

impl NetworkState {
    /// Whether this state counts as connected
    pub fn is_connected(&self) -> bool {
        matches!(self, NetworkState::Online)
    }
}

impl From<bool> for NetworkState {
    fn from(connected: bool) -> Self {
        if connected {
            NetworkState::Online
        } else {
            NetworkState::Offline
        }
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkState::Online => write!(f, "online"),
            NetworkState::Offline => write!(f, "offline"),
            NetworkState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Source of connectivity information
///
/// Dropping the receiver returned by [`ConnectivityMonitor::subscribe`]
/// unsubscribes.
pub trait ConnectivityMonitor: Send + Sync {
    /// Current best-known state
    fn state(&self) -> NetworkState;

    /// Subscribe to state transitions
    fn subscribe(&self) -> broadcast::Receiver<NetworkState>;

    /// Whether the device is currently believed to be connected
    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }
}

/// In-process connectivity monitor fed by platform callbacks
pub struct NetworkMonitor {
    state: RwLock<NetworkState>,
    change_tx: broadcast::Sender<NetworkState>,
}

impl NetworkMonitor {
    /// Create a monitor in the [`NetworkState::Unknown`] state
    pub fn new() -> Self {
        Self::with_state(NetworkState::Unknown)
    }

    /// Create a monitor with a known initial state
    pub fn with_state(state: NetworkState) -> Self {
        let (change_tx, _change_rx) = broadcast::channel(16);
        Self { state: RwLock::new(state), change_tx }
    }

    /// Record a new state
    ///
    /// Subscribers are only notified when the state actually changes.
    /// Returns whether it changed.
    pub fn set_state(&self, state: NetworkState) -> bool {
        let mut current = self.state.write();
        if *current == state {
            return false;
        }

        tracing::debug!(from = %*current, to = %state, "Network state changed");
        *current = state;
        drop(current);

        let _ = self.change_tx.send(state);
        true
    }

    /// Record a platform "is connected" callback
    pub fn set_connected(&self, connected: bool) -> bool {
        self.set_state(NetworkState::from(connected))
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor for NetworkMonitor {
    fn state(&self) -> NetworkState {
        *self.state.read()
    }

    fn subscribe(&self) -> broadcast::Receiver<NetworkState> {
        self.change_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_unknown() {
        let monitor = NetworkMonitor::new();
        assert_eq!(monitor.state(), NetworkState::Unknown);
        assert!(!monitor.is_connected());
    }

    #[test]
    fn test_set_state() {
        let monitor = NetworkMonitor::new();

        assert!(monitor.set_state(NetworkState::Online));
        assert!(monitor.is_connected());

        assert!(monitor.set_connected(false));
        assert_eq!(monitor.state(), NetworkState::Offline);
    }

    #[test]
    fn test_same_state_is_not_a_change() {
        let monitor = NetworkMonitor::with_state(NetworkState::Online);
        assert!(!monitor.set_state(NetworkState::Online));
        assert!(!monitor.set_connected(true));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions_only() {
        let monitor = NetworkMonitor::with_state(NetworkState::Offline);
        let mut rx = monitor.subscribe();

        monitor.set_connected(false);
        monitor.set_connected(true);
        monitor.set_connected(true);
        monitor.set_connected(false);

        assert_eq!(rx.recv().await.unwrap(), NetworkState::Online);
        assert_eq!(rx.recv().await.unwrap(), NetworkState::Offline);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_does_not_block_updates() {
        let monitor = NetworkMonitor::new();
        drop(monitor.subscribe());

        assert!(monitor.set_state(NetworkState::Online));
        assert_eq!(monitor.state(), NetworkState::Online);
    }

    #[test]
    fn test_network_state_display() {
        assert_eq!(NetworkState::Online.to_string(), "online");
        assert_eq!(NetworkState::Offline.to_string(), "offline");
        assert_eq!(NetworkState::Unknown.to_string(), "unknown");
    }
}
