//! Connectivity state machine.
//!
//! Tracks the lifecycle of a logical connection and gates use of the frame
//! pipeline:
//!
//! ```text
//!            dial              handshake ok
//!   Idle ───────────► Connecting ───────────► Ready
//!                      │    ▲                  │
//!          dial failed │    │ reconnect        │ I/O error
//!                      ▼    │                  │
//!                  TransientFailure ◄──────────┘
//!
//!   any state ── close ──► Shutdown (terminal)
//! ```
//!
//! The state lives in a `tokio::sync::watch` channel: any number of
//! observers can read it or wait for changes, only the tracker writes it.

use std::fmt;

use tokio::sync::watch;

use crate::error::{Result, WireError};

/// Lifecycle phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityState {
    /// No socket resources held.
    Idle,
    /// Dial/handshake in progress.
    Connecting,
    /// Usable for sending and receiving frames.
    Ready,
    /// Socket lost; expected to recover.
    TransientFailure,
    /// Closed; no further transitions.
    Shutdown,
}

impl ConnectivityState {
    /// Whether `self → to` is a legal transition.
    pub fn can_transition_to(self, to: ConnectivityState) -> bool {
        use ConnectivityState::*;
        matches!(
            (self, to),
            (Idle, Connecting)
                | (Connecting, Ready)
                | (Connecting, TransientFailure)
                | (Ready, TransientFailure)
                | (TransientFailure, Connecting)
                | (Idle | Connecting | Ready | TransientFailure, Shutdown)
        )
    }

    /// Whether this is the terminal state.
    pub fn is_terminal(self) -> bool {
        self == ConnectivityState::Shutdown
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectivityState::Idle => "IDLE",
            ConnectivityState::Connecting => "CONNECTING",
            ConnectivityState::Ready => "READY",
            ConnectivityState::TransientFailure => "TRANSIENT_FAILURE",
            ConnectivityState::Shutdown => "SHUTDOWN",
        };
        f.write_str(s)
    }
}

/// Owner of a connection's state.
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<ConnectivityState>,
}

impl StateTracker {
    /// Create a tracker in `Idle`.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState::Idle);
        Self { tx }
    }

    /// Current state.
    pub fn state(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }

    /// Move to `to`, failing if the transition is not allowed.
    ///
    /// Returns the previous state.
    pub fn transition(&self, to: ConnectivityState) -> Result<ConnectivityState> {
        let mut result = Ok(to);
        self.tx.send_if_modified(|current| {
            let from = *current;
            if !from.can_transition_to(to) {
                result = Err(WireError::InvalidTransition { from, to });
                return false;
            }
            result = Ok(from);
            *current = to;
            true
        });
        if let Ok(from) = result {
            tracing::debug!(%from, %to, "connectivity state changed");
        }
        result
    }

    /// Move `Ready → TransientFailure`. No-op in any other state.
    ///
    /// Returns whether the state changed.
    pub fn mark_failure(&self) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current != ConnectivityState::Ready {
                return false;
            }
            *current = ConnectivityState::TransientFailure;
            true
        });
        if changed {
            tracing::debug!(
                from = %ConnectivityState::Ready,
                to = %ConnectivityState::TransientFailure,
                "connectivity state changed"
            );
        }
        changed
    }

    /// Move to `Shutdown`. Idempotent.
    ///
    /// Returns whether this call performed the shutdown.
    pub fn shutdown(&self) -> bool {
        let mut previous = ConnectivityState::Shutdown;
        let changed = self.tx.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            previous = *current;
            *current = ConnectivityState::Shutdown;
            true
        });
        if changed {
            tracing::debug!(from = %previous, to = %ConnectivityState::Shutdown, "connectivity state changed");
        }
        changed
    }

    /// Fail unless the connection is `Ready`.
    pub fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ConnectivityState::Ready => Ok(()),
            ConnectivityState::Shutdown => Err(WireError::ConnectionClosing),
            other => Err(WireError::NotReady(other)),
        }
    }

    /// Wait until the state differs from `from`, returning the new state.
    ///
    /// Returns immediately if it already differs.
    pub async fn wait_for_state_change(&self, from: ConnectivityState) -> ConnectivityState {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let state = match rx.wait_for(|s| *s != from).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
