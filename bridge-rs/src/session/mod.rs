//! Session management
//!
//! Owns the single authenticated connection to the management endpoint.
//!
//! # Lifecycle
//! ```text
//!  ┌────────────────┐ set_credential ┌────────────┐ ensure_open ┌──────┐
//!  │ unauthenticated│ ─────────────→ │   closed   │ ──────────→ │ open │
//!  └────────────────┘                └────────────┘ ←────────── └──────┘
//!                                        ↑  set_credential / set_target /
//!                                        └─ invalidate (transport failure)
//! ```
//!
//! The connection slot is only mutated while the re-initialization lock
//! (`state`) is held, so concurrent `ensure_open` callers converge on one
//! handshake. A connection that is replaced is moved to a retired list
//! instead of being closed on the spot; the invocation executor closes it
//! once no invocation can still be using it.
//!
//! A connection whose invocation was cancelled mid-flight is
//! [`abandon`](SessionManager::abandon)ed from a synchronous drop path and
//! discarded the next time the slot is examined, so the endpoint never sees
//! a second pipeline while the first may still be running.

pub mod types;

use crate::error::{BridgeError, Result};
use crate::remote::{ConnectionHandle, RemoteConnector};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub use types::{AuthMechanism, Credential, Target};

/// State guarded by the re-initialization lock
struct SessionState {
    target: Target,
    credential: Option<Credential>,
    connection: Option<ConnectionHandle>,
    retired: Vec<ConnectionHandle>,
    generation: u64,
}

impl SessionState {
    /// Move the live connection (if any) to the retired list
    fn retire(&mut self, reason: &str) {
        if let Some(connection) = self.connection.take() {
            debug!("Retiring connection {}: {}", connection.id(), reason);
            self.retired.push(connection);
        }
        self.generation += 1;
    }
}

/// The one session to the management endpoint
///
/// Mutated in place, so every holder of an `Arc<SessionManager>` observes
/// credential changes and reconnections.
pub struct SessionManager {
    connector: Arc<dyn RemoteConnector>,
    state: Mutex<SessionState>,
    /// Ids of connections abandoned mid-call; read under `state`
    abandoned: StdMutex<Vec<String>>,
    open_timeout: Duration,
}

impl SessionManager {
    /// Create an unauthenticated session; nothing is opened until first use
    pub fn new(connector: Arc<dyn RemoteConnector>, target: Target, open_timeout: Duration) -> Self {
        Self {
            connector,
            state: Mutex::new(SessionState {
                target,
                credential: None,
                connection: None,
                retired: Vec::new(),
                generation: 0,
            }),
            abandoned: StdMutex::new(Vec::new()),
            open_timeout,
        }
    }

    /// Replace the credential and drop the current connection
    ///
    /// The next [`ensure_open`](Self::ensure_open) performs a fresh handshake.
    pub async fn set_credential(&self, credential: Credential) {
        let mut state = self.state.lock().await;
        info!(
            "Credential updated for {}",
            credential.username().unwrap_or("token principal")
        );
        state.credential = Some(credential);
        state.retire("credential changed");
    }

    /// Forget the credential, e.g. on sign-out
    pub async fn clear_credential(&self) {
        let mut state = self.state.lock().await;
        state.credential = None;
        state.retire("credential cleared");
    }

    /// Point the session at another management target
    pub async fn set_target(&self, target: Target) {
        let mut state = self.state.lock().await;
        info!("Management target set to {}", target);
        state.target = target;
        state.retire("target changed");
    }

    /// Return the open connection, performing the handshake if needed
    ///
    /// # Errors
    /// - `Unauthenticated` if no credential has been supplied
    /// - `ConnectionFailed` if the handshake fails or times out; the session
    ///   stays closed so the next call retries
    pub async fn ensure_open(&self) -> Result<ConnectionHandle> {
        let mut state = self.state.lock().await;
        self.discard_abandoned(&mut state);

        if let Some(connection) = &state.connection {
            return Ok(connection.clone());
        }

        let credential = state.credential.as_ref().ok_or(BridgeError::Unauthenticated)?;

        debug!("Opening connection to {}", state.target);
        let connection = match timeout(
            self.open_timeout,
            self.connector.connect(&state.target, credential),
        )
        .await
        {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                warn!("Handshake with {} failed: {}", state.target, e);
                return Err(e);
            }
            Err(_) => {
                warn!("Handshake with {} timed out", state.target);
                return Err(BridgeError::connection(format!(
                    "handshake timed out after {:?}",
                    self.open_timeout
                )));
            }
        };

        info!("Connection {} opened to {}", connection.id(), state.target);
        state.connection = Some(connection.clone());
        Ok(connection)
    }

    /// Drop `connection` if it is still the live one
    ///
    /// Used after a transport failure so the next call reconnects.
    pub async fn invalidate(&self, connection: &ConnectionHandle) {
        let mut state = self.state.lock().await;
        let is_live = state
            .connection
            .as_ref()
            .is_some_and(|live| live.id() == connection.id());
        if is_live {
            state.retire("transport failure");
        }
    }

    /// Mark `connection` unusable without waiting for the session lock
    ///
    /// For drop paths, where nothing can be awaited. The connection is
    /// retired the next time the session is examined.
    pub fn abandon(&self, connection: &ConnectionHandle) {
        self.abandoned
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(connection.id().to_string());
    }

    fn discard_abandoned(&self, state: &mut SessionState) {
        let abandoned = std::mem::take(
            &mut *self
                .abandoned
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        let is_abandoned = state
            .connection
            .as_ref()
            .is_some_and(|live| abandoned.iter().any(|id| id == live.id()));
        if is_abandoned {
            state.retire("invocation abandoned");
        }
    }

    /// Take the connections waiting to be closed
    pub async fn take_retired(&self) -> Vec<ConnectionHandle> {
        let mut state = self.state.lock().await;
        self.discard_abandoned(&mut state);
        std::mem::take(&mut state.retired)
    }

    /// Retire the live connection and return everything left to close
    pub async fn retire_all(&self) -> Vec<ConnectionHandle> {
        let mut state = self.state.lock().await;
        state.retire("shutdown");
        std::mem::take(&mut state.retired)
    }

    pub async fn is_open(&self) -> bool {
        let mut state = self.state.lock().await;
        self.discard_abandoned(&mut state);
        state.connection.is_some()
    }

    /// Whether a credential is held (not whether it has been accepted)
    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.credential.is_some()
    }

    pub async fn target(&self) -> Target {
        self.state.lock().await.target.clone()
    }

    /// Number of times the connection slot has been reset
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }
}
