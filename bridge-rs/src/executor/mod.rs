//! Invocation executor
//!
//! Serializes every remote call through one invocation lock, runs the
//! pipeline on the session's connection and classifies the outcome.
//!
//! # Outcome classification
//! - no errors reported → success
//! - errors reported with at least one record → recoverable: the advisory
//!   messages are logged and audited, the records are returned
//! - errors reported with no records → `RemoteExecutionFailed`
//!
//! The lock is a FIFO mutex, so invocations run in the order they acquired
//! it and never overlap on the session. If a caller is cancelled while its
//! pipeline is in flight, the connection is abandoned: the remote side may
//! still be running it, so the next invocation reconnects.

pub mod audit;

use crate::command::{ExtraParameters, OutOfBandValue, Pipeline};
use crate::error::{BridgeError, Result};
use crate::remote::{ConnectionHandle, RecordRef, RemoteOutput};
use crate::secret::REDACTED;
use crate::session::SessionManager;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

pub use audit::{AuditSink, InvocationFinished, InvocationOutcome, InvocationStarted, TracingAuditSink};

/// Time allowed for closing a retired connection
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Records returned by a successful invocation
struct Completed {
    records: Vec<RecordRef>,
    advisories: Vec<String>,
}

/// Abandons the connection unless the call it guards completes
struct InFlight<'a> {
    session: &'a SessionManager,
    connection: Option<ConnectionHandle>,
}

impl<'a> InFlight<'a> {
    fn new(session: &'a SessionManager, connection: &ConnectionHandle) -> Self {
        Self {
            session,
            connection: Some(connection.clone()),
        }
    }

    fn complete(mut self) {
        self.connection = None;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            warn!(
                "Invocation cancelled while running on connection {}, abandoning it",
                connection.id()
            );
            self.session.abandon(&connection);
        }
    }
}

/// Runs compiled pipelines against the session, one at a time
pub struct InvocationExecutor {
    session: Arc<SessionManager>,
    invocation_lock: Mutex<()>,
    execution_timeout: Duration,
    audit: Arc<dyn AuditSink>,
}

impl InvocationExecutor {
    pub fn new(session: Arc<SessionManager>, execution_timeout: Duration) -> Self {
        Self {
            session,
            invocation_lock: Mutex::new(()),
            execution_timeout,
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Replace the default tracing audit sink
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Run a pipeline and return its raw records
    ///
    /// `extra` values are bound to the final stage without passing through
    /// the command compiler.
    ///
    /// # Errors
    /// - `Unauthenticated` when no credential has been supplied
    /// - `ConnectionFailed` when the handshake fails, the transport fails,
    ///   or the call times out; the session is left closed
    /// - `RemoteExecutionFailed` when errors were reported with no records
    pub async fn invoke(&self, pipeline: &Pipeline, extra: &ExtraParameters) -> Result<Vec<RecordRef>> {
        if pipeline.is_empty() {
            debug!("Empty pipeline, nothing to run");
            return Ok(Vec::new());
        }

        let id = Uuid::new_v4();
        let command = pipeline.describe(extra);

        let queued_at = Instant::now();
        let _guard = self.invocation_lock.lock().await;
        let started = Instant::now();

        self.audit.invocation_started(&InvocationStarted {
            id,
            command: command.clone(),
            started_at: Utc::now(),
            queued: started.duration_since(queued_at),
        });

        let result = self.run(pipeline, extra).await;

        let outcome = match &result {
            Ok(completed) if completed.advisories.is_empty() => InvocationOutcome::Succeeded {
                records: completed.records.len(),
            },
            Ok(completed) => InvocationOutcome::SucceededWithAdvisories {
                records: completed.records.len(),
                messages: completed.advisories.clone(),
            },
            Err(e) => InvocationOutcome::Failed {
                error: e.to_string(),
            },
        };
        self.audit.invocation_finished(&InvocationFinished {
            id,
            command,
            outcome,
            duration: started.elapsed(),
        });

        result.map(|completed| completed.records)
    }

    /// Close every connection, waiting for the running invocation first
    pub async fn shutdown(&self) {
        let _guard = self.invocation_lock.lock().await;
        for connection in self.session.retire_all().await {
            close_quietly(connection).await;
        }
    }

    /// Body of an invocation; the invocation lock is held
    async fn run(&self, pipeline: &Pipeline, extra: &ExtraParameters) -> Result<Completed> {
        for connection in self.session.take_retired().await {
            close_quietly(connection).await;
        }

        let connection = self.session.ensure_open().await?;

        let in_flight = InFlight::new(&self.session, &connection);
        let result = timeout(self.execution_timeout, connection.execute(pipeline, extra)).await;
        in_flight.complete();

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                if e.is_retryable() {
                    self.session.invalidate(&connection).await;
                }
                return Err(e);
            }
            Err(_) => {
                self.session.invalidate(&connection).await;
                return Err(BridgeError::connection(format!(
                    "remote command timed out after {:?}",
                    self.execution_timeout
                )));
            }
        };

        classify(output, extra)
    }
}

/// Close a retired connection, logging failures
async fn close_quietly(connection: ConnectionHandle) {
    match timeout(CLOSE_TIMEOUT, connection.close()).await {
        Ok(Ok(())) => debug!("Closed connection {}", connection.id()),
        Ok(Err(e)) => warn!("Failed to close connection {}: {}", connection.id(), e),
        Err(_) => warn!("Timed out closing connection {}", connection.id()),
    }
}

fn classify(output: RemoteOutput, extra: &ExtraParameters) -> Result<Completed> {
    let messages = redact(output.errors, extra);

    if messages.is_empty() {
        return Ok(Completed {
            records: output.records,
            advisories: Vec::new(),
        });
    }

    if output.records.is_empty() {
        return Err(BridgeError::RemoteExecutionFailed { messages });
    }

    warn!(
        "Remote command returned {} record(s) with {} advisory error(s)",
        output.records.len(),
        messages.len()
    );
    Ok(Completed {
        records: output.records,
        advisories: messages,
    })
}

/// Scrub out-of-band secrets the endpoint may have echoed into messages
fn redact(messages: Vec<String>, extra: &ExtraParameters) -> Vec<String> {
    let secrets: Vec<&str> = extra
        .iter()
        .filter_map(|(_, value)| match value {
            OutOfBandValue::Secret(secret) if !secret.is_empty() => Some(secret.expose()),
            _ => None,
        })
        .collect();

    if secrets.is_empty() {
        return messages;
    }

    messages
        .into_iter()
        .map(|message| {
            secrets
                .iter()
                .fold(message, |message, secret| message.replace(secret, REDACTED))
        })
        .collect()
}
