//! Invocation audit hook
//!
//! The executor reports every remote call to an [`AuditSink`]: once when
//! the call starts running and once when it completes. Retention and
//! presentation are up to the sink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// A remote call has acquired the invocation lock and is about to run
#[derive(Debug, Clone, Serialize)]
pub struct InvocationStarted {
    pub id: Uuid,
    /// Rendered command line; out-of-band values appear as `<redacted>`
    pub command: String,
    pub started_at: DateTime<Utc>,
    /// Time spent waiting for earlier invocations
    pub queued: Duration,
}

/// How a remote call ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    Succeeded { records: usize },
    /// Records were returned together with advisory errors
    SucceededWithAdvisories { records: usize, messages: Vec<String> },
    Failed { error: String },
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// A remote call has completed
#[derive(Debug, Clone, Serialize)]
pub struct InvocationFinished {
    pub id: Uuid,
    pub command: String,
    pub outcome: InvocationOutcome,
    /// Time from acquiring the lock to completion
    pub duration: Duration,
}

/// Receives pre/post invocation events
pub trait AuditSink: Send + Sync {
    fn invocation_started(&self, event: &InvocationStarted);

    fn invocation_finished(&self, event: &InvocationFinished);
}

/// Audit sink that writes structured `tracing` events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn invocation_started(&self, event: &InvocationStarted) {
        info!(
            invocation = %event.id,
            queued_ms = event.queued.as_millis() as u64,
            "Running remote command: {}",
            event.command
        );
    }

    fn invocation_finished(&self, event: &InvocationFinished) {
        let duration_ms = event.duration.as_millis() as u64;
        match &event.outcome {
            InvocationOutcome::Succeeded { records } => info!(
                invocation = %event.id,
                duration_ms,
                records,
                "Remote command succeeded"
            ),
            InvocationOutcome::SucceededWithAdvisories { records, messages } => warn!(
                invocation = %event.id,
                duration_ms,
                records,
                "Remote command succeeded with {} advisory error(s): {}",
                messages.len(),
                messages.join("; ")
            ),
            InvocationOutcome::Failed { error } => warn!(
                invocation = %event.id,
                duration_ms,
                "Remote command failed: {}",
                error
            ),
        }
    }
}
