//! Mock management endpoint for testing
//!
//! Serves per-command datasets, emulates a trailing `Select-Object`
//! projection and `-ResultSize`, and lets tests script advisory or fatal
//! errors, failing handshakes and latency. Every executed pipeline is
//! journaled so tests can check ordering and what was sent.

use super::wire::WireRecord;
use super::{ConnectionHandle, RecordRef, RemoteConnection, RemoteConnector, RemoteOutput};
use crate::command::{CoercedValue, ExtraParameters, Pipeline};
use crate::error::{BridgeError, Result};
use crate::session::{Credential, Target};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// One executed pipeline
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub connection_id: String,
    pub pipeline: Pipeline,
    pub extra: ExtraParameters,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Default)]
struct MockState {
    datasets: Mutex<HashMap<String, Vec<WireRecord>>>,
    errors: Mutex<HashMap<String, Vec<String>>>,
    journal: Mutex<Vec<JournalEntry>>,
    closed: Mutex<Vec<String>>,
    credentials: Mutex<Vec<Credential>>,
    latency: Mutex<Duration>,
    handshake_latency: Mutex<Duration>,
    failing_handshakes: AtomicUsize,
    failing_executions: AtomicUsize,
    handshakes: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock connector; clones share the same endpoint state
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` for pipelines whose first stage is `command`
    pub fn with_dataset(self, command: &str, records: Vec<WireRecord>) -> Self {
        self.set_dataset(command, records);
        self
    }

    pub fn set_dataset(&self, command: &str, records: Vec<WireRecord>) {
        lock(&self.state.datasets).insert(command.to_lowercase(), records);
    }

    /// Report `messages` whenever `command` runs, alongside any records
    pub fn with_errors(self, command: &str, messages: &[&str]) -> Self {
        lock(&self.state.errors).insert(
            command.to_lowercase(),
            messages.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    /// Make the next `count` handshakes fail
    pub fn fail_next_handshakes(&self, count: usize) {
        self.state.failing_handshakes.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` executions fail at the transport level
    pub fn fail_next_executions(&self, count: usize) {
        self.state.failing_executions.store(count, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.state.latency) = latency;
    }

    pub fn set_handshake_latency(&self, latency: Duration) {
        *lock(&self.state.handshake_latency) = latency;
    }

    pub fn handshake_count(&self) -> usize {
        self.state.handshakes.load(Ordering::SeqCst)
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        lock(&self.state.journal).clone()
    }

    /// Ids of connections that have been closed, in close order
    pub fn closed_connections(&self) -> Vec<String> {
        lock(&self.state.closed).clone()
    }

    /// Credentials presented at each handshake, in order
    pub fn presented_credentials(&self) -> Vec<Credential> {
        lock(&self.state.credentials).clone()
    }

    /// Highest number of pipelines that ever ran at the same time
    pub fn max_concurrency(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }
}

/// Decrement a counter if it is non-zero; true when it was
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait::async_trait]
impl RemoteConnector for MockConnector {
    async fn connect(&self, target: &Target, credential: &Credential) -> Result<ConnectionHandle> {
        self.state.handshakes.fetch_add(1, Ordering::SeqCst);
        lock(&self.state.credentials).push(credential.clone());

        let latency = *lock(&self.state.handshake_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if take_one(&self.state.failing_handshakes) {
            return Err(BridgeError::connection(format!(
                "{} refused the connection",
                target.endpoint
            )));
        }

        let id = Uuid::new_v4().to_string();
        debug!("Mock connection {} opened", id);
        Ok(Arc::new(MockConnection {
            id,
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MockConnection {
    id: String,
    state: Arc<MockState>,
    closed: AtomicBool,
}

impl MockConnection {
    fn run(&self, pipeline: &Pipeline) -> RemoteOutput {
        let Some(first) = pipeline.commands().first() else {
            return RemoteOutput::default();
        };
        let key = first.name.to_lowercase();

        let errors = lock(&self.state.errors).get(&key).cloned().unwrap_or_default();
        let dataset = lock(&self.state.datasets).get(&key).cloned();

        let Some(mut records) = dataset else {
            let mut errors = errors;
            if errors.is_empty() {
                errors.push(format!(
                    "The term '{}' is not recognized as the name of a cmdlet.",
                    first.name
                ));
            }
            return RemoteOutput {
                records: Vec::new(),
                errors,
            };
        };

        if let Some(CoercedValue::Int64(limit)) = first.parameter("ResultSize") {
            records.truncate(usize::try_from(*limit).unwrap_or(0));
        }

        if let Some(columns) = projection(pipeline) {
            records = records.iter().map(|r| project(r, columns)).collect();
        }

        RemoteOutput {
            records: records.into_iter().map(|r| Arc::new(r) as RecordRef).collect(),
            errors,
        }
    }
}

/// Columns of the last `Select-Object` stage
fn projection(pipeline: &Pipeline) -> Option<&[String]> {
    pipeline
        .commands()
        .iter()
        .rev()
        .find(|c| c.name.eq_ignore_ascii_case("Select-Object"))
        .and_then(|c| c.positional())
}

fn project(record: &WireRecord, columns: &[String]) -> WireRecord {
    WireRecord::object(columns.iter().map(|column| {
        let value = record.property(column).cloned().unwrap_or(WireRecord::Null);
        (column.clone(), value)
    }))
}

#[async_trait::async_trait]
impl RemoteConnection for MockConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, pipeline: &Pipeline, extra: &ExtraParameters) -> Result<RemoteOutput> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::connection("connection is closed"));
        }

        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_active.fetch_max(active, Ordering::SeqCst);
        let started_at = Utc::now();

        let latency = *lock(&self.state.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let result = if take_one(&self.state.failing_executions) {
            Err(BridgeError::connection("connection reset by peer"))
        } else {
            Ok(self.run(pipeline))
        };

        lock(&self.state.journal).push(JournalEntry {
            connection_id: self.id.clone(),
            pipeline: pipeline.clone(),
            extra: extra.clone(),
            started_at,
            finished_at: Utc::now(),
        });
        self.state.active.fetch_sub(1, Ordering::SeqCst);

        result
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Mock connection {} closed", self.id);
            lock(&self.state.closed).push(self.id.clone());
        }
        Ok(())
    }
}
