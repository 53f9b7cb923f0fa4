//! Remote management endpoint abstraction
//!
//! A [`RemoteConnector`] performs the authenticated handshake and yields a
//! [`RemoteConnection`] that runs compiled pipelines. Adapters:
//!
//! - [`http::HttpConnector`]: JSON management gateway over HTTP(S)
//! - [`mock::MockConnector`]: in-process endpoint for testing
//!
//! Connections are not multiplexed: callers must never run two pipelines
//! on the same connection at once. The invocation executor enforces this.

pub mod http;
pub mod mock;
pub mod record;
pub mod wire;

use crate::command::{ExtraParameters, Pipeline};
use crate::error::Result;
use crate::session::{Credential, Target};
use std::sync::Arc;

pub use record::{RawRecord, RecordProperty, RecordRef};
pub use wire::{WireProperty, WireRecord};

/// Shared handle to an open connection
pub type ConnectionHandle = Arc<dyn RemoteConnection>;

/// What the endpoint returned for one pipeline
#[derive(Default)]
pub struct RemoteOutput {
    /// Result records, in output order
    pub records: Vec<RecordRef>,
    /// Error messages reported alongside (or instead of) the records
    pub errors: Vec<String>,
}

/// Opens authenticated connections to a management endpoint
#[async_trait::async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Perform the handshake
    ///
    /// Fails with `ConnectionFailed` when the endpoint is unreachable or
    /// rejects the credential.
    async fn connect(&self, target: &Target, credential: &Credential) -> Result<ConnectionHandle>;
}

/// An open, authenticated connection
#[async_trait::async_trait]
pub trait RemoteConnection: Send + Sync {
    /// Identifier of this connection, unique per connector
    fn id(&self) -> &str;

    /// Run a pipeline, binding `extra` to its final stage
    ///
    /// Transport failures are `ConnectionFailed`; errors reported by the
    /// endpoint itself belong in [`RemoteOutput::errors`].
    async fn execute(&self, pipeline: &Pipeline, extra: &ExtraParameters) -> Result<RemoteOutput>;

    /// Tear the connection down
    async fn close(&self) -> Result<()>;
}
