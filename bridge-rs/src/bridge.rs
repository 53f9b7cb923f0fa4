//! Public entry point
//!
//! [`RemoteBridge`] owns the process's single management session and ties
//! the pieces together: compile the command line, run it through the
//! invocation executor, then flatten the returned records.

use crate::command::{compile, ExtraParameters, Pipeline};
use crate::config::BridgeConfig;
use crate::error::Result;
use crate::executor::{AuditSink, InvocationExecutor};
use crate::normalize::{self, FlattenedValue};
use crate::remote::RemoteConnector;
use crate::session::{Credential, SessionManager, Target};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Remote command execution bridge
pub struct RemoteBridge {
    session: Arc<SessionManager>,
    executor: InvocationExecutor,
}

impl RemoteBridge {
    pub fn new(
        target: Target,
        connector: Arc<dyn RemoteConnector>,
        open_timeout: Duration,
        execution_timeout: Duration,
    ) -> Self {
        info!("Remote bridge targeting {}", target);
        let session = Arc::new(SessionManager::new(connector, target, open_timeout));
        let executor = InvocationExecutor::new(session.clone(), execution_timeout);
        Self { session, executor }
    }

    /// Build a bridge from validated configuration
    pub fn from_config(config: &BridgeConfig, connector: Arc<dyn RemoteConnector>) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.target()?,
            connector,
            config.timeouts.open_timeout(),
            config.timeouts.execution_timeout(),
        ))
    }

    /// Replace the default tracing audit sink
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.executor = self.executor.with_audit_sink(audit);
        self
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Supply the credential; an open connection is re-established on the
    /// next invocation
    pub async fn set_credential(&self, credential: Credential) {
        self.session.set_credential(credential).await;
    }

    pub async fn clear_credential(&self) {
        self.session.clear_credential().await;
    }

    pub async fn set_target(&self, target: Target) {
        self.session.set_target(target).await;
    }

    /// Run a command line and return its flattened records
    pub async fn run(&self, command: &str) -> Result<Vec<FlattenedValue>> {
        self.run_with(command, ExtraParameters::new()).await
    }

    /// Run a command line with out-of-band values bound to its last stage
    pub async fn run_with(
        &self,
        command: &str,
        extra: ExtraParameters,
    ) -> Result<Vec<FlattenedValue>> {
        let pipeline = compile(command);
        debug!("Compiled {} stage(s) from command line", pipeline.len());
        self.invoke_pipeline(&pipeline, &extra).await
    }

    /// Run an already compiled pipeline
    pub async fn invoke_pipeline(
        &self,
        pipeline: &Pipeline,
        extra: &ExtraParameters,
    ) -> Result<Vec<FlattenedValue>> {
        let records = self.executor.invoke(pipeline, extra).await?;
        Ok(normalize::flatten_all(&records))
    }

    /// Close the session once the running invocation, if any, completes
    pub async fn shutdown(&self) {
        info!("Shutting down remote bridge");
        self.executor.shutdown().await;
    }
}
