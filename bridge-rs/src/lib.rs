//! bridge-rs: Remote command execution bridge
//!
//! Runs textual administrative command lines against a remote mail-server
//! management endpoint and returns the results as JSON-safe values.
//!
//! # Features
//!
//! - Lazily opened, shared management session with credential hot-swap
//! - Quote-aware command line compiler with typed parameter values
//! - Strictly serialized invocations with per-call timeouts
//! - Advisory vs fatal remote error classification
//! - Depth-bounded flattening of remote object graphs
//! - HTTP management gateway client and an in-process mock endpoint
//!
//! # Example Configuration
//!
//! ```toml
//! [remote]
//! endpoint = "https://mail.example.com/powershell"
//! configuration_scope = "Microsoft.Exchange"
//! auth_mechanism = "kerberos"
//!
//! [timeouts]
//! open_timeout_secs = 15
//! execution_timeout_secs = 120
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

pub mod bridge;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod normalize;
pub mod remote;
pub mod secret;
pub mod session;

pub use bridge::RemoteBridge;
pub use command::{compile, ExtraParameters, OutOfBandValue, Pipeline};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use normalize::FlattenedValue;
pub use secret::Secret;
pub use session::{AuthMechanism, Credential, Target};
