//! HTTP management gateway client
//!
//! Speaks the JSON protocol of the management gateway that fronts the
//! remote shell endpoint:
//!
//! | Request                                   | Body → Response                          |
//! |-------------------------------------------|------------------------------------------|
//! | `POST {endpoint}/sessions`                | `{configurationName, authMechanism}` → `{sessionId}` |
//! | `POST {endpoint}/sessions/{id}/pipelines` | `{commands}` → `{output, errors}`        |
//! | `DELETE {endpoint}/sessions/{id}`         | no body                                  |
//!
//! The handshake carries the credential in the `Authorization` header using
//! the target's mechanism. Out-of-band binary values are sent base64 encoded
//! as `{"$binary": ...}` and secrets as `{"$secure": ...}`.

use super::wire::WireRecord;
use super::{ConnectionHandle, RecordRef, RemoteConnection, RemoteConnector, RemoteOutput};
use crate::command::{
    CoercedValue, CommandDescriptor, ExtraParameters, OutOfBandValue, ParameterBinding, Pipeline,
};
use crate::error::{BridgeError, Result};
use crate::session::{AuthMechanism, Credential, Target};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Handshake request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenSessionRequest<'a> {
    configuration_name: &'a str,
    auth_mechanism: AuthMechanism,
}

/// Handshake response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenSessionResponse {
    session_id: String,
}

/// Pipeline execution request
#[derive(Debug, Serialize)]
struct PipelineRequest<'a> {
    commands: Vec<WireCommand<'a>>,
}

#[derive(Debug, Serialize)]
struct WireCommand<'a> {
    name: &'a str,
    parameters: Vec<WireParameter<'a>>,
}

#[derive(Debug, Serialize)]
struct WireParameter<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    value: Value,
}

/// Pipeline execution response
#[derive(Debug, Deserialize)]
struct PipelineResponse {
    #[serde(default)]
    output: Vec<WireRecord>,
    #[serde(default)]
    errors: Vec<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

/// Connector for the HTTP management gateway
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    /// Create a connector whose individual HTTP requests time out after
    /// `request_timeout`
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(BridgeError::connection)?;
        Ok(Self { client })
    }
}

/// Attach the credential using the mechanism's authorization scheme
fn authorize(
    request: reqwest::RequestBuilder,
    mechanism: AuthMechanism,
    credential: &Credential,
) -> Result<reqwest::RequestBuilder> {
    match (mechanism, credential) {
        (AuthMechanism::Basic, Credential::Password { username, password }) => {
            Ok(request.basic_auth(username, Some(password.expose())))
        }
        (AuthMechanism::Basic, Credential::Token(_)) => Err(BridgeError::connection(
            "Basic authentication requires a username and password",
        )),
        (mechanism, Credential::Token(token)) => Ok(request.header(
            reqwest::header::AUTHORIZATION,
            format!("{} {}", mechanism.scheme(), token.expose()),
        )),
        (mechanism, Credential::Password { .. }) => Err(BridgeError::connection(format!(
            "{} authentication requires a pre-acquired token",
            mechanism
        ))),
    }
}

fn base_url(target: &Target) -> String {
    target.endpoint.as_str().trim_end_matches('/').to_string()
}

#[async_trait::async_trait]
impl RemoteConnector for HttpConnector {
    async fn connect(&self, target: &Target, credential: &Credential) -> Result<ConnectionHandle> {
        let base = base_url(target);
        debug!("Opening gateway session at {}", base);

        let request = self
            .client
            .post(format!("{}/sessions", base))
            .json(&OpenSessionRequest {
                configuration_name: &target.configuration_scope,
                auth_mechanism: target.auth_mechanism,
            });
        let request = authorize(request, target.auth_mechanism, credential)?;

        let response = request.send().await.map_err(BridgeError::connection)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::connection(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    format!("credential rejected by {} ({})", base, status)
                }
                _ => format!("handshake failed with status {}: {}", status, body.trim()),
            }));
        }

        let opened: OpenSessionResponse = response.json().await.map_err(BridgeError::connection)?;

        Ok(Arc::new(HttpConnection {
            client: self.client.clone(),
            session_url: format!("{}/sessions/{}", base, opened.session_id),
            id: opened.session_id,
        }))
    }
}

/// One gateway session
struct HttpConnection {
    client: reqwest::Client,
    session_url: String,
    id: String,
}

fn coerced_json(value: &CoercedValue) -> Value {
    match value {
        CoercedValue::Null => Value::Null,
        CoercedValue::Bool(b) => json!(b),
        CoercedValue::Int64(n) => json!(n),
        CoercedValue::String(s) => json!(s),
        CoercedValue::StringArray(items) => json!(items),
    }
}

fn out_of_band_json(value: &OutOfBandValue) -> Value {
    match value {
        OutOfBandValue::Binary(bytes) => json!({ "$binary": BASE64.encode(bytes) }),
        OutOfBandValue::Secret(secret) => json!({ "$secure": secret.expose() }),
        OutOfBandValue::Value(value) => coerced_json(value),
    }
}

fn wire_command(command: &CommandDescriptor) -> WireCommand<'_> {
    WireCommand {
        name: &command.name,
        parameters: command
            .parameters
            .iter()
            .map(|binding| match binding {
                ParameterBinding::Named { key, value } => WireParameter {
                    name: Some(key.as_str()),
                    value: coerced_json(value),
                },
                ParameterBinding::PositionalList { values } => WireParameter {
                    name: None,
                    value: json!(values),
                },
            })
            .collect(),
    }
}

/// Build the request body, binding out-of-band values to the last stage
fn pipeline_request<'a>(pipeline: &'a Pipeline, extra: &'a ExtraParameters) -> PipelineRequest<'a> {
    let mut commands: Vec<WireCommand<'a>> = pipeline.commands().iter().map(wire_command).collect();

    if let Some(last) = commands.last_mut() {
        for (name, value) in extra.iter() {
            last.parameters.push(WireParameter {
                name: Some(name),
                value: out_of_band_json(value),
            });
        }
    }

    PipelineRequest { commands }
}

#[async_trait::async_trait]
impl RemoteConnection for HttpConnection {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self, pipeline: &Pipeline, extra: &ExtraParameters) -> Result<RemoteOutput> {
        let response = self
            .client
            .post(format!("{}/pipelines", self.session_url))
            .json(&pipeline_request(pipeline, extra))
            .send()
            .await
            .map_err(BridgeError::connection)?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(BridgeError::connection(format!(
                    "gateway session {} has expired",
                    self.id
                )));
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.text().await.unwrap_or_default();
                return Ok(RemoteOutput {
                    records: Vec::new(),
                    errors: vec![format!("gateway rejected the pipeline: {}", body.trim())],
                });
            }
            _ => {
                return Err(BridgeError::connection(format!(
                    "pipeline request failed with status {}",
                    status
                )));
            }
        }

        let body: PipelineResponse = response.json().await.map_err(BridgeError::connection)?;

        Ok(RemoteOutput {
            records: body
                .output
                .into_iter()
                .filter(|record| !record.is_null())
                .map(|record| Arc::new(record) as RecordRef)
                .collect(),
            errors: body.errors.into_iter().map(|e| e.message).collect(),
        })
    }

    async fn close(&self) -> Result<()> {
        let response = self
            .client
            .delete(&self.session_url)
            .send()
            .await
            .map_err(BridgeError::connection)?;

        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            warn!("Closing gateway session {} returned {}", self.id, response.status());
        }
        Ok(())
    }
}
