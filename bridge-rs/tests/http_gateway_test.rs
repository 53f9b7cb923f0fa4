//! Integration tests for the HTTP gateway connector
//!
//! Runs a small in-process gateway with axum and drives it through the
//! public bridge API.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bridge_rs::remote::http::HttpConnector;
use bridge_rs::remote::WireRecord;
use bridge_rs::{
    AuthMechanism, BridgeConfig, BridgeError, Credential, ExtraParameters, FlattenedValue,
    OutOfBandValue, RemoteBridge, Secret,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct GatewayState {
    sessions: Mutex<HashSet<String>>,
    handshakes: Mutex<Vec<Value>>,
    pipelines: Mutex<Vec<Value>>,
}

fn expected_authorization(header: Option<&str>) -> bool {
    let basic = format!("Basic {}", BASE64.encode("admin:s3cret"));
    matches!(header, Some(h) if h == basic || h == "Kerberos ticket-123")
}

async fn open_session(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok());
    if !expected_authorization(authorization) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    state.handshakes.lock().unwrap().push(body);
    let session_id = Uuid::new_v4().to_string();
    state.sessions.lock().unwrap().insert(session_id.clone());
    Json(json!({ "sessionId": session_id })).into_response()
}

async fn run_pipeline(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if !state.sessions.lock().unwrap().contains(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    state.pipelines.lock().unwrap().push(body.clone());

    let command = body["commands"][0]["name"].as_str().unwrap_or_default();
    match command {
        "Get-Mailbox" => Json(json!({
            "output": [
                WireRecord::object([
                    ("Name", WireRecord::string("alice")),
                    ("IssueWarningQuota", WireRecord::int(1900)),
                ]),
                { "kind": "null" },
                {
                    "kind": "object",
                    "text": "@{Name=bob; Quota=}",
                    "properties": [
                        { "name": "Name", "value": { "kind": "string", "value": "bob" } },
                        { "name": "Quota", "error": "property getter failed" },
                        { "name": "Manager" }
                    ]
                }
            ],
            "errors": []
        }))
        .into_response(),
        "Set-Mailbox" => Json(json!({
            "output": [],
            "errors": [{ "message": "Couldn't find object 'ghost'" }]
        }))
        .into_response(),
        _ => (StatusCode::UNPROCESSABLE_ENTITY, "unknown command").into_response(),
    }
}

async fn close_session(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.sessions.lock().unwrap().remove(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Helper function to start the gateway on an ephemeral port
async fn start_gateway() -> (String, Arc<GatewayState>) {
    let state = Arc::new(GatewayState::default());
    let app = Router::new()
        .route("/powershell/sessions", post(open_session))
        .route("/powershell/sessions/:id/pipelines", post(run_pipeline))
        .route("/powershell/sessions/:id", delete(close_session))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}/powershell", addr), state)
}

fn bridge_for(endpoint: &str, mechanism: AuthMechanism) -> RemoteBridge {
    let mut config = BridgeConfig::development();
    config.remote.endpoint = endpoint.to_string();
    config.remote.auth_mechanism = mechanism;
    config.timeouts.open_timeout_secs = 2;
    config.timeouts.execution_timeout_secs = 5;

    let connector = HttpConnector::new(Duration::from_secs(5)).unwrap();
    RemoteBridge::from_config(&config, Arc::new(connector)).unwrap()
}

#[tokio::test]
async fn test_basic_auth_round_trip() {
    let (endpoint, gateway) = start_gateway().await;
    let bridge = bridge_for(&endpoint, AuthMechanism::Basic);
    bridge.set_credential(Credential::password("admin", "s3cret")).await;

    let results = bridge
        .run("Get-Mailbox -ResultSize 10 | Select-Object Name, IssueWarningQuota")
        .await
        .unwrap();

    // The null record is dropped
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].get("Name").and_then(FlattenedValue::as_str), Some("alice"));
    assert_eq!(results[0].to_json()["IssueWarningQuota"], json!(1900));

    // Unreadable properties are omitted, empty ones are null
    let bob = results[1].as_map().unwrap();
    assert!(!bob.contains_key("Quota"));
    assert_eq!(bob.get("Manager"), Some(&FlattenedValue::Null));

    let handshakes = gateway.handshakes.lock().unwrap().clone();
    assert_eq!(
        handshakes,
        vec![json!({ "configurationName": "Microsoft.Exchange", "authMechanism": "basic" })]
    );

    let pipelines = gateway.pipelines.lock().unwrap().clone();
    assert_eq!(
        pipelines[0]["commands"][0],
        json!({ "name": "Get-Mailbox", "parameters": [{ "name": "ResultSize", "value": 10 }] })
    );
    assert_eq!(
        pipelines[0]["commands"][1]["parameters"],
        json!([{ "value": ["Name", "IssueWarningQuota"] }])
    );

    bridge.shutdown().await;
    assert!(gateway.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_credential_is_a_connection_failure() {
    let (endpoint, gateway) = start_gateway().await;
    let bridge = bridge_for(&endpoint, AuthMechanism::Basic);
    bridge.set_credential(Credential::password("admin", "wrong")).await;

    let result = bridge.run("Get-Mailbox").await;
    match result {
        Err(BridgeError::ConnectionFailed { cause }) => {
            assert!(cause.contains("credential rejected"));
            assert!(!cause.contains("wrong"));
        }
        other => panic!("expected ConnectionFailed, got {:?}", other),
    }
    assert!(!bridge.session().is_open().await);
    assert!(gateway.sessions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_token_mechanism_and_fatal_remote_errors() {
    let (endpoint, _gateway) = start_gateway().await;
    let bridge = bridge_for(&endpoint, AuthMechanism::Kerberos);
    bridge.set_credential(Credential::token("ticket-123")).await;

    let result = bridge.run("Set-Mailbox -Identity ghost -HiddenFromAddressListsEnabled").await;
    match result {
        Err(BridgeError::RemoteExecutionFailed { messages }) => {
            assert_eq!(messages, vec!["Couldn't find object 'ghost'".to_string()]);
        }
        other => panic!("expected RemoteExecutionFailed, got {:?}", other),
    }

    // Rejected pipelines surface as remote errors, not transport failures
    let result = bridge.run("Get-Nothing").await;
    assert!(matches!(result, Err(BridgeError::RemoteExecutionFailed { .. })));
    assert!(bridge.session().is_open().await);
}

#[tokio::test]
async fn test_expired_session_reconnects() {
    let (endpoint, gateway) = start_gateway().await;
    let bridge = bridge_for(&endpoint, AuthMechanism::Basic);
    bridge.set_credential(Credential::password("admin", "s3cret")).await;

    bridge.run("Get-Mailbox").await.unwrap();

    // The gateway forgets every session
    gateway.sessions.lock().unwrap().clear();

    let result = bridge.run("Get-Mailbox").await;
    assert!(matches!(result, Err(BridgeError::ConnectionFailed { .. })));

    assert_eq!(bridge.run("Get-Mailbox").await.unwrap().len(), 2);
    assert_eq!(gateway.handshakes.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_out_of_band_values_are_encoded() {
    let (endpoint, gateway) = start_gateway().await;
    let bridge = bridge_for(&endpoint, AuthMechanism::Basic);
    bridge.set_credential(Credential::password("admin", "s3cret")).await;

    let extra = ExtraParameters::new()
        .with("FileData", OutOfBandValue::Binary(b"cert".to_vec()))
        .with("Password", OutOfBandValue::Secret(Secret::new("pfx-pass")));
    bridge
        .run_with("Get-Mailbox -Identity alice", extra)
        .await
        .unwrap();

    let pipelines = gateway.pipelines.lock().unwrap().clone();
    assert_eq!(
        pipelines[0]["commands"][0]["parameters"],
        json!([
            { "name": "Identity", "value": "alice" },
            { "name": "FileData", "value": { "$binary": "Y2VydA==" } },
            { "name": "Password", "value": { "$secure": "pfx-pass" } }
        ])
    );
}
