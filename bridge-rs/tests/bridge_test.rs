//! Integration tests for the bridge against the mock endpoint

use bridge_rs::normalize::{FlattenedValue, MAX_DEPTH};
use bridge_rs::remote::mock::MockConnector;
use bridge_rs::remote::WireRecord;
use bridge_rs::{
    AuthMechanism, BridgeConfig, BridgeError, Credential, ExtraParameters, OutOfBandValue,
    RemoteBridge, Secret, Target,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

fn mailbox(name: &str, alias: &str, database: &str) -> WireRecord {
    WireRecord::object([
        ("Name", WireRecord::string(name)),
        ("Alias", WireRecord::string(alias)),
        ("Database", WireRecord::string(database)),
    ])
}

fn mailboxes() -> Vec<WireRecord> {
    vec![
        mailbox("alice", "al", "DB01"),
        mailbox("bob", "bo", "DB02"),
        mailbox("carol", "ca", "DB01"),
    ]
}

/// Helper to build a bridge over `connector` with short timeouts
fn start_bridge(connector: &MockConnector) -> Arc<RemoteBridge> {
    let mut config = BridgeConfig::development();
    config.timeouts.open_timeout_secs = 1;
    config.timeouts.execution_timeout_secs = 2;
    Arc::new(RemoteBridge::from_config(&config, Arc::new(connector.clone())).unwrap())
}

#[tokio::test]
async fn test_unauthenticated_until_credential_is_supplied() {
    let connector = MockConnector::new().with_dataset("Get-Mailbox", mailboxes());
    let bridge = start_bridge(&connector);

    let result = bridge.run("Get-Mailbox -ResultSize 2 | Select-Object Name, Alias").await;
    assert!(matches!(result, Err(BridgeError::Unauthenticated)));
    assert!(!bridge.session().is_open().await);

    bridge.set_credential(Credential::password("admin", "s3cret")).await;
    let results = bridge
        .run("Get-Mailbox -ResultSize 2 | Select-Object Name, Alias")
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    for record in &results {
        let keys: Vec<&str> = record.as_map().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Alias", "Name"]);
    }
    assert_eq!(results[0].get("Name").and_then(FlattenedValue::as_str), Some("alice"));
    assert_eq!(results[1].get("Alias").and_then(FlattenedValue::as_str), Some("bo"));
    assert!(bridge.session().is_open().await);
}

#[tokio::test]
async fn test_invocations_run_in_submission_order() {
    let connector = MockConnector::new()
        .with_dataset("Get-Mailbox", mailboxes())
        .with_dataset("Get-MailboxDatabase", vec![WireRecord::string("DB01")]);
    connector.set_latency(Duration::from_millis(50));
    let bridge = start_bridge(&connector);
    bridge.set_credential(Credential::token("ticket")).await;

    let first = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.run("Get-Mailbox").await })
    };
    // Let the first invocation take the lock
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.run("Get-MailboxDatabase").await })
    };

    assert_eq!(first.await.unwrap().unwrap().len(), 3);
    assert_eq!(second.await.unwrap().unwrap(), vec![FlattenedValue::string("DB01")]);

    let journal = connector.journal();
    assert_eq!(journal.len(), 2);
    assert_eq!(journal[0].pipeline.commands()[0].name, "Get-Mailbox");
    assert_eq!(journal[1].pipeline.commands()[0].name, "Get-MailboxDatabase");
    assert!(journal[0].finished_at <= journal[1].started_at);
    assert_eq!(connector.max_concurrency(), 1);
}

#[tokio::test]
async fn test_credential_change_reconnects_and_closes_old_connection() {
    let connector = MockConnector::new().with_dataset("Get-Mailbox", mailboxes());
    let bridge = start_bridge(&connector);

    bridge.set_credential(Credential::password("admin", "old")).await;
    bridge.run("Get-Mailbox").await.unwrap();
    let first_connection = connector.journal()[0].connection_id.clone();

    bridge.set_credential(Credential::password("admin", "new")).await;
    assert!(!bridge.session().is_open().await);

    bridge.run("Get-Mailbox").await.unwrap();
    let journal = connector.journal();
    assert_ne!(journal[1].connection_id, first_connection);
    assert_eq!(connector.closed_connections(), vec![first_connection]);

    let presented = connector.presented_credentials();
    assert_eq!(presented.len(), 2);
    assert_eq!(presented[1], Credential::password("admin", "new"));
}

#[tokio::test]
async fn test_target_change_reconnects() {
    let connector = MockConnector::new().with_dataset("Get-Mailbox", mailboxes());
    let bridge = start_bridge(&connector);
    bridge.set_credential(Credential::token("ticket")).await;

    bridge.run("Get-Mailbox").await.unwrap();
    let generation = bridge.session().generation().await;

    let other = Target::new(
        Url::parse("https://mail2.example.com/powershell").unwrap(),
        "Microsoft.Exchange",
        AuthMechanism::Negotiate,
    );
    bridge.set_target(other.clone()).await;
    bridge.run("Get-Mailbox").await.unwrap();

    assert_eq!(bridge.session().target().await, other);
    assert!(bridge.session().generation().await > generation);
    assert_eq!(connector.handshake_count(), 2);
}

#[tokio::test]
async fn test_failed_handshake_is_retried_on_next_call() {
    let connector = MockConnector::new().with_dataset("Get-Mailbox", mailboxes());
    connector.fail_next_handshakes(1);
    let bridge = start_bridge(&connector);
    bridge.set_credential(Credential::token("ticket")).await;

    let first = bridge.run("Get-Mailbox").await;
    match first {
        Err(e @ BridgeError::ConnectionFailed { .. }) => assert!(e.is_retryable()),
        other => panic!("expected ConnectionFailed, got {:?}", other),
    }
    assert!(!bridge.session().is_open().await);

    assert_eq!(bridge.run("Get-Mailbox").await.unwrap().len(), 3);
    assert_eq!(connector.handshake_count(), 2);
}

#[tokio::test]
async fn test_out_of_band_values_reach_the_last_stage() {
    let connector = MockConnector::new().with_dataset(
        "Import-ExchangeCertificate",
        vec![WireRecord::object([(
            "Thumbprint",
            WireRecord::string("5113AE0233A72FCCB75F1D7C5D7F8D2E2E4E5A6B"),
        )])],
    );
    let bridge = start_bridge(&connector);
    bridge.set_credential(Credential::password("admin", "pw")).await;

    let certificate = vec![0x30, 0x82, 0x05, 0x2a];
    let extra = ExtraParameters::new()
        .with("FileData", OutOfBandValue::Binary(certificate.clone()))
        .with("Password", OutOfBandValue::Secret(Secret::new("pfx-pass")));

    let results = bridge
        .run_with("Import-ExchangeCertificate -Server EX01 -PrivateKeyExportable $true", extra)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);

    let journal = connector.journal();
    let sent = &journal[0];
    assert_eq!(sent.pipeline.len(), 1);
    // The compiler never saw the out-of-band values
    assert!(sent.pipeline.commands()[0].parameter("FileData").is_none());
    assert_eq!(sent.extra.names().collect::<Vec<_>>(), vec!["FileData", "Password"]);
    assert_eq!(
        sent.extra.iter().next().map(|(_, value)| value.clone()),
        Some(OutOfBandValue::Binary(certificate))
    );
}

#[tokio::test]
async fn test_cancelled_run_does_not_reuse_the_connection() {
    let connector = MockConnector::new().with_dataset("Get-Mailbox", mailboxes());
    connector.set_latency(Duration::from_millis(500));
    let bridge = start_bridge(&connector);
    bridge.set_credential(Credential::token("ticket")).await;

    let running = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.run("Get-Mailbox").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    running.abort();
    let _ = running.await;

    assert!(!bridge.session().is_open().await);

    connector.set_latency(Duration::ZERO);
    assert_eq!(bridge.run("Get-Mailbox").await.unwrap().len(), 3);
    assert_eq!(connector.handshake_count(), 2);
}

#[tokio::test]
async fn test_shutdown_closes_the_session() {
    let connector = MockConnector::new().with_dataset("Get-Mailbox", mailboxes());
    let bridge = start_bridge(&connector);
    bridge.set_credential(Credential::token("ticket")).await;

    bridge.run("Get-Mailbox").await.unwrap();
    bridge.shutdown().await;

    assert!(!bridge.session().is_open().await);
    assert_eq!(connector.closed_connections().len(), 1);
    // The credential survives, so the bridge reconnects on demand
    assert!(bridge.session().is_authenticated().await);
    bridge.run("Get-Mailbox").await.unwrap();
    assert_eq!(connector.handshake_count(), 2);
}

#[tokio::test]
async fn test_nested_records_are_bounded() {
    // Nest well past the depth limit
    let mut record = WireRecord::string("leaf");
    for level in 0..(MAX_DEPTH + 3) {
        record = WireRecord::object([
            ("Level", WireRecord::int(level as i64)),
            ("Child", record),
        ]);
    }
    let connector = MockConnector::new().with_dataset("Get-Deep", vec![record]);
    let bridge = start_bridge(&connector);
    bridge.set_credential(Credential::token("ticket")).await;

    let results = bridge.run("Get-Deep").await.unwrap();

    let mut node = &results[0];
    let mut maps = 0;
    while let Some(child) = node.get("Child") {
        maps += 1;
        node = child;
    }
    assert_eq!(maps, MAX_DEPTH + 1);
    assert!(node.as_str().is_some_and(|s| s.starts_with("@{")));
}
