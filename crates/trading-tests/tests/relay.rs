//! Live quote relay tests.

use std::sync::Arc;
use std::time::Duration;
use trading_client::{RelayClient, RelayMessage};
use trading_tests::{ScriptedUpstream, TestServer, TestServerOptions, sample_ticker};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn next_frame(relay: &mut RelayClient) -> Option<RelayMessage> {
    tokio::time::timeout(RECV_TIMEOUT, relay.recv())
        .await
        .expect("Timeout waiting for relay frame")
}

#[tokio::test]
async fn test_relay_forwards_frames_verbatim() {
    let frames = vec![sample_ticker("ETHUSDT"), "not json at all".to_string()];
    let server = TestServer::start_with(TestServerOptions {
        upstream: Arc::new(ScriptedUpstream::new(frames.clone())),
        ..Default::default()
    })
    .await;
    let client = server.user_client("alice").await;

    let mut relay = client.relay(Some("eth")).await.expect("Relay connect failed");

    let first = next_frame(&mut relay).await.expect("Relay closed");
    assert_eq!(first, RelayMessage::Text(frames[0].clone()));
    assert_eq!(first.ticker().expect("Not a ticker").symbol, "ETHUSDT");

    let second = next_frame(&mut relay).await.expect("Relay closed");
    assert_eq!(second, RelayMessage::Text(frames[1].clone()));

    assert_eq!(
        server.upstream.dialed(),
        vec!["wss://stream.binance.com:9443/ws/ethusdt@ticker".to_string()]
    );
}

#[tokio::test]
async fn test_relay_default_symbol() {
    let server = TestServer::start().await;
    let client = server.user_client("alice").await;

    let mut relay = client.relay(None).await.expect("Relay connect failed");
    assert!(next_frame(&mut relay).await.is_some());

    assert_eq!(
        server.upstream.dialed(),
        vec!["wss://stream.binance.com:9443/ws/btcusdt@ticker".to_string()]
    );
}

#[tokio::test]
async fn test_relay_sessions_are_tracked() {
    let server = TestServer::start().await;
    let client = server.user_client("alice").await;
    let admin = server.admin_client().await;

    let mut relay = client.relay(Some("btc")).await.expect("Relay connect failed");
    assert!(next_frame(&mut relay).await.is_some());

    assert!(server.wait_for_sessions(1).await);
    let sessions = admin.list_relay_sessions().await.expect("List failed");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].symbol, "BTCUSDT");
    assert!(sessions[0].user_id.is_some());

    let health = server.client().health_check().await.expect("Health failed");
    assert_eq!(health.relay_sessions, 1);

    relay.close().await.expect("Close failed");
    assert!(server.wait_for_sessions(0).await);
    assert!(admin.list_relay_sessions().await.expect("List failed").is_empty());
}

#[tokio::test]
async fn test_relay_requires_token() {
    let server = TestServer::start().await;

    let result = server.client().relay(Some("btc")).await;
    assert!(result.is_err());
    assert!(server.upstream.dialed().is_empty());
}

#[tokio::test]
async fn test_relay_open_when_auth_disabled() {
    let server = TestServer::start_with(TestServerOptions {
        require_relay_auth: false,
        ..Default::default()
    })
    .await;

    let mut relay = server
        .client()
        .relay(Some("btc"))
        .await
        .expect("Relay connect failed");
    assert!(next_frame(&mut relay).await.is_some());

    assert!(server.wait_for_sessions(1).await);
    let sessions = server.state.relay.registry().snapshot();
    assert_eq!(sessions[0].user_id, None);
}

#[tokio::test]
async fn test_relay_closes_caller_when_upstream_refuses() {
    let server = TestServer::start_with(TestServerOptions {
        upstream: Arc::new(ScriptedUpstream::refusing()),
        ..Default::default()
    })
    .await;
    let client = server.user_client("alice").await;

    let mut relay = client.relay(Some("btc")).await.expect("Relay connect failed");
    assert!(next_frame(&mut relay).await.is_none());
    assert!(server.wait_for_sessions(0).await);
    assert_eq!(server.upstream.dialed().len(), 1);
}
