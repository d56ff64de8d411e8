//! Gateway Client Integration Tests
//!
//! Each test runs the real WebSocket connector against an in-process mock
//! gateway.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use gamebot_gateway::protocol::SignalKind;
use gamebot_gateway::{
    ClientConfig, ConnectionState, EndpointResolver, EventCategory, GatewayClient, GatewayError,
    GatewayEvent, HttpEndpointResolver, LifecycleEvent, StaticEndpoint,
};
use integration_tests::{MockGateway, TEST_TOKEN, WAIT};
use std::time::Duration;
use tokio::sync::broadcast;

fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.reconnect.base_delay = Duration::from_millis(50);
    config.reconnect.max_delay = Duration::from_millis(200);
    config
}

fn static_client(gateway: &MockGateway, config: ClientConfig) -> GatewayClient {
    GatewayClient::builder(config)
        .resolver(StaticEndpoint::new(gateway.ws_url()))
        .build()
        .expect("client builds")
}

async fn next_event(events: &mut broadcast::Receiver<GatewayEvent>) -> GatewayEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event stream closed")
}

/// Skip lifecycle notifications until one matches
async fn wait_lifecycle(
    lifecycle: &mut broadcast::Receiver<LifecycleEvent>,
    matches: impl Fn(&LifecycleEvent) -> bool,
) -> LifecycleEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = lifecycle.recv().await.expect("lifecycle stream closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for a lifecycle event")
}

async fn wait_state(client: &GatewayClient, state: ConnectionState) {
    tokio::time::timeout(WAIT, client.wait_for_state(state))
        .await
        .expect("timed out waiting for state")
        .expect("client closed");
}

fn content(event: &GatewayEvent) -> &str {
    event.data["content"].as_str().unwrap_or_default()
}

// ============================================================================
// Handshake Tests
// ============================================================================

#[tokio::test]
async fn test_handshake_emits_ready() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = static_client(&gateway, fast_config());
    let mut lifecycle = client.lifecycle();

    client.connect().await.unwrap();
    let server = gateway.accept().await;
    assert!(!server.is_resume());
    assert_eq!(
        wait_lifecycle(&mut lifecycle, |_| true).await,
        LifecycleEvent::Connecting
    );
    assert_eq!(
        wait_lifecycle(&mut lifecycle, |_| true).await,
        LifecycleEvent::Connected
    );

    server.hello("session-1");
    assert_eq!(
        wait_lifecycle(&mut lifecycle, |_| true).await,
        LifecycleEvent::Ready {
            session_id: "session-1".to_string()
        }
    );
    wait_state(&client, ConnectionState::Authenticated).await;

    let session = client.session().unwrap();
    assert_eq!(session.session_id, "session-1");
    assert_eq!(session.last_delivered_sequence, 0);
    assert_eq!(session.endpoint_url, gateway.ws_url());
}

#[tokio::test]
async fn test_rejected_handshake_reports_error() {
    let mut gateway = MockGateway::start().await.unwrap();
    let mut config = fast_config();
    config.reconnect.enabled = false;
    let client = static_client(&gateway, config);
    let mut lifecycle = client.lifecycle();

    client.connect().await.unwrap();
    let server = gateway.accept().await;
    server.reject(40103);

    let error = wait_lifecycle(&mut lifecycle, |e| matches!(e, LifecycleEvent::Error(_))).await;
    assert_eq!(
        error,
        LifecycleEvent::Error(GatewayError::HandshakeFailed(
            gamebot_gateway::HandshakeFailure::Rejected { code: 40103 }
        ))
    );
    wait_state(&client, ConnectionState::Disconnected).await;
    assert!(client.session().is_none());
}

// ============================================================================
// Event Delivery Tests
// ============================================================================

#[tokio::test]
async fn test_events_are_delivered_in_sequence_order() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = static_client(&gateway, fast_config());
    let mut events = client.events();

    client.connect().await.unwrap();
    let server = gateway.accept_hello("session-1").await;
    wait_state(&client, ConnectionState::Authenticated).await;

    server.event(2, "second");
    server.event(1, "first");
    server.event(3, "third");

    let first = next_event(&mut events).await;
    let second = next_event(&mut events).await;
    let third = next_event(&mut events).await;
    assert_eq!((first.sn, content(&first)), (Some(1), "first"));
    assert_eq!((second.sn, content(&second)), (Some(2), "second"));
    assert_eq!((third.sn, content(&third)), (Some(3), "third"));
    assert_eq!(first.category, EventCategory::Message);
}

#[tokio::test]
async fn test_duplicate_events_are_dropped() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = static_client(&gateway, fast_config());
    let mut events = client.events();

    client.connect().await.unwrap();
    let server = gateway.accept_hello("session-1").await;
    wait_state(&client, ConnectionState::Authenticated).await;

    server.event(1, "first");
    server.event(1, "first again");
    server.event(2, "second");

    assert_eq!(next_event(&mut events).await.sn, Some(1));
    assert_eq!(next_event(&mut events).await.sn, Some(2));
}

#[tokio::test]
async fn test_compressed_frames_are_inflated() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = static_client(&gateway, fast_config());
    let mut events = client.events();

    client.connect().await.unwrap();
    let server = gateway.accept_hello("session-1").await;
    wait_state(&client, ConnectionState::Authenticated).await;

    server.send_compressed(&integration_tests::text_event(1, "zipped"));
    let event = next_event(&mut events).await;
    assert_eq!(content(&event), "zipped");
}

#[tokio::test]
async fn test_category_handlers_run() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = static_client(&gateway, fast_config());
    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();

    client.on_event(EventCategory::Message, move |event: GatewayEvent| {
        let seen_tx = seen_tx.clone();
        async move {
            let _ = seen_tx.send(event.sn);
            anyhow::Ok(())
        }
    });

    client.connect().await.unwrap();
    let server = gateway.accept_hello("session-1").await;
    wait_state(&client, ConnectionState::Authenticated).await;
    server.event(1, "hello");

    let seen = tokio::time::timeout(WAIT, seen_rx.recv()).await.unwrap();
    assert_eq!(seen, Some(Some(1)));
}

// ============================================================================
// Heartbeat Tests
// ============================================================================

#[tokio::test]
async fn test_ping_carries_last_sequence() {
    let mut gateway = MockGateway::start().await.unwrap();
    let mut config = fast_config();
    config.heartbeat.interval = Duration::from_millis(100);
    config.heartbeat.jitter = Duration::ZERO;
    let client = static_client(&gateway, config);
    let mut events = client.events();

    client.connect().await.unwrap();
    let mut server = gateway.accept_hello("session-1").await;
    wait_state(&client, ConnectionState::Authenticated).await;
    server.event(1, "one");
    server.event(2, "two");
    next_event(&mut events).await;
    next_event(&mut events).await;

    let ping = server.recv().await.unwrap();
    assert_eq!(ping.signal, SignalKind::Ping);
    assert_eq!(ping.sn, Some(2));
    server.pong();

    let ping = server.recv().await.unwrap();
    assert_eq!(ping.signal, SignalKind::Ping);
    assert_eq!(client.state(), ConnectionState::Authenticated);
}

// ============================================================================
// Reconnect Tests
// ============================================================================

#[tokio::test]
async fn test_dropped_socket_reconnects_with_resume_params() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = static_client(&gateway, fast_config());
    let mut events = client.events();
    let mut lifecycle = client.lifecycle();

    client.connect().await.unwrap();
    let server = gateway.accept_hello("session-1").await;
    wait_state(&client, ConnectionState::Authenticated).await;
    server.event(1, "one");
    server.event(2, "two");
    next_event(&mut events).await;
    next_event(&mut events).await;

    drop(server);
    wait_lifecycle(&mut lifecycle, |e| {
        matches!(e, LifecycleEvent::Disconnected { .. })
    })
    .await;

    let server = gateway.accept().await;
    assert!(server.is_resume());
    assert_eq!(server.query.get("sn").map(String::as_str), Some("2"));
    assert_eq!(
        server.query.get("session_id").map(String::as_str),
        Some("session-1")
    );

    server.hello("session-1");
    assert_eq!(
        wait_lifecycle(&mut lifecycle, |e| matches!(e, LifecycleEvent::Reconnected { .. })).await,
        LifecycleEvent::Reconnected {
            session_id: "session-1".to_string()
        }
    );

    // The session continues where it left off
    server.event(3, "three");
    assert_eq!(next_event(&mut events).await.sn, Some(3));
}

#[tokio::test]
async fn test_reconnect_signal_starts_fresh_session() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = static_client(&gateway, fast_config());
    let mut events = client.events();
    let mut lifecycle = client.lifecycle();

    client.connect().await.unwrap();
    let server = gateway.accept_hello("session-1").await;
    wait_state(&client, ConnectionState::Authenticated).await;
    server.event(1, "one");
    next_event(&mut events).await;

    server.reconnect(41008, "session expired");
    let disconnected = wait_lifecycle(&mut lifecycle, |e| {
        matches!(e, LifecycleEvent::Disconnected { .. })
    })
    .await;
    assert!(disconnected.to_string().contains("41008"));

    let server = gateway.accept().await;
    assert!(!server.is_resume());
    server.hello("session-2");
    wait_lifecycle(&mut lifecycle, |e| matches!(e, LifecycleEvent::Reconnected { .. })).await;

    // Numbering restarts with the new session
    server.event(1, "fresh");
    let event = next_event(&mut events).await;
    assert_eq!((event.sn, content(&event)), (Some(1), "fresh"));
    assert_eq!(client.session().unwrap().session_id, "session-2");
}

#[tokio::test]
async fn test_disconnect_closes_socket() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = static_client(&gateway, fast_config());

    client.connect().await.unwrap();
    let mut server = gateway.accept_hello("session-1").await;
    wait_state(&client, ConnectionState::Authenticated).await;

    client.disconnect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(server.recv().await.is_none());
}

// ============================================================================
// Endpoint Index Tests
// ============================================================================

#[tokio::test]
async fn test_http_resolver_fetches_endpoint() {
    let gateway = MockGateway::start().await.unwrap();
    let resolver = HttpEndpointResolver::new(gateway.api_base_url(), TEST_TOKEN, true);

    let url = resolver.resolve_endpoint().await.unwrap();
    assert_eq!(url, gateway.ws_url());

    let requests = gateway.index_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bot test-token")
    );
    assert_eq!(requests[0].compress.as_deref(), Some("1"));
}

#[tokio::test]
async fn test_http_resolver_retries() {
    let gateway = MockGateway::start().await.unwrap();
    let resolver = HttpEndpointResolver::new(gateway.api_base_url(), TEST_TOKEN, false)
        .with_retry_delay(Duration::from_millis(10));

    gateway.fail_index_requests(2);
    assert_eq!(resolver.resolve_endpoint().await.unwrap(), gateway.ws_url());
    assert_eq!(gateway.index_requests().len(), 3);
    assert_eq!(gateway.index_requests()[0].compress.as_deref(), Some("0"));
}

#[tokio::test]
async fn test_http_resolver_gives_up_after_three_attempts() {
    let gateway = MockGateway::start().await.unwrap();
    let resolver = HttpEndpointResolver::new(gateway.api_base_url(), TEST_TOKEN, true)
        .with_retry_delay(Duration::from_millis(10));

    gateway.fail_index_requests(3);
    let error = resolver.resolve_endpoint().await.unwrap_err();
    assert!(matches!(error, GatewayError::EndpointUnavailable(_)));
    assert_eq!(gateway.index_requests().len(), 3);
}

#[tokio::test]
async fn test_invalid_token_is_unavailable() {
    let gateway = MockGateway::start().await.unwrap();
    let resolver = HttpEndpointResolver::new(gateway.api_base_url(), "wrong", true)
        .with_retry_delay(Duration::from_millis(10));

    let error = resolver.resolve_endpoint().await.unwrap_err();
    assert!(error.to_string().contains("invalid token"));
}

#[tokio::test]
async fn test_http_resolver_times_out_unanswered_requests() {
    let gateway = MockGateway::start().await.unwrap();
    let resolver = HttpEndpointResolver::new(gateway.stalled_api_base_url(), TEST_TOKEN, true)
        .with_request_timeout(Duration::from_millis(100))
        .with_retry_delay(Duration::from_millis(10));

    let error = tokio::time::timeout(WAIT, resolver.resolve_endpoint())
        .await
        .expect("resolver gives up on its own")
        .unwrap_err();
    assert!(matches!(error, GatewayError::EndpointUnavailable(_)));
}

#[tokio::test]
async fn test_client_connects_through_endpoint_index() {
    let mut gateway = MockGateway::start().await.unwrap();
    let client = GatewayClient::builder(fast_config())
        .resolver(HttpEndpointResolver::new(gateway.api_base_url(), TEST_TOKEN, true))
        .build()
        .unwrap();

    client.connect().await.unwrap();
    let _server = gateway.accept_hello("session-1").await;
    wait_state(&client, ConnectionState::Authenticated).await;

    assert_eq!(gateway.index_requests().len(), 1);
    assert_eq!(client.session().unwrap().endpoint_url, gateway.ws_url());
}
