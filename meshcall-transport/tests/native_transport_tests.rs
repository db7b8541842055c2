/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

//! Tests for the native transport clients.
//!
//! These tests verify the API surface and error handling. Tests that require
//! a running signaling server are marked with `#[ignore]`.

mod websocket_tests {
    use meshcall_transport::native_websocket::{NativeWebSocketClient, WebSocketConnectError};

    #[tokio::test]
    async fn test_connect_fails_with_invalid_url() {
        let result = NativeWebSocketClient::connect("not-a-url").await;
        assert!(result.is_err(), "Should fail with invalid URL");
    }

    #[tokio::test]
    async fn test_connect_fails_with_unreachable_server() {
        let result = NativeWebSocketClient::connect("ws://127.0.0.1:1/rooms/test").await;
        assert!(result.is_err(), "Should fail when server is unreachable");
    }

    #[tokio::test]
    async fn test_connect_fails_with_bad_scheme() {
        let result = NativeWebSocketClient::try_connect("ftp://localhost:8080/rooms/test").await;
        assert!(matches!(
            result,
            Err(WebSocketConnectError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_error_message_is_descriptive() {
        let result = NativeWebSocketClient::connect("ws://127.0.0.1:1/nope").await;
        assert!(result.is_err());
        let err_str = format!("{}", result.err().unwrap());
        assert!(
            !err_str.is_empty(),
            "Error should have a descriptive message"
        );
    }

    /// Integration test: requires a running signaling server.
    /// Run manually with: `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_connect_send_close_roundtrip() {
        let (client, _rx) = NativeWebSocketClient::connect("ws://localhost:8080/rooms/test-room")
            .await
            .expect("Failed to connect");

        assert!(client.is_connected());

        client
            .send_text(r#"{"type":"leave"}"#.to_string())
            .await
            .expect("Failed to send");

        client.close().await.expect("Failed to close");
        assert!(!client.is_connected());
    }
}

mod reconnect_tests {
    use meshcall_transport::reconnect::{MessagingEvent, ReconnectPolicy, ReconnectingWebSocket};
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(4),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_bounded_attempts() {
        let (_socket, mut events) =
            ReconnectingWebSocket::spawn("ws://127.0.0.1:1/messages".to_string(), fast_policy(3));

        let mut attempts_seen = Vec::new();
        let gave_up = loop {
            match tokio::time::timeout(Duration::from_secs(10), events.recv()).await {
                Ok(Some(MessagingEvent::Reconnecting { attempt, .. })) => attempts_seen.push(attempt),
                Ok(Some(MessagingEvent::GaveUp { attempts })) => break attempts,
                Ok(Some(other)) => panic!("unexpected event {other:?}"),
                Ok(None) => panic!("event channel closed early"),
                Err(_) => panic!("timed out waiting for GaveUp"),
            }
        };

        assert_eq!(attempts_seen, vec![1, 2, 3]);
        assert_eq!(gave_up, 3);
    }

    #[tokio::test]
    async fn test_shutdown_stops_reconnecting() {
        let (socket, mut events) = ReconnectingWebSocket::spawn(
            "ws://127.0.0.1:1/messages".to_string(),
            ReconnectPolicy {
                initial_delay: Duration::from_secs(60),
                ..ReconnectPolicy::default()
            },
        );

        match tokio::time::timeout(Duration::from_secs(10), events.recv()).await {
            Ok(Some(MessagingEvent::Reconnecting { attempt: 1, .. })) => {}
            other => panic!("expected first reconnect, got {other:?}"),
        }

        socket.shutdown();
        match tokio::time::timeout(Duration::from_secs(10), events.recv()).await {
            Ok(Some(MessagingEvent::Closed)) => {}
            other => panic!("expected Closed after shutdown, got {other:?}"),
        }
    }
}
