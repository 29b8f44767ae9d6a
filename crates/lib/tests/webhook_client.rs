//! Webhook client against a local HTTP server: request shape, reply parsing, and each error kind.

mod common;

use bridge::webhook::{WebhookClient, WebhookError};
use common::{closed_port_url, spawn_slow_webhook, spawn_webhook};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn posts_sender_and_message_as_json() {
    let hook = spawn_webhook(200, r#"{"message":"hi there"}"#).await;
    let client = WebhookClient::new(&hook.url, TIMEOUT).unwrap();

    let reply = client.notify("+1555@x", "hello").await.unwrap();

    assert_eq!(reply.as_deref(), Some("hi there"));
    let requests = hook.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(
        requests[0].body,
        serde_json::json!({"sender": "+1555@x", "message": "hello"})
    );
}

#[tokio::test]
async fn empty_or_missing_reply_is_none() {
    for body in [r#"{"message":""}"#, "{}", r#"{"message":null}"#, r#"{"status":"queued"}"#] {
        let hook = spawn_webhook(200, body).await;
        let client = WebhookClient::new(&hook.url, TIMEOUT).unwrap();
        assert_eq!(client.notify("a", "b").await.unwrap(), None, "body {}", body);
    }
}

#[tokio::test]
async fn non_200_status_is_reported_with_its_code() {
    for status in [500, 404, 201] {
        let hook = spawn_webhook(status, r#"{"message":"ignored"}"#).await;
        let client = WebhookClient::new(&hook.url, TIMEOUT).unwrap();
        match client.notify("a", "b").await {
            Err(WebhookError::Status(code)) => assert_eq!(code, status),
            other => panic!("expected status error for {}, got {:?}", status, other),
        }
    }
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    for body in ["<html>oops</html>", r#"{"message": 42}"#, ""] {
        let hook = spawn_webhook(200, body).await;
        let client = WebhookClient::new(&hook.url, TIMEOUT).unwrap();
        assert!(
            matches!(client.notify("a", "b").await, Err(WebhookError::Decode(_))),
            "body {}",
            body
        );
    }
}

#[tokio::test]
async fn slow_webhook_times_out() {
    let hook = spawn_slow_webhook(200, r#"{"message":"late"}"#, Duration::from_secs(3)).await;
    let client = WebhookClient::new(&hook.url, Duration::from_millis(200)).unwrap();
    assert!(matches!(
        client.notify("a", "b").await,
        Err(WebhookError::Timeout(_))
    ));
}

#[tokio::test]
async fn unreachable_webhook_is_a_transport_error() {
    let client = WebhookClient::new(closed_port_url(), TIMEOUT).unwrap();
    assert!(matches!(
        client.notify("a", "b").await,
        Err(WebhookError::Transport(_))
    ));
}
