use onboard_relay::error::DeliveryError;
use onboard_relay::notify::{Destination, DestinationSpec, Dispatcher, StrategyName};
use onboard_relay::transport::{RateLimitPolicy, SlackClient};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> SlackClient {
    SlackClient::with_base_url(
        "xoxb-test".into(),
        &server.uri(),
        RateLimitPolicy::new(5, Duration::ZERO),
    )
}

fn ok(body: serde_json::Value) -> ResponseTemplate {
    let mut body = body;
    body["ok"] = json!(true);
    ResponseTemplate::new(200).set_body_json(body)
}

fn api_error(code: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "error": code }))
}

async fn mount_lookup(server: &MockServer, email: &str, user_id: &str) {
    Mock::given(method("GET"))
        .and(path("/users.lookupByEmail"))
        .and(query_param("email", email))
        .respond_with(ok(json!({ "user": { "id": user_id } })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn direct_denied_then_conversation_found_by_listing() {
    let server = MockServer::start().await;
    mount_lookup(&server, "ada@example.com", "U-ADA").await;

    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_partial_json(json!({ "channel": "U-ADA" })))
        .respond_with(api_error("not_allowed_token_type"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conversations.open"))
        .respond_with(api_error("missing_scope"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .and(query_param("cursor", "page2"))
        .respond_with(ok(json!({
            "channels": [{ "id": "D-ADA", "user": "U-ADA" }],
            "response_metadata": { "next_cursor": "" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .respond_with(ok(json!({
            "channels": [{ "id": "D-OTHER", "user": "U-OTHER" }],
            "response_metadata": { "next_cursor": "page2" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_partial_json(json!({ "channel": "D-ADA", "text": "welcome" })))
        .respond_with(ok(json!({ "ts": "1.0" })))
        .expect(1)
        .mount(&server)
        .await;

    let slack = client(&server);
    let outcome = Dispatcher::new(&slack)
        .deliver("welcome", &DestinationSpec::Email("ada@example.com".into()))
        .await
        .unwrap();

    assert_eq!(outcome.destination, Destination::DirectId("U-ADA".into()));
    assert_eq!(
        outcome.attempted,
        vec![StrategyName::Direct, StrategyName::OpenOrFind]
    );
    assert_eq!(outcome.succeeded, Some(StrategyName::OpenOrFind));
    assert!(outcome.errors[&StrategyName::Direct].contains("not_allowed_token_type"));
}

#[tokio::test]
async fn unknown_email_reaches_fallback_channel_with_mention() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users.lookupByEmail"))
        .respond_with(api_error("users_not_found"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_partial_json(json!({
            "channel": "C-ONBOARD",
            "text": "(for ghost@example.com) your link"
        })))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let slack = client(&server);
    let outcome = Dispatcher::new(&slack)
        .with_fallback_channel(Some("C-ONBOARD".into()))
        .deliver("your link", &DestinationSpec::Email("ghost@example.com".into()))
        .await
        .unwrap();

    assert!(outcome.used_fallback());
    assert_eq!(outcome.attempted, vec![StrategyName::Broadcast]);
    assert!(
        outcome
            .resolution_error
            .as_deref()
            .unwrap()
            .contains("users_not_found")
    );
}

#[tokio::test]
async fn rate_limit_exhaustion_falls_through_and_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conversations.open"))
        .respond_with(api_error("user_disabled"))
        .expect(1)
        .mount(&server)
        .await;

    let slack = client(&server);
    let err = Dispatcher::new(&slack)
        .deliver("hello", &DestinationSpec::Direct("U-1".into()))
        .await
        .unwrap_err();

    let DeliveryError::Exhausted { attempts, .. } = &err;
    let names: Vec<&str> = attempts.iter().map(|(s, _)| s.as_str()).collect();
    assert_eq!(names, vec!["direct", "open-or-find"]);
    let message = err.to_string();
    assert!(message.contains("chat.postMessage still rate-limited after 5 attempts"));
    assert!(message.contains("conversations.open failed: user_disabled"));
}
