// Integration tests for Kindred: HTTP end to end over the in-memory store

use actix_web::body::MessageBody;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

use kindred::auth::TokenVerifier;
use kindred::clock::{Clock, SystemClock};
use kindred::core::RankerSettings;
use kindred::models::{Coordinates, Profile};
use kindred::realtime::{PresenceBoard, RealtimeSettings, FALLBACK_HEADER};
use kindred::routes::{configure_routes, AppState};
use kindred::services::{MemoryStore, NoPhotos, Store};

const SECRET: &str = "integration-secret";

fn create_test_profile(id: &str, gender: &str, interests: &[&str], completion: u8) -> Profile {
    Profile {
        user_id: id.to_string(),
        display_name: format!("User {}", id),
        age: 29,
        gender: Some(gender.to_string()),
        gender_interests: interests.iter().map(|s| s.to_string()).collect(),
        tags: vec!["#coffee".to_string(), "#jazz".to_string()],
        location: Some(Coordinates::new(52.52, 13.405)),
        completion,
        created_at: Utc::now() - Duration::minutes(5),
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    state: web::Data<AppState>,
    verifier: web::Data<TokenVerifier>,
}

impl Harness {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_profile(create_test_profile("alice", "female", &["male"], 90))
            .await;
        store
            .upsert_profile(create_test_profile("bob", "male", &["female"], 80))
            .await;
        store
            .upsert_profile(create_test_profile("carol", "female", &["all"], 40))
            .await;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let presence = Arc::new(PresenceBoard::new(clock.clone(), std::time::Duration::from_secs(5)));
        let state = AppState::new(
            store.clone(),
            Arc::new(NoPhotos),
            clock,
            presence,
            RankerSettings::default(),
            RealtimeSettings::default(),
        );

        Self {
            store,
            state: web::Data::new(state),
            verifier: web::Data::new(TokenVerifier::new(SECRET)),
        }
    }

    fn bearer(&self, user_id: &str) -> (header::HeaderName, String) {
        let token = self.verifier.issue(user_id, 3600).unwrap();
        (header::AUTHORIZATION, format!("Bearer {}", token))
    }
}

macro_rules! init_app {
    ($harness:expr) => {
        test::init_service(
            App::new()
                .app_data($harness.state.clone())
                .app_data($harness.verifier.clone())
                .configure(configure_routes),
        )
        .await
    };
}

#[actix_web::test]
async fn test_health_check() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "healthy");

    harness.store.set_available(false);
    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "degraded");
}

#[actix_web::test]
async fn test_missing_token_is_unauthorized() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let req = test::TestRequest::get().uri("/api/v1/discovery/next").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["retry"], "none");
}

#[actix_web::test]
async fn test_incomplete_profile_is_gated() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let req = test::TestRequest::get()
        .uri("/api/v1/discovery/next")
        .insert_header(harness.bearer("carol"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::PRECONDITION_FAILED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "profile_incomplete");
    assert_eq!(body["retry"], "complete_profile");
    assert_eq!(body["details"], json!({ "percentage": 40, "required": 60 }));
}

#[actix_web::test]
async fn test_match_and_conversation_flow() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    // Alice discovers Bob
    let req = test::TestRequest::get()
        .uri("/api/v1/discovery/next")
        .insert_header(harness.bearer("alice"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "candidate");
    assert_eq!(body["candidate"]["userId"], "bob");
    assert_eq!(body["candidate"]["score"]["total"], 250);

    // One-sided like
    let req = test::TestRequest::post()
        .uri("/api/v1/signals/like")
        .insert_header(harness.bearer("alice"))
        .set_json(json!({ "toUser": "bob" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["created"], true);
    assert_eq!(body["matched"], false);

    // Bob likes back
    let req = test::TestRequest::post()
        .uri("/api/v1/signals/like")
        .insert_header(harness.bearer("bob"))
        .set_json(json!({ "toUser": "alice" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["matched"], true);
    let channel_id = body["channelId"].as_str().unwrap().to_string();

    // Alice has no one left to discover
    let req = test::TestRequest::get()
        .uri("/api/v1/discovery/next")
        .insert_header(harness.bearer("alice"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "status": "no_profiles" }));

    // Both sides see the channel
    for user in ["alice", "bob"] {
        let req = test::TestRequest::get()
            .uri("/api/v1/channels")
            .insert_header(harness.bearer(user))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["channels"][0]["channelId"], channel_id.as_str());
    }

    // Alice writes, Bob reads
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/channels/{}/messages", channel_id))
        .insert_header(harness.bearer("alice"))
        .set_json(json!({ "text": "  hi bob  " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let message: Value = test::read_body_json(resp).await;
    assert_eq!(message["body"], "hi bob");
    assert_eq!(message["read"], false);

    let req = test::TestRequest::get()
        .uri("/api/v1/channels")
        .insert_header(harness.bearer("bob"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["channels"][0]["unreadCount"], 1);
    assert_eq!(body["channels"][0]["otherDisplayName"], "User alice");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/channels/{}/messages", channel_id))
        .insert_header(harness.bearer("bob"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"][0]["read"], true);
    assert!(body["messages"][0]["readAt"].is_string());
}

#[actix_web::test]
async fn test_conflicting_signal_and_self_like() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/v1/signals/pass")
        .insert_header(harness.bearer("alice"))
        .set_json(json!({ "toUser": "bob" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/v1/signals/like")
        .insert_header(harness.bearer("alice"))
        .set_json(json!({ "toUser": "bob" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["details"]["existing"], "pass");

    let req = test::TestRequest::post()
        .uri("/api/v1/signals/like")
        .insert_header(harness.bearer("alice"))
        .set_json(json!({ "toUser": "alice" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_blocked_user_is_hidden_from_discovery() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/v1/blocks")
        .insert_header(harness.bearer("alice"))
        .set_json(json!({ "userId": "bob" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["blocked"], true);

    let req = test::TestRequest::get()
        .uri("/api/v1/discovery/next")
        .insert_header(harness.bearer("alice"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "no_profiles");
}

#[actix_web::test]
async fn test_non_member_gets_not_found_and_typing_is_shared() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    for (from, to) in [("alice", "bob"), ("bob", "alice")] {
        let req = test::TestRequest::post()
            .uri("/api/v1/signals/like")
            .insert_header(harness.bearer(from))
            .set_json(json!({ "toUser": to }))
            .to_request();
        test::call_service(&app, req).await;
    }
    let channel_id = harness.state.store.find_channel_between("alice", "bob").await.unwrap().unwrap().id;

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/channels/{}/messages", channel_id))
        .insert_header(harness.bearer("carol"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/v1/presence/typing")
        .insert_header(harness.bearer("alice"))
        .set_json(json!({ "channelId": channel_id, "typing": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/presence/typing?channelId={}", channel_id))
        .insert_header(harness.bearer("bob"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["typing"], json!(["alice"]));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/presence/typing?channelId={}", channel_id))
        .insert_header(harness.bearer("carol"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_match_stream_opens_with_retry_frame() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let token = harness.verifier.issue("alice", 3600).unwrap();
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/channels/stream?access_token={}", token))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(resp.headers().get(FALLBACK_HEADER).unwrap().to_str().unwrap(), "7");

    let body = resp.into_body();
    let mut body = std::pin::pin!(body);
    let first = std::future::poll_fn(|cx| body.as_mut().poll_next(cx)).await;
    match first {
        Some(Ok(bytes)) => assert_eq!(bytes, web::Bytes::from("retry: 7000\n\n")),
        _ => panic!("expected the retry frame"),
    }
}

#[actix_web::test]
async fn test_empty_target_fails_validation() {
    let harness = Harness::new().await;
    let app = init_app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/v1/signals/like")
        .insert_header(harness.bearer("alice"))
        .set_json(json!({ "toUser": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["retry"], "fix_input");
}
