use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use relay_bot::{
    AppState,
    cache::StoreBackend,
    clock::ManualClock,
    config::Config,
    error::RelayError,
    relay::{ActorContext, Answer, ChatBackend, Messenger, OutboundAnswer},
    router::build_router,
    utils::notices,
};
use serde_json::{Value, json};
use tower::ServiceExt;

struct EchoBackend;

#[async_trait]
impl ChatBackend for EchoBackend {
    async fn ask(&self, question: &str, _actor: &ActorContext) -> Result<Answer, RelayError> {
        Ok(Answer {
            text: format!("You asked: {question}"),
            sources: vec!["kb/getting-started".into()],
        })
    }
}

/// Takes a while to answer, like a busy chat backend.
struct SlowBackend(Duration);

#[async_trait]
impl ChatBackend for SlowBackend {
    async fn ask(&self, question: &str, _actor: &ActorContext) -> Result<Answer, RelayError> {
        tokio::time::sleep(self.0).await;
        Ok(Answer {
            text: format!("Eventually: {question}"),
            sources: Vec::new(),
        })
    }
}

#[derive(Default)]
struct Outbox {
    answers: Mutex<Vec<OutboundAnswer>>,
    notices: Mutex<Vec<String>>,
}

#[async_trait]
impl Messenger for Outbox {
    async fn post_answer(&self, answer: &OutboundAnswer) -> Result<(), RelayError> {
        self.answers.lock().unwrap().push(answer.clone());
        Ok(())
    }

    async fn post_notice(&self, _c: &str, _a: &str, text: &str) -> Result<(), RelayError> {
        self.notices.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn still_working(&self, _c: &str, _t: Option<&str>) -> Result<(), RelayError> {
        Ok(())
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    clock: ManualClock,
    outbox: Arc<Outbox>,
}

async fn app(max_requests: u32) -> TestApp {
    app_with(max_requests, Arc::new(EchoBackend)).await
}

async fn app_with(max_requests: u32, backend: Arc<dyn ChatBackend>) -> TestApp {
    let config = Config {
        rate_limit_max_requests: max_requests,
        chat_backend_url: "http://chat.test/ask".into(),
        messenger_url: "http://platform.test/post".into(),
        ..Config::default()
    };
    let clock = ManualClock::new(1_700_000_000_000);
    let outbox = Arc::new(Outbox::default());
    let state = AppState::assemble(
        config,
        Arc::new(clock.clone()),
        backend,
        outbox.clone(),
    )
    .await;
    TestApp {
        router: build_router(state.clone()),
        state,
        clock,
        outbox,
    }
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

/// Lets spawned event tasks run to completion.
async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
}

fn message(event_id: &str, actor: &str, text: &str) -> Value {
    json!({
        "event_id": event_id,
        "actor_id": actor,
        "channel_id": "C42",
        "thread_id": "1700000000.000100",
        "text": text,
    })
}

#[tokio::test]
async fn message_event_is_acknowledged_then_answered() {
    let app = app(30).await;
    let (status, body) = post(&app.router, "/events/message", message("e1", "U1", "hi")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["code"], 0);
    assert_eq!(body["content"]["event_id"], "e1");

    settle().await;
    let answers = app.outbox.answers.lock().unwrap().clone();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].text, "You asked: hi");
    assert_eq!(answers[0].channel_id, "C42");

    app.state.shutdown().await;
}

#[tokio::test]
async fn redelivered_event_is_answered_once() {
    let app = app(30).await;
    for _ in 0..3 {
        post(&app.router, "/events/message", message("e1", "U1", "hi")).await;
    }
    settle().await;
    assert_eq!(app.outbox.answers.lock().unwrap().len(), 1);

    app.state.shutdown().await;
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let app = app(30).await;
    let (status, body) = post(&app.router, "/events/message", message("e1", "U1", "  ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1000);

    app.state.shutdown().await;
}

#[tokio::test]
async fn feedback_round_trip_and_expiry() {
    let app = app(30).await;
    post(&app.router, "/events/message", message("e1", "U1", "first")).await;
    post(&app.router, "/events/message", message("e2", "U1", "second")).await;
    settle().await;

    let answers = app.outbox.answers.lock().unwrap().clone();
    assert_eq!(answers.len(), 2);

    let (status, _) = post(
        &app.router,
        "/events/feedback",
        json!({
            "event_id": "f1",
            "actor_id": "U1",
            "channel_id": "C42",
            "response_id": answers[0].response_id.clone(),
            "sentiment": "positive",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    settle().await;
    assert_eq!(
        app.outbox.notices.lock().unwrap().last().map(String::as_str),
        Some(notices::FEEDBACK_THANKS)
    );

    app.clock.advance(600_001);
    post(
        &app.router,
        "/events/feedback",
        json!({
            "event_id": "f2",
            "actor_id": "U1",
            "channel_id": "C42",
            "response_id": answers[1].response_id.clone(),
            "sentiment": "negative",
        }),
    )
    .await;
    settle().await;
    assert_eq!(
        app.outbox.notices.lock().unwrap().last().map(String::as_str),
        Some(notices::SESSION_EXPIRED)
    );

    app.state.shutdown().await;
}

#[tokio::test]
async fn rate_limited_actor_gets_a_wait_notice_and_health_counts_it() {
    let app = app(2).await;
    for i in 0..3 {
        post(
            &app.router,
            "/events/message",
            message(&format!("e{i}"), "U1", "again"),
        )
        .await;
        settle().await;
    }

    assert_eq!(app.outbox.answers.lock().unwrap().len(), 2);
    let notices = app.outbox.notices.lock().unwrap().clone();
    assert!(notices.iter().any(|n| n.contains("60 seconds")));

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value =
        serde_json::from_slice(&to_bytes(response.into_body(), 64 * 1024).await.unwrap()).unwrap();
    assert_eq!(body["content"]["rate_limit_store"], "local");
    assert_eq!(body["content"]["metrics"]["rate_limit_hits"], 1);
    assert_eq!(body["content"]["metrics"]["messages"], 3);
    assert_eq!(body["content"]["tracked_events"], 3);

    assert_eq!(app.state.relay.guards().limiter.backend(), StoreBackend::Local);
    app.state.shutdown().await;
}

#[tokio::test]
async fn shutdown_waits_for_answers_in_flight() {
    let app = app_with(30, Arc::new(SlowBackend(Duration::from_millis(200)))).await;
    let (status, _) = post(&app.router, "/events/message", message("e1", "U1", "slow")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(app.outbox.answers.lock().unwrap().is_empty());

    app.state.shutdown().await;
    let answers = app.outbox.answers.lock().unwrap().clone();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].text, "Eventually: slow");
}
