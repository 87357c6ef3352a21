//! Common test utilities for integration tests.
//!
//! Provides an in-process stub of the portal REST backend and helpers for
//! building the client against it.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use club_portal_client::app::App;
use club_portal_client::config::Config;
use club_portal_client::services::HttpRegistrationBackend;
use persistence::FileStore;
use serde_json::{json, Value};

/// A request received by the stub backend.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Value,
    pub authorization: Option<String>,
}

#[derive(Clone, Default)]
pub struct StubState {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    failing: Arc<AtomicBool>,
    delay_ms: Arc<AtomicU64>,
    registrations: Arc<Mutex<Value>>,
    events: Arc<Mutex<Value>>,
}

impl StubState {
    fn record(&self, method: &'static str, path: String, body: Value, headers: &HeaderMap) {
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            path,
            body,
            authorization,
        });
    }

    async fn stall(&self) {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    fn status(&self) -> StatusCode {
        if self.failing.load(Ordering::SeqCst) {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        }
    }
}

/// Running stub backend.
pub struct StubBackend {
    pub base_url: String,
    state: StubState,
}

impl StubBackend {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.path == path).collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Delays every response by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_registrations(&self, registrations: Value) {
        *self.state.registrations.lock().unwrap() = registrations;
    }

    pub fn set_events(&self, events: Value) {
        *self.state.events.lock().unwrap() = events;
    }
}

async fn register(
    State(state): State<StubState>,
    UrlPath(event_id): UrlPath<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("POST", format!("/events/{}/register", event_id), body, &headers);
    state.stall().await;
    (state.status(), Json(json!({"status": "ok"})))
}

async fn attendance(
    State(state): State<StubState>,
    UrlPath(event_id): UrlPath<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("POST", format!("/events/{}/attendance", event_id), body, &headers);
    state.stall().await;
    (state.status(), Json(json!({"status": "ok"})))
}

async fn list_registrations(
    State(state): State<StubState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.record("GET", "/registrations".to_string(), Value::Null, &headers);
    let body = state.registrations.lock().unwrap().clone();
    (state.status(), Json(if body.is_null() { json!([]) } else { body }))
}

async fn list_events(State(state): State<StubState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    state.record("GET", "/events".to_string(), Value::Null, &headers);
    let body = state.events.lock().unwrap().clone();
    (state.status(), Json(if body.is_null() { json!([]) } else { body }))
}

/// Starts a stub backend on an ephemeral local port.
pub async fn spawn_stub_backend() -> StubBackend {
    let state = StubState::default();
    let router = Router::new()
        .route("/api/v1/events", get(list_events))
        .route("/api/v1/events/:id/register", post(register))
        .route("/api/v1/events/:id/attendance", post(attendance))
        .route("/api/v1/registrations", get(list_registrations))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub backend");
    let addr = listener.local_addr().expect("Stub backend has no address");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Stub backend failed");
    });

    StubBackend {
        base_url: format!("http://{}/api/v1", addr),
        state,
    }
}

/// Test configuration pointing at `base_url`.
pub fn test_config(base_url: &str) -> Config {
    Config::load_for_test(&[
        ("backend.base_url", base_url),
        ("backend.timeout_secs", "2"),
        ("backend.api_token", "test-token"),
    ])
    .expect("Failed to load config")
}

/// App over a file store in `data_dir` and the HTTP backend at `base_url`.
pub fn create_test_app(base_url: &str, data_dir: &Path) -> App {
    let config = test_config(base_url);
    let storage = Arc::new(FileStore::open(data_dir).expect("Failed to open file store"));
    let backend = Arc::new(
        HttpRegistrationBackend::new(&config.backend).expect("Failed to build HTTP backend"),
    );
    App::with_adapters(config, storage, backend).expect("Failed to build app")
}

/// Runs a CLI command against `app` and returns its output.
pub async fn run_command(app: &App, args: &[&str]) -> String {
    use clap::Parser;

    let mut argv = vec!["club-portal"];
    argv.extend_from_slice(args);
    let cli = club_portal_client::cli::Cli::try_parse_from(argv).expect("Invalid test command");

    let mut out = Vec::new();
    club_portal_client::cli::execute(app, cli.command, &mut out)
        .await
        .expect("Command failed");
    String::from_utf8(out).expect("Output is not UTF-8")
}
