use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use feedmix::api::{create_router, AppState};
use feedmix::config::{AppConfig, GaConfig, MAX_GENERATIONS};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_app() -> (Router, Arc<AppState>) {
    let mut config = AppConfig::default();
    config.evolution = GaConfig::default().with_seed(17);
    let state = Arc::new(AppState::new(&config));
    (create_router(Arc::clone(&state)), state)
}

fn corn_soy_body(max_gen: usize) -> Value {
    json!({
        "feeds": [
            {"name": "corn", "price": 3000, "prdd": 0.6, "mp": 0.08},
            {"name": "soy", "price": 6000, "prdd": 0.5, "mp": 0.4}
        ],
        "required_prdd": 50,
        "required_mp": 10,
        "pop_size": 20,
        "max_gen": max_gen,
        "crossover_rate": 0.3,
        "mutation_rate": 0.3
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_config_endpoint() {
    let (app, _) = test_app();
    let (status, body) = send(&app, get("/api/config")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feeds"].as_array().unwrap().len(), 4);
    assert_eq!(body["feeds"][0]["name"], "Alang-alang");
    assert_eq!(body["feeds"][0]["price"], 500.0);
    assert_eq!(body["requirements"]["prdd"], 1.036);
    assert_eq!(body["requirements"]["mp"], 7.5);
    assert_eq!(body["parameters"]["pop_size"], 100);
    assert_eq!(body["parameters"]["max_gen"], 200);
    assert_eq!(body["constraints"]["gen_min"], 0.0);
}

#[tokio::test]
async fn test_result_before_any_run_is_not_found() {
    let (app, _) = test_app();
    let (status, body) = send(&app, get("/api/result")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No result available");
}

#[tokio::test]
async fn test_invalid_input_is_bad_request() {
    let (app, state) = test_app();

    let (status, body) = send(&app, post_json("/api/run", &json!({"feeds": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let (status, _) = send(&app, post_json("/api/run", &json!({"required_prdd": -1}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/run")
        .body(Body::from("{oops"))
        .unwrap();
    let (status, _) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was started
    let (status, _) = send(&app, get("/api/result")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(state.orchestrator.poll_result(), feedmix::services::RunStatus::Idle);
}

#[tokio::test]
async fn test_cancel_without_run_conflicts() {
    let (app, _) = test_app();
    let (status, body) = send(&app, post_json("/api/cancel", &Value::Null)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_running");
}

#[tokio::test]
async fn test_run_lifecycle() {
    let (app, state) = test_app();

    let mut long_run = corn_soy_body(MAX_GENERATIONS);
    long_run["pop_size"] = json!(2_000);
    let (status, body) = send(&app, post_json("/api/run", &long_run)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");
    assert_eq!(body["total_gen"], MAX_GENERATIONS);
    let run_id = body["run_id"].as_u64().unwrap();

    // Still running: pending result, second start rejected
    let (status, _) = send(&app, get("/api/result")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, body) = send(&app, post_json("/api/run", &corn_soy_body(10))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_running");

    let (status, body) = send(&app, post_json("/api/cancel", &Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run_id"], run_id);
    let _ = state.orchestrator.wait_for(run_id).await;

    let (status, body) = send(&app, get("/api/result")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "run cancelled"}));
}

#[tokio::test]
async fn test_completed_result_shape() {
    let (app, state) = test_app();

    let (status, body) = send(&app, post_json("/api/run", &corn_soy_body(30))).await;
    assert_eq!(status, StatusCode::OK);
    let run_id = body["run_id"].as_u64().unwrap();
    state.orchestrator.wait_for(run_id).await.unwrap();

    let (status, body) = send(&app, get("/api/result")).await;
    assert_eq!(status, StatusCode::OK);
    for key in ["fitness", "totals", "requirements", "composition", "history", "top_solutions"] {
        assert!(body.get(key).is_some(), "missing {}", key);
    }
    for key in ["cost", "weight", "prdd", "mp"] {
        assert!(body["totals"].get(key).is_some(), "missing totals.{}", key);
    }
    let line = &body["composition"][0];
    for key in [
        "name",
        "amount",
        "weight_percentage",
        "cost",
        "cost_percentage",
        "price",
        "prdd_contribution",
        "mp_contribution",
    ] {
        assert!(line.get(key).is_some(), "missing composition.{}", key);
    }
    assert_eq!(body["history"].as_array().unwrap().len(), 30);
    assert_eq!(body["top_solutions"].as_array().unwrap().len(), 5);
    assert_eq!(body["top_solutions"][0]["rank"], 1);

    // Repeated polls return the same body
    let (_, again) = send(&app, get("/api/result")).await;
    assert_eq!(body, again);
}

#[tokio::test]
async fn test_optimize_blocks_until_done() {
    let (app, _) = test_app();
    let (status, body) = send(&app, post_json("/optimize", &corn_soy_body(30))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generations"], 30);
    assert_eq!(body["status"]["prdd"], true);
    assert_eq!(body["status"]["mp"], true);
    assert_eq!(body["top_solutions"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_progress_stream_events() {
    let (app, _) = test_app();

    // Subscribe first, then start
    let response = app.clone().oneshot(get("/api/progress")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

    let (status, _) = send(&app, post_json("/api/run", &corn_soy_body(12))).await;
    assert_eq!(status, StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let events: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect();

    assert_eq!(events.len(), 12);
    assert_eq!(events[0]["current_gen"], 1);
    assert_eq!(events[11]["current_gen"], 12);
    assert_eq!(events[11]["total_gen"], 12);
    assert_eq!(events[11]["progress_percent"], 100.0);
}

#[tokio::test]
async fn test_progress_after_finished_run_ends() {
    let (app, _) = test_app();

    // Run first, then open the stream
    let (status, _) = send(&app, post_json("/optimize", &corn_soy_body(12))).await;
    assert_eq!(status, StatusCode::OK);

    let response = app.clone().oneshot(get("/api/progress")).await.unwrap();
    let bytes = tokio::time::timeout(
        Duration::from_secs(10),
        to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("stream ends after a finished run")
    .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let events = text.lines().filter(|line| line.starts_with("data:")).count();

    assert_eq!(events, 12);
}
