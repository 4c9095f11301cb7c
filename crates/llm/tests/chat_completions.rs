//! `ChatCompletionsClient` against a local stand-in for the upstream API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use longform_core::generation::{GenerationError, GenerationRequest, GenerationService};
use longform_llm::{ChatCompletionsClient, GenerationConfig};

#[derive(Clone)]
struct Upstream {
    status: StatusCode,
    delay_ms: u64,
    calls: Arc<AtomicUsize>,
}

async fn completions(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    upstream.calls.fetch_add(1, Ordering::SeqCst);
    if upstream.delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(upstream.delay_ms)).await;
    }
    if upstream.status != StatusCode::OK {
        return (upstream.status, Json(json!({"error": {"message": "upstream says no"}})));
    }

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let echo = format!(
        "model={} auth={} json={} user={}",
        body["model"].as_str().unwrap_or_default(),
        auth,
        body.get("response_format").is_some(),
        body["messages"][1]["content"].as_str().unwrap_or_default(),
    );
    (
        StatusCode::OK,
        Json(json!({
            "choices": [{"message": {"role": "assistant", "content": echo}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 30, "total_tokens": 50}
        })),
    )
}

async fn spawn_upstream(status: StatusCode, delay_ms: u64) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let state = Upstream {
        status,
        delay_ms,
        calls: Arc::clone(&calls),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), calls)
}

fn config(api_url: String, timeout_secs: u64) -> GenerationConfig {
    GenerationConfig {
        api_url,
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        timeout_secs,
        requests_per_minute: 100,
        max_concurrency: 2,
    }
}

#[tokio::test]
async fn successful_call_returns_text_and_usage() {
    let (url, calls) = spawn_upstream(StatusCode::OK, 0).await;
    let client = ChatCompletionsClient::new(config(url, 5));

    let output = client
        .generate(GenerationRequest::new("system", "write chunk 1").json())
        .await
        .unwrap();

    assert!(output.text.contains("model=test-model"));
    assert!(output.text.contains("auth=Bearer test-key"));
    assert!(output.text.contains("json=true"));
    assert!(output.text.contains("user=write chunk 1"));
    assert_eq!(output.usage.prompt_tokens, 20);
    assert_eq!(output.usage.completion_tokens, 30);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn upstream_429_is_rate_limited() {
    let (url, _) = spawn_upstream(StatusCode::TOO_MANY_REQUESTS, 0).await;
    let client = ChatCompletionsClient::new(config(url, 5));

    let err = client
        .generate(GenerationRequest::new("s", "u"))
        .await
        .unwrap_err();
    assert_matches!(err, GenerationError::RateLimited);
}

#[tokio::test]
async fn upstream_503_is_retryable_server_error() {
    let (url, _) = spawn_upstream(StatusCode::SERVICE_UNAVAILABLE, 0).await;
    let client = ChatCompletionsClient::new(config(url, 5));

    let err = client
        .generate(GenerationRequest::new("s", "u"))
        .await
        .unwrap_err();
    assert_matches!(err, GenerationError::Server { status: 503, .. });
    assert!(err.is_retryable());
}

#[tokio::test]
async fn upstream_400_is_fatal() {
    let (url, _) = spawn_upstream(StatusCode::BAD_REQUEST, 0).await;
    let client = ChatCompletionsClient::new(config(url, 5));

    let err = client
        .generate(GenerationRequest::new("s", "u"))
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let (url, _) = spawn_upstream(StatusCode::OK, 2_500).await;
    let client = ChatCompletionsClient::new(config(url, 1));

    let err = client
        .generate(GenerationRequest::new("s", "u"))
        .await
        .unwrap_err();
    assert_matches!(err, GenerationError::Timeout(1));
}

#[tokio::test]
async fn unreachable_upstream_is_a_transport_error() {
    let client = ChatCompletionsClient::new(config("http://127.0.0.1:1/v1".to_string(), 5));
    let err = client
        .generate(GenerationRequest::new("s", "u"))
        .await
        .unwrap_err();
    assert_matches!(err, GenerationError::Transport(_));
}
