#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceExt;

use longform_api::auth::jwt::{generate_access_token, JwtConfig};
use longform_api::config::ServerConfig;
use longform_api::router::build_app_router;
use longform_api::state::AppState;
use longform_core::chunk_plan::ChunkBrackets;
use longform_core::generation::{
    GenerationError, GenerationOutput, GenerationRequest, GenerationService, GenerationUsage,
};
use longform_core::research::ResearchPolicy;
use longform_core::store::JobStore;
use longform_core::types::DbId;
use longform_db::store::PgJobStore;
use longform_events::EventBus;
use longform_pipeline::{ChunkPlanner, OutlineGenerator};
use longform_worker::{Scheduler, SchedulerConfig};

pub const TRIGGER_SECRET: &str = "test-trigger-secret";
pub const ENQUEUE_LIMIT: i64 = 3;

/// Owner ids used across tests. Principals live outside this service, so
/// any id works.
pub const ALICE: DbId = 101;
pub const BOB: DbId = 202;

/// Build a test `ServerConfig` with safe defaults.
///
/// Enqueue does not trigger a scheduler pass and no loop runs, so tests
/// decide when jobs execute via the trigger endpoint.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        trigger_secret: TRIGGER_SECRET.to_string(),
        enqueue_limit_per_hour: ENQUEUE_LIMIT,
        trigger_on_enqueue: false,
        scheduler_loop: false,
        jwt: JwtConfig {
            secret: "test-jwt-secret-that-is-long-enough".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Stand-in for the text-generation service.
///
/// Chunk distribution prompts get prose back, so planning always takes
/// the deterministic fallback. Other JSON prompts get a three-section
/// outline; script prompts get narration.
pub struct FakeGeneration;

pub const OUTLINE_SECTIONS: [&str; 3] = ["Sunlight Zone", "Twilight Zone", "The Abyss"];

#[async_trait]
impl GenerationService for FakeGeneration {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        let text = if request.user_prompt.starts_with("Distribute") {
            "Here is a plan in prose.".to_string()
        } else if request.json_response {
            json!({
                "title": "Deep Sea",
                "sections": OUTLINE_SECTIONS
                    .iter()
                    .map(|t| json!({"title": t, "description": "", "estimated_minutes": 12.0}))
                    .collect::<Vec<_>>(),
            })
            .to_string()
        } else {
            "Narration text.".to_string()
        };
        Ok(GenerationOutput {
            text,
            usage: GenerationUsage {
                prompt_tokens: 10,
                completion_tokens: 2,
            },
        })
    }
}

/// Rejects every call, as a misconfigured upstream would.
pub struct BrokenGeneration;

#[async_trait]
impl GenerationService for BrokenGeneration {
    async fn generate(&self, _request: GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        Err(GenerationError::Malformed("401: invalid api key".into()))
    }
}

pub fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, test_config(), Arc::new(FakeGeneration))
}

/// Build the full application router over `pool` with the given config and
/// generation service, through the same [`build_app_router`] production
/// uses.
pub fn build_test_app_with(
    pool: PgPool,
    config: ServerConfig,
    service: Arc<dyn GenerationService>,
) -> Router {
    let brackets = ChunkBrackets::default();
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let event_bus = Arc::new(EventBus::default());
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&service),
        Arc::clone(&event_bus),
        SchedulerConfig::default(),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        store,
        planner: Arc::new(ChunkPlanner::new(Arc::clone(&service), brackets.clone())),
        outlines: Arc::new(OutlineGenerator::new(service, brackets)),
        research_policy: Arc::new(ResearchPolicy::default()),
        scheduler,
        event_bus,
    };

    build_app_router(state, &config)
}

pub fn token_for(user_id: DbId) -> String {
    generate_access_token(user_id, &test_config().jwt).expect("token generation should succeed")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("request should complete")
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn json_auth(app: Router, method: Method, uri: &str, body: Value, token: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    json_auth(app, Method::POST, uri, body, token).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    json_auth(app, Method::PUT, uri, body, token).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_trigger(app: Router, secret: Option<&str>) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/internal/trigger");
    if let Some(secret) = secret {
        builder = builder.header("x-trigger-secret", secret);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Create a script request owned by `owner` and return its id.
pub async fn create_request(pool: &PgPool, owner: DbId, target_minutes: i32) -> DbId {
    let app = build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/script-requests",
        json!({"title": "Deep Sea", "topic": "ocean life", "target_minutes": target_minutes}),
        &token_for(owner),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["id"]
        .as_i64()
        .expect("request id")
}

/// Attach enough selected research for scripts up to 45 minutes.
pub async fn add_adequate_research(pool: &PgPool, owner: DbId, request_id: DbId) {
    for (i, source_type) in ["web", "book", "paper"].iter().enumerate() {
        let app = build_test_app(pool.clone());
        let response = post_json_auth(
            app,
            &format!("/api/v1/script-requests/{request_id}/sources"),
            json!({
                "source_type": source_type,
                "title": format!("Source {i}"),
                "word_count": 800,
                "quality_score": 0.8,
            }),
            &token_for(owner),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    }
}

/// Generate and approve an outline for a 35-minute script; returns its id.
pub async fn approved_outline(pool: &PgPool, owner: DbId, request_id: DbId) -> DbId {
    add_adequate_research(pool, owner, request_id).await;

    let app = build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/script-requests/{request_id}/outline"),
        json!({"total_minutes": 35}),
        &token_for(owner),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let outline_id = body_json(response).await["data"]["outline_id"]
        .as_i64()
        .expect("outline id");

    let app = build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        "/api/v1/outlines/review",
        json!({"outline_id": outline_id, "status": "approved"}),
        &token_for(owner),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    outline_id
}
