//! Integration tests for enqueueing and polling generation jobs.

mod common;

use axum::http::StatusCode;
use axum::response::Response;
use common::{body_json, get_auth, post_json_auth, token_for, ALICE, BOB, ENQUEUE_LIMIT};
use serde_json::{json, Value};
use sqlx::PgPool;

use longform_core::job::{GenerationParams, JobStatus};
use longform_core::types::DbId;
use longform_db::repositories::JobRepo;

async fn enqueue(pool: &PgPool, owner: DbId, body: Value) -> Response {
    let app = common::build_test_app(pool.clone());
    post_json_auth(app, "/api/v1/jobs", body, &token_for(owner)).await
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn enqueue_short_script_creates_pending_job(pool: PgPool) {
    let request_id = common::create_request(&pool, ALICE, 20).await;

    let response = enqueue(
        &pool,
        ALICE,
        json!({
            "request_id": request_id,
            "target_minutes": 20,
            "generation_params": {
                "tone": "warm",
                "audience": "children",
                "content_points": [
                    {"title": "Whales"},
                    {"title": "Squid"},
                    {"title": "Whales"},
                ],
            },
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let job_id = json["data"]["job_id"].as_i64().unwrap();
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["poll_url"], format!("/api/v1/jobs/{job_id}"));

    let job = JobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    // Two unique points cannot fill three chunks.
    assert_eq!(job.total_chunks, 2);
    let params = GenerationParams::from_job(&job).unwrap();
    assert_eq!(params.title, "Deep Sea");
    assert_eq!(params.tone.as_deref(), Some("warm"));
    assert_eq!(params.extra["audience"], "children");
    assert!(!params.extra.contains_key("content_points"));
    let planned: Vec<&str> = params
        .content_plan
        .chunks
        .iter()
        .flat_map(|c| c.assigned_sections.iter().map(|s| s.title.as_str()))
        .collect();
    assert_eq!(planned, vec!["Whales", "Squid"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn duplicate_enqueue_returns_the_active_job(pool: PgPool) {
    let request_id = common::create_request(&pool, ALICE, 10).await;
    let body = json!({"request_id": request_id, "target_minutes": 10});

    let first = enqueue(&pool, ALICE, body.clone()).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let first_id = body_json(first).await["data"]["job_id"].clone();

    let second = enqueue(&pool, ALICE, body).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_json(second).await["data"]["job_id"], first_id);

    assert_eq!(JobRepo::list_for_request(&pool, request_id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn long_scripts_need_an_approved_outline(pool: PgPool) {
    let request_id = common::create_request(&pool, ALICE, 35).await;

    let response = enqueue(
        &pool,
        ALICE,
        json!({"request_id": request_id, "target_minutes": 35}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn long_scripts_plan_from_the_approved_outline(pool: PgPool) {
    let request_id = common::create_request(&pool, ALICE, 35).await;
    let outline_id = common::approved_outline(&pool, ALICE, request_id).await;

    let response = enqueue(
        &pool,
        ALICE,
        json!({"request_id": request_id, "target_minutes": 35, "priority": 5}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let job_id = body_json(response).await["data"]["job_id"].as_i64().unwrap();

    let job = JobRepo::find_by_id(&pool, job_id).await.unwrap().unwrap();
    assert_eq!(job.priority, 5);
    assert_eq!(job.total_chunks, 3);
    let params = GenerationParams::from_job(&job).unwrap();
    assert_eq!(params.outline_id, Some(outline_id));
    let planned: Vec<String> = params
        .content_plan
        .chunks
        .iter()
        .flat_map(|c| c.assigned_sections.iter().map(|s| s.title.clone()))
        .collect();
    assert_eq!(planned, common::OUTLINE_SECTIONS.map(String::from).to_vec());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn long_scripts_must_keep_the_approved_length(pool: PgPool) {
    let request_id = common::create_request(&pool, ALICE, 35).await;
    common::approved_outline(&pool, ALICE, request_id).await;

    let response = enqueue(
        &pool,
        ALICE,
        json!({"request_id": request_id, "target_minutes": 90}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].as_str().unwrap().contains("35 minutes"));
    assert!(JobRepo::list_for_request(&pool, request_id)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn enqueue_validates_input(pool: PgPool) {
    let request_id = common::create_request(&pool, ALICE, 10).await;

    for body in [
        json!({"request_id": request_id, "target_minutes": 0}),
        json!({"request_id": request_id, "target_minutes": 91}),
        json!({"request_id": request_id, "target_minutes": 10, "webhook_url": "ftp://x"}),
        json!({"request_id": request_id, "target_minutes": 10, "generation_params": [1, 2]}),
    ] {
        let response = enqueue(&pool, ALICE, body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body = {body}");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn enqueue_requires_ownership(pool: PgPool) {
    let request_id = common::create_request(&pool, ALICE, 10).await;

    let response = enqueue(
        &pool,
        BOB,
        json!({"request_id": request_id, "target_minutes": 10}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn enqueue_is_rate_limited_per_owner(pool: PgPool) {
    for _ in 0..ENQUEUE_LIMIT {
        let request_id = common::create_request(&pool, ALICE, 5).await;
        let response = enqueue(
            &pool,
            ALICE,
            json!({"request_id": request_id, "target_minutes": 5}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let request_id = common::create_request(&pool, ALICE, 5).await;
    let response = enqueue(
        &pool,
        ALICE,
        json!({"request_id": request_id, "target_minutes": 5}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "RATE_LIMITED");

    // Other owners have their own allowance.
    let request_id = common::create_request(&pool, BOB, 5).await;
    let response = enqueue(
        &pool,
        BOB,
        json!({"request_id": request_id, "target_minutes": 5}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn poll_reports_progress_to_the_owner_only(pool: PgPool) {
    let request_id = common::create_request(&pool, ALICE, 10).await;
    let response = enqueue(
        &pool,
        ALICE,
        json!({"request_id": request_id, "target_minutes": 10}),
    )
    .await;
    let job_id = body_json(response).await["data"]["job_id"].as_i64().unwrap();
    let uri = format!("/api/v1/jobs/{job_id}");

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &token_for(ALICE)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "pending");
    assert_eq!(json["data"]["progress"], 0);
    assert_eq!(json["data"]["current_chunk"], 0);
    assert_eq!(json["data"]["total_chunks"], 3);
    assert!(json["data"].get("result").is_none());

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &uri, &token_for(BOB)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/jobs/999999", &token_for(ALICE)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
