//! Webhook delivery and notification against a local receiver.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use longform_core::job::{Job, JobStatus};
use longform_events::{EventBus, JobEvent, WebhookDelivery, WebhookError, WebhookNotifier};

#[derive(Clone, Default)]
struct Receiver {
    /// Attempts to reject with 503 before accepting.
    failures: Arc<Mutex<usize>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn hook(State(receiver): State<Receiver>, Json(body): Json<Value>) -> StatusCode {
    receiver.bodies.lock().unwrap().push(body);
    let mut failures = receiver.failures.lock().unwrap();
    if *failures > 0 {
        *failures -= 1;
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn spawn_receiver(failures: usize) -> (String, Receiver) {
    let receiver = Receiver::default();
    *receiver.failures.lock().unwrap() = failures;
    let app = Router::new()
        .route("/hook", post(hook))
        .with_state(receiver.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), receiver)
}

fn fast_delivery() -> WebhookDelivery {
    WebhookDelivery::new().with_retry_delays(vec![Duration::from_millis(10); 3])
}

fn completed_job(webhook_url: Option<&str>) -> Job {
    let now = Utc::now();
    let mut params = json!({"title": "Tea", "target_minutes": 35});
    if let Some(url) = webhook_url {
        params["webhook_url"] = json!(url);
    }
    Job {
        id: 21,
        parent_request_id: 4,
        owner_id: 2,
        status: JobStatus::Completed,
        progress: 100,
        current_chunk: 3,
        total_chunks: 3,
        current_step: "completed".into(),
        generation_params: params,
        priority: 0,
        retry_count: 0,
        max_retries: 3,
        error_message: None,
        result: Some(json!({"script": "text", "word_count": 5100, "chunk_count": 3})),
        elapsed_secs: Some(200),
        created_at: now,
        started_at: Some(now),
        completed_at: Some(now),
        updated_at: now,
    }
}

#[tokio::test]
async fn delivery_retries_until_accepted() {
    let (url, receiver) = spawn_receiver(2).await;
    let event = JobEvent::completed(&completed_job(None));

    fast_delivery().deliver(&url, &event).await.unwrap();

    let bodies = receiver.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[2]["event_type"], "job.completed");
    assert_eq!(bodies[2]["job_id"], 21);
    assert_eq!(bodies[2]["payload"]["word_count"], 5100);
}

#[tokio::test]
async fn delivery_gives_up_after_the_last_retry() {
    let (url, receiver) = spawn_receiver(10).await;
    let event = JobEvent::completed(&completed_job(None));

    let err = fast_delivery().deliver(&url, &event).await.unwrap_err();

    assert!(matches!(err, WebhookError::HttpStatus(503)));
    assert_eq!(receiver.bodies.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn notifier_forwards_only_events_with_a_webhook() {
    let (url, receiver) = spawn_receiver(0).await;
    let bus = EventBus::default();
    let task = tokio::spawn(WebhookNotifier::run(
        Arc::new(fast_delivery()),
        bus.subscribe(),
    ));

    bus.publish(JobEvent::failed(&completed_job(None)));
    bus.publish(JobEvent::completed(&completed_job(Some(&url))));

    for _ in 0..100 {
        if !receiver.bodies.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    drop(bus);
    task.await.unwrap();

    let bodies = receiver.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["event_type"], "job.completed");
    assert!(bodies[0].get("webhook_url").is_none());
}
