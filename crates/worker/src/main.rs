use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use longform_db::store::PgJobStore;
use longform_events::{EventBus, WebhookDelivery, WebhookNotifier};
use longform_llm::{ChatCompletionsClient, GenerationConfig};
use longform_worker::{Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "longform_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = SchedulerConfig::from_env();
    let generation = GenerationConfig::from_env();
    tracing::info!(
        model = %generation.model,
        budget_secs = config.budget().as_secs(),
        "Loaded worker configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = longform_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    longform_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    longform_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Events ---
    let event_bus = Arc::new(EventBus::default());
    let notifier_handle = tokio::spawn(WebhookNotifier::run(
        Arc::new(WebhookDelivery::new()),
        event_bus.subscribe(),
    ));

    // --- Scheduler ---
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(PgJobStore::new(pool)),
        Arc::new(ChatCompletionsClient::new(generation)),
        Arc::clone(&event_bus),
        config,
    ));

    let cancel = CancellationToken::new();
    let scheduler_handle = {
        let scheduler = Arc::clone(&scheduler);
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install Ctrl-C handler")?;
    tracing::info!("Received shutdown signal, stopping scheduler");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(30), scheduler_handle).await;

    drop(scheduler);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(10), notifier_handle).await;

    tracing::info!("Worker shut down");
    Ok(())
}
