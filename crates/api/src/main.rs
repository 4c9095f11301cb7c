use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use longform_api::background;
use longform_api::config::ServerConfig;
use longform_api::router::build_app_router;
use longform_api::state::AppState;
use longform_core::chunk_plan::ChunkBrackets;
use longform_core::generation::GenerationService;
use longform_core::research::ResearchPolicy;
use longform_core::store::JobStore;
use longform_db::store::PgJobStore;
use longform_events::{EventBus, WebhookDelivery, WebhookNotifier};
use longform_llm::{ChatCompletionsClient, GenerationConfig};
use longform_pipeline::{ChunkPlanner, OutlineGenerator};
use longform_worker::{Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "longform_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let scheduler_config = SchedulerConfig::from_env();
    let generation_config = GenerationConfig::from_env();
    let brackets = ChunkBrackets::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        model = %generation_config.model,
        scheduler_loop = config.scheduler_loop,
        "Loaded server configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = longform_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    longform_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    longform_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let notifier_handle = tokio::spawn(WebhookNotifier::run(
        Arc::new(WebhookDelivery::new()),
        event_bus.subscribe(),
    ));
    tracing::info!("Event bus and webhook notifier started");

    // --- Pipeline ---
    let service: Arc<dyn GenerationService> =
        Arc::new(ChatCompletionsClient::new(generation_config));
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&service),
        Arc::clone(&event_bus),
        scheduler_config,
    ));

    let cancel = CancellationToken::new();
    let scheduler_handle = config.scheduler_loop.then(|| {
        tokio::spawn(background::scheduler::run(
            Arc::clone(&scheduler),
            cancel.clone(),
        ))
    });

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        store,
        planner: Arc::new(ChunkPlanner::new(Arc::clone(&service), brackets.clone())),
        outlines: Arc::new(OutlineGenerator::new(service, brackets)),
        research_policy: Arc::new(ResearchPolicy::default()),
        scheduler,
        event_bus: Arc::clone(&event_bus),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    cancel.cancel();
    if let Some(handle) = scheduler_handle {
        let _ = tokio::time::timeout(shutdown_timeout, handle).await;
        tracing::info!("Scheduler loop stopped");
    }

    // Dropping the last sender closes the channel and ends the notifier.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(10), notifier_handle).await;
    tracing::info!("Webhook notifier shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
