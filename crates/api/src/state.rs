use std::sync::Arc;

use longform_core::research::ResearchPolicy;
use longform_core::store::JobStore;
use longform_events::EventBus;
use longform_pipeline::{ChunkPlanner, OutlineGenerator};
use longform_worker::Scheduler;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: longform_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Job persistence seen through the same trait the scheduler uses.
    pub store: Arc<dyn JobStore>,
    /// Distributes content points across chunks at enqueue time.
    pub planner: Arc<ChunkPlanner>,
    pub outlines: Arc<OutlineGenerator>,
    pub research_policy: Arc<ResearchPolicy>,
    /// Shared with the background loop; `run_once` is safe to call
    /// concurrently.
    pub scheduler: Arc<Scheduler>,
    /// Job lifecycle events, forwarded to webhooks.
    pub event_bus: Arc<EventBus>,
}
