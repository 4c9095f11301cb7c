//! Scheduler passes driven by the API process.
//!
//! The periodic loop and the one-shot passes spawned after an enqueue share
//! one [`Scheduler`]; overlapping passes are safe because claims are atomic.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use longform_core::error::CoreError;
use longform_worker::{RunOutcome, Scheduler};

/// Run the periodic scheduler loop until `cancel` fires.
pub async fn run(scheduler: Arc<Scheduler>, cancel: CancellationToken) {
    scheduler.run(cancel).await;
}

/// Spawn a single `run_once` pass in the background.
///
/// The pass outlives the request that spawned it; its result is only
/// logged.
pub fn spawn_once(scheduler: Arc<Scheduler>) -> JoinHandle<Result<RunOutcome, CoreError>> {
    tokio::spawn(async move {
        let result = scheduler.run_once().await;
        match &result {
            Ok(outcome) => tracing::debug!(?outcome, "Triggered scheduler pass finished"),
            Err(e) => tracing::error!(error = %e, "Triggered scheduler pass failed"),
        }
        result
    })
}
