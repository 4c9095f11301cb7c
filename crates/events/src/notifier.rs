//! Forwards job events to their webhooks.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::bus::JobEvent;
use crate::delivery::webhook::WebhookDelivery;

/// Background service that delivers every event carrying a webhook URL.
///
/// Each delivery runs on its own task so a slow endpoint never holds up
/// the bus or job accounting. Failures are logged by [`WebhookDelivery`].
pub struct WebhookNotifier;

impl WebhookNotifier {
    /// Run until the bus is dropped.
    pub async fn run(delivery: Arc<WebhookDelivery>, mut receiver: broadcast::Receiver<JobEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Some(url) = event.webhook_url.clone() else {
                        continue;
                    };
                    let delivery = Arc::clone(&delivery);
                    tokio::spawn(async move {
                        let _ = delivery.deliver(&url, &event).await;
                    });
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Webhook notifier lagged, some events were not delivered");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, webhook notifier shutting down");
                    break;
                }
            }
        }
    }
}
