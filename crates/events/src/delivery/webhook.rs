//! Webhook delivery with exponential-backoff retry.
//!
//! [`WebhookDelivery`] POSTs a JSON-encoded [`JobEvent`] to the URL the
//! job was enqueued with. A failed attempt is retried after 1 s, 2 s and
//! 4 s; after that the failure is logged and given up on.

use std::time::Duration;

use crate::bus::JobEvent;

const RETRY_DELAYS_SECS: [u64; 3] = [1, 2, 4];

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Network, DNS, or timeout failure.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

pub struct WebhookDelivery {
    client: reqwest::Client,
    retry_delays: Vec<Duration>,
}

impl WebhookDelivery {
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialised.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            retry_delays: RETRY_DELAYS_SECS.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    /// Replace the backoff schedule. One retry per entry.
    pub fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    /// Deliver `event` to `url`, retrying on any failure.
    ///
    /// Returns the last error once every retry is spent.
    pub async fn deliver(&self, url: &str, event: &JobEvent) -> Result<(), WebhookError> {
        let mut attempt = 1;
        let mut delays = self.retry_delays.iter();
        loop {
            match self.try_send(url, event).await {
                Ok(()) => {
                    tracing::debug!(url, job_id = event.job_id, attempt, "Webhook delivered");
                    return Ok(());
                }
                Err(e) => match delays.next() {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            url,
                            job_id = event.job_id,
                            error = %e,
                            "Webhook delivery attempt failed, retrying"
                        );
                        tokio::time::sleep(*delay).await;
                        attempt += 1;
                    }
                    None => {
                        tracing::error!(
                            url,
                            job_id = event.job_id,
                            error = %e,
                            "Webhook delivery failed after all retries"
                        );
                        return Err(e);
                    }
                },
            }
        }
    }

    async fn try_send(&self, url: &str, event: &JobEvent) -> Result<(), WebhookError> {
        let response = self.client.post(url).json(event).send().await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

impl Default for WebhookDelivery {
    fn default() -> Self {
        Self::new()
    }
}
