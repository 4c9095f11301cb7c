//! Job lifecycle events and webhook notification.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`]: the event envelope published after a job's state is
//!   persisted.
//! - [`WebhookDelivery`]: HTTP POST with bounded retries.
//! - [`WebhookNotifier`]: forwards events that carry a webhook URL.

pub mod bus;
pub mod delivery;
pub mod notifier;

pub use bus::{EventBus, JobEvent};
pub use delivery::webhook::{WebhookDelivery, WebhookError};
pub use notifier::WebhookNotifier;
