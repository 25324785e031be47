//! Webhook dispatch for escalated alerts.
//!
//! Delivery is fire-and-forget on the runtime: the request that produced
//! the alert never waits on the webhook, and delivery failures are logged
//! and discarded.

use log::{debug, warn};

use crate::core::alerts::AlertNotifier;
use crate::models::Alert;

/// Posts alerts as JSON to a configured webhook URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl AlertNotifier for WebhookNotifier {
    fn notify(&self, alert: &Alert) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("no runtime available, dropping webhook notification");
                return;
            }
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let alert = alert.clone();
        handle.spawn(async move {
            if let Err(e) = client.post(&url).json(&alert).send().await {
                warn!("alert webhook delivery failed: {}", e);
            }
        });
    }
}
