//! Failure notification collaborator.

use async_trait::async_trait;
use serde_json::json;

use crate::error::{ApplyError, Result};

/// Delivers a human-facing notification when a namespace apply fails.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, pr_number: u64, build_url: &str) -> Result<()>;
}

/// Slack webhook implementation of [`Notifier`].
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: String,
    token: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, pr_number: u64, build_url: &str) -> Result<()> {
        let payload = json!({
            "text": format!(
                "Namespace apply for PR #{pr_number} failed. Build: {build_url}"
            ),
        });

        let response = self
            .http
            .post(&self.webhook_url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApplyError::Notify(format!("posting to webhook: {e}")))?;

        if !response.status().is_success() {
            return Err(ApplyError::Notify(format!(
                "webhook returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Whether a failure notification should even be attempted. The notifier is
/// only invoked for a real change request with a usable build link.
pub fn should_notify(pr_number: u64, build_url: &str) -> bool {
    pr_number > 0 && (build_url.starts_with("http://") || build_url.starts_with("https://"))
}
