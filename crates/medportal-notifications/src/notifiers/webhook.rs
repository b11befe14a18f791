use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;

use super::Notifier;
use crate::error::NotificationError;
use crate::event::NotificationEvent;

type HmacSha256 = Hmac<Sha256>;

/// Posts events as JSON to a fixed URL.
///
/// With a secret configured the body is signed and the signature sent as
/// `X-Signature-256: sha256=<hex>`.
pub struct WebhookNotifier {
    http_client: Client,
    url: String,
    secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            url: url.into(),
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    fn sign_payload(payload: &str, secret: &str) -> Result<String, NotificationError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotificationError> {
        let payload_str = serde_json::to_string(event)
            .map_err(|e| NotificationError::Internal(e.to_string()))?;

        let mut request = self
            .http_client
            .post(&self.url)
            .header("Content-Type", "application/json");

        if let Some(secret) = &self.secret {
            let signature = Self::sign_payload(&payload_str, secret)?;
            request = request.header("X-Signature-256", format!("sha256={signature}"));
        }

        let response = request
            .body(payload_str)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            Err(NotificationError::SendFailed(format!(
                "Webhook returned {status}: {error}"
            )))
        }
    }
}
