use crate::error::Result;
use crate::types::{Delivery, NotificationTransport};
use serde_json::json;
use tracing::{debug, instrument, warn};

const DEFAULT_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// SendGrid mail transport. 202 Accepted is the only acknowledgment that
/// counts as delivered; every other status is a failed send, not an error.
pub struct SendGridTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl SendGridTransport {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key,
            from,
        }
    }
}

#[async_trait::async_trait]
impl NotificationTransport for SendGridTransport {
    #[instrument(skip(self, body))]
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<Delivery> {
        let payload = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.from },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 202 {
            debug!("Mail accepted for {}", to);
            Ok(Delivery { delivered: true })
        } else {
            warn!("Mail to {} rejected with status {}", to, status);
            Ok(Delivery { delivered: false })
        }
    }
}
