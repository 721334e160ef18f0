use crate::config::TwilioConfig;
use crate::error::{MisError, Result};
use async_trait::async_trait;
use tracing::info;

const DEFAULT_BASE_URL: &str = "https://api.twilio.com/2010-04-01";

/// Forwards a rendered summary to an external messaging service.
#[async_trait]
pub trait MessageRelay: Send + Sync {
    /// Returns the provider's message id.
    async fn send(&self, body: &str) -> Result<String>;
}

pub struct TwilioRelay {
    config: TwilioConfig,
    base_url: String,
}

impl TwilioRelay {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            config,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, self.config.account_sid
        )
    }
}

#[async_trait]
impl MessageRelay for TwilioRelay {
    async fn send(&self, body: &str) -> Result<String> {
        let client = reqwest::Client::new();
        let params = [
            ("Body", body),
            ("From", self.config.from.as_str()),
            ("To", self.config.to.as_str()),
        ];

        let response = client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| MisError::Relay(format!("Message API call failed: {}", e)))?;

        let status = response.status();
        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MisError::Relay(format!("Failed to parse message API response: {}", e)))?;

        if !status.is_success() {
            let detail = response_json["message"].as_str().unwrap_or("no detail");
            return Err(MisError::Relay(format!("HTTP {}: {}", status, detail)));
        }

        let sid = response_json["sid"]
            .as_str()
            .ok_or_else(|| MisError::Relay("No sid in message API response".to_string()))?;

        info!("Summary forwarded, message sid {}", sid);
        Ok(sid.to_string())
    }
}
