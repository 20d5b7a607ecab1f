//! SMS channel over the Twilio Messages REST API.
//!
//! Requires: Account SID + Auth Token + a sender number.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use taskping_core::config::ChannelConfig;
use taskping_core::error::{Result, TaskPingError};
use taskping_core::traits::NotificationChannel;
use taskping_core::types::SendReceipt;

/// SMS channel configuration.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number in E.164 form.
    pub from_number: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl From<&ChannelConfig> for SmsConfig {
    fn from(c: &ChannelConfig) -> Self {
        Self {
            account_sid: c.account_sid.clone(),
            auth_token: c.auth_token.clone(),
            from_number: c.from_number.clone(),
            api_base: c.api_base.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(c.timeout_secs),
        }
    }
}

/// Message resource returned on success.
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

/// Error body returned on 4xx/5xx.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u64>,
    #[serde(default)]
    message: Option<String>,
}

/// SMS channel implementation.
pub struct SmsChannel {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsChannel {
    pub fn new(config: SmsConfig) -> Result<Self> {
        if config.account_sid.is_empty() || config.auth_token.is_empty() {
            return Err(TaskPingError::config("SMS account_sid/auth_token not configured"));
        }
        if config.from_number.is_empty() {
            return Err(TaskPingError::config("SMS from_number not configured"));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TaskPingError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base, self.config.account_sid
        )
    }
}

/// Turn an HTTP status + body into a receipt.
///
/// Provider rejections become `Ok(rejected)`; an unreadable success body is a
/// transport error.
pub(crate) fn parse_receipt(status: u16, body: &str) -> Result<SendReceipt> {
    if (200..300).contains(&status) {
        let msg: MessageResource = serde_json::from_str(body)
            .map_err(|e| TaskPingError::channel(format!("Invalid SMS response: {e}")))?;
        let state = msg.status.unwrap_or_else(|| "queued".into());
        return Ok(SendReceipt::accepted(msg.sid, state));
    }

    let detail = match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError { code: Some(code), message: Some(message) }) => format!("{message} (code {code})"),
        Ok(ApiError { message: Some(message), .. }) => message,
        _ if body.trim().is_empty() => "no response body".to_string(),
        _ => body.trim().to_string(),
    };
    Ok(SendReceipt::rejected(
        "failed",
        format!("SMS API error {status}: {detail}"),
    ))
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn name(&self) -> &str {
        "sms"
    }

    async fn send(&self, address: &str, text: &str) -> Result<SendReceipt> {
        let form = [
            ("To", address),
            ("From", self.config.from_number.as_str()),
            ("Body", text),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| TaskPingError::channel(format!("SMS request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let receipt = parse_receipt(status, &body)?;

        if receipt.accepted {
            tracing::debug!(
                "SMS sent: {} → {address}",
                receipt.provider_ref.as_deref().unwrap_or("?")
            );
        } else {
            tracing::warn!(
                "⚠️ SMS to {address} rejected: {}",
                receipt.error.as_deref().unwrap_or("unknown")
            );
        }
        Ok(receipt)
    }
}
