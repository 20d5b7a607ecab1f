//! Notification dispatch: sends one message to one user through the channel.
//!
//! Every outcome is a [`DispatchResult`]; nothing here returns an error or retries.

use std::sync::Arc;

use taskping_core::NotificationChannel;
use taskping_core::types::{DispatchResult, NotificationKind, Payload, User};

use crate::compose::compose;
use crate::history::DeliveryHistory;

pub const ERR_DISABLED: &str = "notifications disabled";
pub const ERR_NO_ADDRESS: &str = "no address";
pub const ERR_MALFORMED_ADDRESS: &str = "malformed address";

/// Sends composed messages through a [`NotificationChannel`].
pub struct DispatchUnit {
    channel: Arc<dyn NotificationChannel>,
    history: Option<Arc<DeliveryHistory>>,
}

impl DispatchUnit {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            channel,
            history: None,
        }
    }

    /// Record every dispatch outcome in `history`.
    pub fn with_history(mut self, history: Arc<DeliveryHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Check that `user` can be reached. Returns the normalized address, or
    /// the failed result to report instead.
    pub fn check_recipient(&self, user: &User) -> Result<String, DispatchResult> {
        if !user.notifications_enabled() {
            tracing::debug!("🔕 Notifications disabled for {}", user.id);
            return Err(DispatchResult::failed(recipient(user), ERR_DISABLED));
        }
        let Some(raw) = user.address() else {
            tracing::debug!("No address on file for {}", user.id);
            return Err(DispatchResult::failed(&user.id, ERR_NO_ADDRESS));
        };
        normalize_address(raw).ok_or_else(|| {
            tracing::warn!("⚠️ Malformed address for {}: '{raw}'", user.id);
            DispatchResult::failed(raw, ERR_MALFORMED_ADDRESS)
        })
    }

    /// Record a rejection from [`check_recipient`](Self::check_recipient) and hand it back.
    pub fn reject(&self, user: &User, kind: NotificationKind, rejected: DispatchResult) -> DispatchResult {
        self.record(&user.id, kind, &rejected);
        rejected
    }

    /// Compose and send `payload` to `user`.
    pub async fn dispatch(&self, user: &User, payload: &Payload) -> DispatchResult {
        let result = match self.check_recipient(user) {
            Ok(address) => self.send(&address, payload).await,
            Err(rejected) => rejected,
        };
        self.record(&user.id, payload.kind(), &result);
        result
    }

    fn record(&self, user_id: &str, kind: NotificationKind, result: &DispatchResult) {
        if let Some(history) = &self.history {
            history.record(user_id, kind, result);
        }
    }

    async fn send(&self, address: &str, payload: &Payload) -> DispatchResult {
        let kind = payload.kind();
        let text = compose(payload);

        match self.channel.send(address, &text).await {
            Ok(receipt) if receipt.accepted => {
                let provider_ref = receipt.provider_ref.unwrap_or_else(|| "unknown".to_string());
                tracing::info!("📤 {kind} sent to {address} via {} ({provider_ref})", self.channel.name());
                DispatchResult::delivered(address, provider_ref, receipt.status)
            }
            Ok(receipt) => {
                let error = receipt
                    .error
                    .unwrap_or_else(|| format!("rejected with status '{}'", receipt.status));
                tracing::warn!("⚠️ {kind} to {address} rejected: {error}");
                DispatchResult::failed(address, error)
            }
            Err(e) => {
                tracing::error!("❌ {kind} to {address} failed: {e}");
                DispatchResult::failed(address, e.to_string())
            }
        }
    }
}

/// The address a failure is reported against: the raw address, or the user id when none is set.
fn recipient(user: &User) -> &str {
    user.address().unwrap_or(&user.id)
}

/// Normalize a phone number to `+<digits>`.
///
/// Spaces, dashes, dots and parentheses are stripped and a leading `+` is
/// added if missing. Anything that is not 7-15 digits afterwards is rejected.
pub fn normalize_address(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    let valid = (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    valid.then(|| format!("+{digits}"))
}
