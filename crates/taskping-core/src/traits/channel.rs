//! Notification channel trait: delivers one text to one address.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::SendReceipt;

/// A delivery transport (SMS gateway, log sink, ...).
///
/// `Ok(receipt)` covers both accepted and provider-rejected messages;
/// `Err` is reserved for transport failures (unreachable, timeout,
/// unparseable response). Implementations must not panic.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str;

    /// Send `text` to a normalized `address`.
    async fn send(&self, address: &str, text: &str) -> Result<SendReceipt>;
}
