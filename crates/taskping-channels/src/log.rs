//! Dry-run channel: logs every message and reports it as delivered.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use taskping_core::error::Result;
use taskping_core::traits::NotificationChannel;
use taskping_core::types::SendReceipt;

#[derive(Debug, Default)]
pub struct LogChannel {
    sent: AtomicU64,
}

impl LogChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, address: &str, text: &str) -> Result<SendReceipt> {
        let n = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!("📨 [dry-run #{n}] → {address}: {}", text.replace('\n', " | "));
        Ok(SendReceipt::accepted(format!("log-{n}"), "logged"))
    }
}
