//! Delivery history: the most recent dispatch outcomes, kept in memory.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use serde::Serialize;

use taskping_core::types::{DispatchResult, NotificationKind};
use taskping_core::{Clock, SystemClock};

/// One recorded delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryRecord {
    pub user_id: String,
    pub kind: NotificationKind,
    pub result: DispatchResult,
    pub timestamp: DateTime<Local>,
}

/// Ring buffer of delivery attempts. Oldest records are evicted first.
pub struct DeliveryHistory {
    capacity: usize,
    clock: Arc<dyn Clock>,
    records: Mutex<VecDeque<DeliveryRecord>>,
}

impl DeliveryHistory {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Timestamps records with `clock` instead of the wall clock.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity,
            clock,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Record a delivery attempt.
    pub fn record(&self, user_id: &str, kind: NotificationKind, result: &DispatchResult) {
        if self.capacity == 0 {
            return;
        }
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push_back(DeliveryRecord {
            user_id: user_id.to_string(),
            kind,
            result: result.clone(),
            timestamp: self.clock.now(),
        });
        while records.len() > self.capacity {
            records.pop_front();
        }
    }

    /// Recorded attempts, oldest first.
    pub fn recent(&self) -> Vec<DeliveryRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DeliveryHistory {
    fn default() -> Self {
        Self::new(100)
    }
}
