//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use taskping_core::error::{Result, TaskPingError};
use taskping_core::types::{SendReceipt, Task, User, UserRole};
use taskping_core::NotificationChannel;
use taskping_store::{Snapshot, SnapshotStore};

use crate::jobs::{FiredJob, JobRunner};

/// Channel that records sends instead of delivering them.
#[derive(Default)]
pub struct MockChannel {
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    sent: Mutex<Vec<(String, String)>>,
    rejected: Mutex<HashSet<String>>,
    erroring: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The provider refuses messages to `address`.
    pub fn reject(&self, address: &str) {
        self.rejected.lock().unwrap().insert(address.to_string());
    }

    /// Sends to `address` fail at the transport level.
    pub fn error_on(&self, address: &str) {
        self.erroring.lock().unwrap().insert(address.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Accepted messages as `(address, text)`, in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, address: &str, text: &str) -> Result<SendReceipt> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.erroring.lock().unwrap().contains(address) {
            return Err(TaskPingError::channel("connection refused"));
        }
        if self.rejected.lock().unwrap().contains(address) {
            return Ok(SendReceipt::rejected("undelivered", "number is blacklisted"));
        }
        self.sent.lock().unwrap().push((address.to_string(), text.to_string()));
        Ok(SendReceipt::accepted(format!("SM{n:04}"), "queued"))
    }
}

/// Job runner that counts firings per job id.
#[derive(Default)]
pub struct CountingRunner {
    counts: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    delay: Option<Duration>,
}

impl CountingRunner {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_on(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    pub fn panic_on(&self, id: &str) {
        self.panicking.lock().unwrap().insert(id.to_string());
    }

    pub fn count(&self, id: &str) -> usize {
        self.counts.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl JobRunner for CountingRunner {
    async fn run(&self, job: &FiredJob) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        *self.counts.lock().unwrap().entry(job.id.clone()).or_default() += 1;
        if self.panicking.lock().unwrap().contains(&job.id) {
            panic!("job {} exploded", job.id);
        }
        if self.failing.lock().unwrap().contains(&job.id) {
            return Err(TaskPingError::Scheduler(format!("job {} failed", job.id)));
        }
        Ok(())
    }
}

pub fn student(id: &str, phone: &str) -> User {
    User::new(id, &format!("Student {id}"), UserRole::Student).with_phone(phone)
}

/// Two students, one partner, and a handful of tasks:
///
/// - alice: `essay` (pending, overdue), `quiz` (pending, overdue), `notes` (done)
/// - bob: nothing pending
/// - carol (partner) created every task
pub fn fixture_snapshot() -> Snapshot {
    let mut alice = student("alice", "+15550000001");
    alice.daily_streak = 4;
    let bob = student("bob", "+15550000002");
    let carol = User::new("carol", "Carol", UserRole::Partner).with_phone("+15550000003");

    let mut essay = Task::new("essay", "Write essay", "alice", "carol");
    essay.deadline = Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap());
    let mut quiz = Task::new("quiz", "Practice quiz", "alice", "carol");
    quiz.deadline = Some(Utc.with_ymd_and_hms(2024, 1, 16, 10, 0, 0).unwrap());
    let mut notes = Task::new("notes", "Review notes", "alice", "carol");
    notes.completed = true;

    Snapshot {
        users: vec![alice, bob, carol],
        tasks: vec![essay, quiz, notes],
    }
}

pub fn fixture_store() -> Arc<SnapshotStore> {
    Arc::new(SnapshotStore::new(fixture_snapshot()))
}
