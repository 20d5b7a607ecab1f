//! Application context: built once at process start and shared by `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde_json::Value;

use taskping_core::config::SchedulerConfig;
use taskping_core::error::Result;
use taskping_core::types::{CampaignResult, DispatchResult, Payload};
use taskping_core::{Clock, DataStore, NotificationChannel, SystemClock, TaskPingConfig};
use taskping_store::SnapshotStore;

use crate::history::DeliveryRecord;
use crate::jobs::{Job, JobInfo};
use crate::scheduler::Scheduler;
use crate::service::{NotificationRequest, NotificationService, SummaryOutcome};

/// Owns the notification service and the scheduler that drives it.
pub struct AppContext {
    service: Arc<NotificationService>,
    scheduler: Arc<Scheduler>,
    builtin_jobs: bool,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn DataStore>,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        let service = Arc::new(NotificationService::new(
            store,
            channel,
            Arc::clone(&clock),
            config.max_concurrent_dispatch,
            config.history_size,
        ));
        let scheduler = Arc::new(Scheduler::new(
            clock,
            service.clone(),
            Duration::from_secs(config.tick_secs),
        ));
        Self {
            service,
            scheduler,
            builtin_jobs: config.enable_builtin_jobs,
        }
    }

    /// Validate `config` and build the snapshot store, the channel and the context.
    pub fn from_config(config: &TaskPingConfig) -> Result<Self> {
        config.validate()?;
        let store = SnapshotStore::open(&config.store.expanded_path())?;
        let channel = taskping_channels::from_config(&config.channel)?;
        tracing::info!(
            "🔧 Context ready: channel={}, store={}",
            channel.name(),
            config.store.expanded_path().display()
        );
        Ok(Self::new(Arc::new(store), channel, Arc::new(SystemClock), &config.scheduler))
    }

    pub fn service(&self) -> &Arc<NotificationService> {
        &self.service
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    // ── Lifecycle ──────────────────────────────────────────

    /// Register the built-in sweeps (if enabled) and start the clock loop.
    /// Returns false if the scheduler was already running.
    pub fn start(&self) -> bool {
        if self.scheduler.is_running() {
            return false;
        }
        if self.builtin_jobs {
            self.register_builtin_jobs();
        }
        self.scheduler.start()
    }

    pub fn register_builtin_jobs(&self) {
        for job in Job::builtin() {
            self.scheduler.register(job);
        }
    }

    /// Stop firing jobs; running handlers are left to finish.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub async fn drain(&self) {
        self.scheduler.drain().await;
    }

    pub fn jobs(&self) -> Vec<JobInfo> {
        self.scheduler.jobs()
    }

    pub fn recent_deliveries(&self) -> Vec<DeliveryRecord> {
        self.service.recent_deliveries()
    }

    // ── Reminders ──────────────────────────────────────────

    /// Schedule a one-off reminder for `task_id`, replacing any earlier one for the same user.
    pub fn schedule_reminder(&self, user_id: &str, task_id: &str, fire_at: DateTime<Local>) -> bool {
        if user_id.trim().is_empty() || task_id.trim().is_empty() {
            tracing::warn!("⚠️ Reminder not scheduled: user and task ids are required");
            return false;
        }
        if fire_at <= self.scheduler.now() {
            tracing::warn!("⏰ Reminder for task {task_id} is in the past, firing on next tick");
        }
        self.scheduler.register(Job::task_reminder(user_id, task_id, fire_at));
        true
    }

    pub fn cancel_reminder(&self, user_id: &str, task_id: &str) -> bool {
        self.scheduler.cancel(&Job::reminder_id(user_id, task_id))
    }

    // ── Sends ──────────────────────────────────────────────

    pub async fn dispatch_one(&self, user_id: &str, payload: &Payload) -> Result<DispatchResult> {
        self.service.dispatch_one(user_id, payload).await
    }

    pub async fn dispatch_request(&self, request: NotificationRequest) -> Result<DispatchResult> {
        self.service.dispatch_request(request).await
    }

    pub async fn dispatch_bulk(&self, user_ids: &[String], payload: &Payload) -> Result<CampaignResult> {
        self.service.dispatch_bulk(user_ids, payload).await
    }

    pub async fn trigger_daily_summary(&self, user_id: &str) -> SummaryOutcome {
        self.service.trigger_daily_summary(user_id).await
    }

    pub async fn notify_task_created(&self, task_id: &str) -> Result<DispatchResult> {
        self.service.notify_task_created(task_id).await
    }

    pub async fn notify_task_updated(
        &self,
        task_id: &str,
        changed_fields: BTreeMap<String, Value>,
    ) -> Result<DispatchResult> {
        self.service.notify_task_updated(task_id, changed_fields).await
    }

    pub async fn notify_task_completed(&self, task_id: &str) -> Result<DispatchResult> {
        self.service.notify_task_completed(task_id).await
    }
}
