//! Notification service: job handlers, single-target sends and task events.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use taskping_core::error::{Result, TaskPingError};
use taskping_core::types::{
    CampaignResult, DispatchResult, NotificationKind, Payload, ProgressStats, Task, User, UserRole,
    format_timestamp,
};
use taskping_core::{Clock, DataStore, NotificationChannel};

use crate::campaign::{CampaignRunner, Cohort};
use crate::dispatch::DispatchUnit;
use crate::history::{DeliveryHistory, DeliveryRecord};
use crate::jobs::{FiredJob, JobAction, JobRunner};

const UNKNOWN_CREATOR: &str = "Unknown";

/// A loosely typed send request: a kind name, an optional task, and extra fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub user_id: String,
    pub kind: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub fields: serde_json::Map<String, Value>,
}

/// Result of an on-demand daily summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryOutcome {
    pub success: bool,
    pub message: String,
}

impl SummaryOutcome {
    fn sent() -> Self {
        Self {
            success: true,
            message: "Daily summary sent".into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Sweeps, single-target operations and task-event notifications.
pub struct NotificationService {
    store: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<DispatchUnit>,
    campaigns: CampaignRunner,
    history: Arc<DeliveryHistory>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn DataStore>,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
        max_concurrent_dispatch: usize,
        history_size: usize,
    ) -> Self {
        let history = Arc::new(DeliveryHistory::with_clock(history_size, Arc::clone(&clock)));
        let dispatcher = Arc::new(DispatchUnit::new(channel).with_history(Arc::clone(&history)));
        let campaigns = CampaignRunner::new(Arc::clone(&store), Arc::clone(&dispatcher), max_concurrent_dispatch);
        Self {
            store,
            clock,
            dispatcher,
            campaigns,
            history,
        }
    }

    pub fn recent_deliveries(&self) -> Vec<DeliveryRecord> {
        self.history.recent()
    }

    async fn require_user(&self, user_id: &str) -> Result<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| TaskPingError::not_found(format!("user '{user_id}'")))
    }

    async fn require_task(&self, task_id: &str) -> Result<Task> {
        self.store
            .get_task(task_id)
            .await?
            .ok_or_else(|| TaskPingError::not_found(format!("task '{task_id}'")))
    }

    async fn creator_name(&self, task: &Task) -> String {
        match self.store.get_user(&task.created_by).await {
            Ok(Some(creator)) => creator.name,
            _ => UNKNOWN_CREATOR.to_string(),
        }
    }

    // ── Single target ──────────────────────────────────────

    /// Send `payload` to one user.
    pub async fn dispatch_one(&self, user_id: &str, payload: &Payload) -> Result<DispatchResult> {
        payload.validate()?;
        let user = self.require_user(user_id).await?;
        Ok(self.dispatcher.dispatch(&user, payload).await)
    }

    /// Resolve a loosely typed request into a payload and send it.
    pub async fn dispatch_request(&self, request: NotificationRequest) -> Result<DispatchResult> {
        let user = self.require_user(&request.user_id).await?;
        let payload = self.resolve_request(request).await?;
        Ok(self.dispatcher.dispatch(&user, &payload).await)
    }

    async fn resolve_request(&self, request: NotificationRequest) -> Result<Payload> {
        let kind: NotificationKind = request.kind.parse()?;
        let mut fields = request.fields;

        if let Some(task_id) = request.task_id.as_deref().filter(|_| kind.is_task_scoped()) {
            let task = self.require_task(task_id).await?;
            if kind == NotificationKind::TaskUpdated && !fields.contains_key("changed_fields") {
                let changes = std::mem::take(&mut fields);
                fields.insert("changed_fields".into(), Value::Object(changes));
            }
            fields.insert("title".into(), Value::String(task.title.clone()));
            match kind {
                NotificationKind::TaskCreated if !fields.contains_key("creator_name") => {
                    let creator = self.creator_name(&task).await;
                    fields.insert("creator_name".into(), Value::String(creator));
                }
                NotificationKind::TaskReminder if !fields.contains_key("deadline") => {
                    if let Some(deadline) = &task.deadline {
                        fields.insert("deadline".into(), Value::String(format_timestamp(deadline)));
                    }
                }
                _ => {}
            }
        }

        Payload::from_fields(kind.as_str(), fields)
    }

    /// Send the same payload to every listed user, in order.
    pub async fn dispatch_bulk(&self, user_ids: &[String], payload: &Payload) -> Result<CampaignResult> {
        payload.validate()?;
        self.campaigns
            .run(Cohort::Users(user_ids.to_vec()), payload.kind(), |_| async move {
                Ok(Some(payload.clone()))
            })
            .await
    }

    /// Compute and send today's summary for one user.
    pub async fn trigger_daily_summary(&self, user_id: &str) -> SummaryOutcome {
        match self.send_daily_summary(user_id).await {
            Ok(result) if result.success() => SummaryOutcome::sent(),
            Ok(result) => SummaryOutcome::failed(result.error().unwrap_or("delivery failed")),
            Err(e) => {
                tracing::warn!("⚠️ Daily summary for {user_id} failed: {e}");
                SummaryOutcome::failed(e.to_string())
            }
        }
    }

    async fn send_daily_summary(&self, user_id: &str) -> Result<DispatchResult> {
        let user = self.require_user(user_id).await?;
        if let Err(rejected) = self.dispatcher.check_recipient(&user) {
            return Ok(self.dispatcher.reject(&user, NotificationKind::DailySummary, rejected));
        }
        let tasks = self.store.list_tasks_for_user(user_id).await?;
        let (completed_count, pending_count) = daily_counts(&tasks, self.clock.now().date_naive());
        let payload = Payload::DailySummary {
            completed_count,
            pending_count,
        };
        Ok(self.dispatcher.dispatch(&user, &payload).await)
    }

    /// Progress statistics over every task assigned to `user_id`.
    pub async fn progress_for(&self, user_id: &str) -> Result<ProgressStats> {
        let tasks = self.store.list_tasks_for_user(user_id).await?;
        Ok(progress_from_tasks(&tasks))
    }

    /// Reminder for one task, as scheduled by `schedule_reminder`.
    ///
    /// Returns `None` when the user or task no longer exists.
    pub async fn send_task_reminder(&self, user_id: &str, task_id: &str) -> Result<Option<DispatchResult>> {
        let Some(user) = self.store.get_user(user_id).await? else {
            tracing::warn!("⚠️ Reminder skipped: user {user_id} not found");
            return Ok(None);
        };
        let Some(task) = self.store.get_task(task_id).await? else {
            tracing::warn!("⚠️ Reminder skipped: task {task_id} not found");
            return Ok(None);
        };
        let payload = Payload::TaskReminder {
            deadline: task.deadline.as_ref().map(format_timestamp),
            title: task.title,
        };
        Ok(Some(self.dispatcher.dispatch(&user, &payload).await))
    }

    // ── Task events ────────────────────────────────────────

    pub async fn notify_task_created(&self, task_id: &str) -> Result<DispatchResult> {
        let task = self.require_task(task_id).await?;
        let payload = Payload::TaskCreated {
            creator_name: self.creator_name(&task).await,
            title: task.title,
        };
        self.dispatch_one(&task.assigned_to, &payload).await
    }

    pub async fn notify_task_updated(
        &self,
        task_id: &str,
        changed_fields: BTreeMap<String, Value>,
    ) -> Result<DispatchResult> {
        let task = self.require_task(task_id).await?;
        let payload = Payload::TaskUpdated {
            title: task.title,
            changed_fields,
        };
        self.dispatch_one(&task.assigned_to, &payload).await
    }

    pub async fn notify_task_completed(&self, task_id: &str) -> Result<DispatchResult> {
        let task = self.require_task(task_id).await?;
        let payload = Payload::TaskCompleted { title: task.title };
        self.dispatch_one(&task.assigned_to, &payload).await
    }

    // ── Sweeps ─────────────────────────────────────────────

    /// First pending task per student.
    pub async fn daily_reminder_sweep(&self) -> Result<CampaignResult> {
        let store = &self.store;
        self.campaigns
            .run(Cohort::Role(UserRole::Student), NotificationKind::TaskReminder, |student| async move {
                let pending = store.list_pending_tasks_for_user(&student.id).await?;
                Ok(pending.into_iter().next().map(|task| Payload::TaskReminder {
                    deadline: task.deadline.as_ref().map(format_timestamp),
                    title: task.title,
                }))
            })
            .await
    }

    pub async fn motivational_sweep(&self) -> Result<CampaignResult> {
        self.campaigns
            .run(Cohort::Role(UserRole::Student), NotificationKind::Motivational, |student| async move {
                Ok(Some(Payload::Motivational {
                    streak: student.daily_streak,
                }))
            })
            .await
    }

    pub async fn weekly_progress_sweep(&self) -> Result<CampaignResult> {
        let store = &self.store;
        self.campaigns
            .run(Cohort::Role(UserRole::Student), NotificationKind::ProgressUpdate, |student| async move {
                let tasks = store.list_tasks_for_user(&student.id).await?;
                Ok(Some(progress_from_tasks(&tasks).payload()))
            })
            .await
    }

    /// One reminder per student for the first pending task past its deadline.
    pub async fn overdue_sweep(&self) -> Result<CampaignResult> {
        let store = &self.store;
        let now = self.clock.now();
        self.campaigns
            .run(Cohort::Role(UserRole::Student), NotificationKind::TaskReminder, |student| async move {
                let pending = store.list_pending_tasks_for_user(&student.id).await?;
                let Some(task) = pending.into_iter().find(|t| t.is_overdue(&now)) else {
                    return Ok(None);
                };
                Ok(Some(Payload::TaskReminder {
                    deadline: task.deadline.as_ref().map(|d| format!("OVERDUE: {}", format_timestamp(d))),
                    title: task.title,
                }))
            })
            .await
    }
}

#[async_trait]
impl JobRunner for NotificationService {
    async fn run(&self, job: &FiredJob) -> Result<()> {
        match &job.action {
            JobAction::DailyReminderSweep => {
                self.daily_reminder_sweep().await?;
            }
            JobAction::MotivationalSweep => {
                self.motivational_sweep().await?;
            }
            JobAction::WeeklyProgressSweep => {
                self.weekly_progress_sweep().await?;
            }
            JobAction::OverdueSweep => {
                self.overdue_sweep().await?;
            }
            JobAction::TaskReminder { user_id, task_id } => {
                if let Some(result) = self.send_task_reminder(user_id, task_id).await? {
                    if !result.success() {
                        tracing::warn!(
                            "⚠️ Reminder for task {task_id} not delivered: {}",
                            result.error().unwrap_or("unknown error")
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

/// Progress over `tasks`: share of completed tasks, rounded.
pub fn progress_from_tasks(tasks: &[Task]) -> ProgressStats {
    let total = tasks.len() as u32;
    let completed = tasks.iter().filter(|t| t.completed).count() as u32;
    ProgressStats::from_counts(completed, total)
}

/// `(completed today, pending)` where "today" is `today` in local time.
pub fn daily_counts(tasks: &[Task], today: NaiveDate) -> (u32, u32) {
    let completed = tasks.iter().filter(|t| t.completed_on(today, &Local)).count() as u32;
    let pending = tasks.iter().filter(|t| t.is_pending()).count() as u32;
    (completed, pending)
}
