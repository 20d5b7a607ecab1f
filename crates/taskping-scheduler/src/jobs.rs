//! Job definitions: the data model for scheduled work.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local};
use serde::Serialize;

use taskping_core::error::Result;

use crate::cron::CronSpec;

pub const DAILY_REMINDERS: &str = "daily_reminders";
pub const DAILY_MOTIVATION: &str = "daily_motivation";
pub const WEEKLY_PROGRESS: &str = "weekly_progress";
pub const OVERDUE_CHECK: &str = "overdue_check";

/// A scheduled job. Runtime state (next run, run count) lives in the registry.
#[derive(Debug, Clone)]
pub struct Job {
    /// Identity. Registering a job with an existing id replaces it.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// When/how the job fires.
    pub trigger: Trigger,
    /// What to do when it fires.
    pub action: JobAction,
}

/// How/when a job fires.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Fire on a cron schedule.
    Recurring { spec: CronSpec },
    /// Fire once at a specific time.
    OneOff { at: DateTime<Local> },
    /// Fire every `period`, starting one period after registration. A
    /// non-positive period never fires.
    Interval { period: Duration },
}

/// What a job does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum JobAction {
    DailyReminderSweep,
    MotivationalSweep,
    WeeklyProgressSweep,
    OverdueSweep,
    TaskReminder { user_id: String, task_id: String },
}

/// Job lifecycle while registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Scheduled,
    Firing,
}

/// A job handed to a runner by the scheduler.
#[derive(Debug, Clone)]
pub struct FiredJob {
    pub id: String,
    /// Registration generation, used to tell a replaced entry from its successor.
    pub generation: u64,
    pub action: JobAction,
    pub fired_at: DateTime<Local>,
}

/// Snapshot of a registered job, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    pub trigger: String,
    #[serde(flatten)]
    pub action: JobAction,
    pub state: JobState,
    pub next_run: Option<DateTime<Local>>,
    pub last_run: Option<DateTime<Local>>,
    pub run_count: u32,
}

/// Executes fired jobs.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &FiredJob) -> Result<()>;
}

impl Job {
    pub fn new(id: &str, name: &str, trigger: Trigger, action: JobAction) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            trigger,
            action,
        }
    }

    /// One-off reminder for a single task, keyed by (task, user).
    pub fn task_reminder(user_id: &str, task_id: &str, at: DateTime<Local>) -> Self {
        Self {
            id: Self::reminder_id(user_id, task_id),
            name: format!("Task reminder for {task_id}"),
            trigger: Trigger::OneOff { at },
            action: JobAction::TaskReminder {
                user_id: user_id.to_string(),
                task_id: task_id.to_string(),
            },
        }
    }

    pub fn reminder_id(user_id: &str, task_id: &str) -> String {
        format!("task_reminder_{task_id}_{user_id}")
    }

    /// The four recurring sweeps registered when the scheduler starts.
    pub fn builtin() -> Vec<Job> {
        vec![
            Job::new(
                DAILY_REMINDERS,
                "Daily Task Reminders",
                Trigger::Recurring { spec: CronSpec::daily_at(9, 0) },
                JobAction::DailyReminderSweep,
            ),
            Job::new(
                DAILY_MOTIVATION,
                "Daily Motivational Messages",
                Trigger::Recurring { spec: CronSpec::daily_at(18, 0) },
                JobAction::MotivationalSweep,
            ),
            Job::new(
                WEEKLY_PROGRESS,
                "Weekly Progress Updates",
                Trigger::Recurring { spec: CronSpec::weekly_at(0, 20, 0) },
                JobAction::WeeklyProgressSweep,
            ),
            Job::new(
                OVERDUE_CHECK,
                "Overdue Task Check",
                Trigger::Interval { period: Duration::hours(1) },
                JobAction::OverdueSweep,
            ),
        ]
    }
}

impl Trigger {
    pub fn cron(expression: &str) -> Result<Self> {
        Ok(Trigger::Recurring { spec: expression.parse()? })
    }

    /// First firing for a job registered at `now`.
    ///
    /// One-off times in the past stay as they are and fire on the next tick.
    pub fn first_run(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            Trigger::Recurring { spec } => spec.next_after(&now),
            Trigger::OneOff { at } => Some(*at),
            Trigger::Interval { period } if *period <= Duration::zero() => None,
            Trigger::Interval { period } => Some(now + *period),
        }
    }

    /// Next firing after one that happened at `fired_at`. Missed periods collapse into one.
    pub fn next_after_fire(&self, fired_at: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            Trigger::Recurring { spec } => spec.next_after(&fired_at),
            Trigger::OneOff { .. } => None,
            Trigger::Interval { period } if *period <= Duration::zero() => None,
            Trigger::Interval { period } => Some(fired_at + *period),
        }
    }

    pub fn is_one_off(&self) -> bool {
        matches!(self, Trigger::OneOff { .. })
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Recurring { spec } => write!(f, "cron({spec})"),
            Trigger::OneOff { at } => write!(f, "once({})", at.format("%Y-%m-%d %H:%M")),
            Trigger::Interval { period } => write!(f, "every({}s)", period.num_seconds()),
        }
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobAction::DailyReminderSweep => f.write_str("daily reminder sweep"),
            JobAction::MotivationalSweep => f.write_str("motivational sweep"),
            JobAction::WeeklyProgressSweep => f.write_str("weekly progress sweep"),
            JobAction::OverdueSweep => f.write_str("overdue sweep"),
            JobAction::TaskReminder { user_id, task_id } => {
                write!(f, "reminder for task {task_id} to {user_id}")
            }
        }
    }
}
