//! # TaskPing Scheduler
//!
//! Notification scheduling and dispatch for the study task tracker.
//!
//! ## Design Principles
//! - One clock loop, tokio timers only; idle costs nothing
//! - Every recipient is isolated: one failure never blocks the others
//! - Jobs are data (`JobAction`); the service executes them
//! - Storage and delivery are traits owned by `taskping-core`
//!
//! ## Architecture
//! ```text
//! Scheduler (tokio interval)
//!   ├── daily_reminders:  "0 9 * * *"  → first pending task per student
//!   ├── daily_motivation: "0 18 * * *" → quote + streak
//!   ├── weekly_progress:  "0 20 * * 0" → completion percentage
//!   ├── overdue_check:    every 1h     → first overdue task per student
//!   ├── task_reminder_{task}_{user}: once at T
//!   └── on fire → NotificationService
//!                   ├── CampaignRunner (cohort fan-out, buffered)
//!                   └── DispatchUnit → compose → NotificationChannel
//!                                                 └── DeliveryHistory
//! ```

pub mod campaign;
pub mod compose;
pub mod context;
pub mod cron;
pub mod dispatch;
pub mod history;
pub mod jobs;
pub mod registry;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

pub use campaign::{CampaignRunner, Cohort};
pub use compose::compose;
pub use context::AppContext;
pub use cron::CronSpec;
pub use dispatch::{DispatchUnit, normalize_address};
pub use history::{DeliveryHistory, DeliveryRecord};
pub use jobs::{FiredJob, Job, JobAction, JobInfo, JobRunner, JobState, Trigger};
pub use registry::JobRegistry;
pub use scheduler::Scheduler;
pub use service::{NotificationRequest, NotificationService, SummaryOutcome};
