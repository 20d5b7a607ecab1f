//! Task records as seen by the notification core (read-only).

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

/// A study task assigned to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// Owner of the task (the user who gets reminded).
    #[serde(alias = "assignedTo")]
    pub assigned_to: String,
    #[serde(alias = "createdBy")]
    pub created_by: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, alias = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: &str, title: &str, assigned_to: &str, created_by: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            assigned_to: assigned_to.to_string(),
            created_by: created_by.to_string(),
            completed: false,
            deadline: None,
            completed_at: None,
            status: TaskStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.completed
    }

    /// Pending with a deadline strictly before `now`.
    pub fn is_overdue<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.is_pending() && self.deadline.is_some_and(|d| d < *now)
    }

    /// Completed flag set and completion timestamp on `day` in the zone `tz`.
    pub fn completed_on<Tz: TimeZone>(&self, day: NaiveDate, tz: &Tz) -> bool {
        self.completed
            && self
                .completed_at
                .is_some_and(|at| at.with_timezone(tz).date_naive() == day)
    }
}

/// Format a timestamp the way it appears in messages (`2024-01-15 10:00`, local time).
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}
