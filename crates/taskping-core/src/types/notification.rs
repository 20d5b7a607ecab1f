//! Notification payloads and delivery results.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskPingError};

/// Kind of notification: the discriminant of [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskCreated,
    TaskUpdated,
    TaskCompleted,
    TaskReminder,
    ProgressUpdate,
    Motivational,
    DailySummary,
    Custom,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 8] = [
        NotificationKind::TaskCreated,
        NotificationKind::TaskUpdated,
        NotificationKind::TaskCompleted,
        NotificationKind::TaskReminder,
        NotificationKind::ProgressUpdate,
        NotificationKind::Motivational,
        NotificationKind::DailySummary,
        NotificationKind::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskCreated => "task_created",
            NotificationKind::TaskUpdated => "task_updated",
            NotificationKind::TaskCompleted => "task_completed",
            NotificationKind::TaskReminder => "task_reminder",
            NotificationKind::ProgressUpdate => "progress_update",
            NotificationKind::Motivational => "motivational",
            NotificationKind::DailySummary => "daily_summary",
            NotificationKind::Custom => "custom",
        }
    }

    /// Kinds whose content is derived from a single task.
    pub fn is_task_scoped(&self) -> bool {
        matches!(
            self,
            NotificationKind::TaskCreated
                | NotificationKind::TaskUpdated
                | NotificationKind::TaskCompleted
                | NotificationKind::TaskReminder
        )
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = TaskPingError;

    fn from_str(s: &str) -> Result<Self> {
        NotificationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| TaskPingError::invalid_payload(format!("unknown notification kind '{s}'")))
    }
}

/// A fully validated notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    TaskCreated {
        title: String,
        creator_name: String,
    },
    TaskUpdated {
        title: String,
        changed_fields: BTreeMap<String, serde_json::Value>,
    },
    TaskCompleted {
        title: String,
    },
    TaskReminder {
        title: String,
        /// Formatted deadline, or `OVERDUE: <timestamp>`.
        #[serde(default)]
        deadline: Option<String>,
    },
    ProgressUpdate {
        #[serde(alias = "overallProgress")]
        overall_progress: u8,
        #[serde(alias = "totalRevisions")]
        total_revisions: u32,
    },
    Motivational {
        #[serde(default)]
        streak: u32,
    },
    DailySummary {
        #[serde(alias = "completed_tasks")]
        completed_count: u32,
        #[serde(alias = "pending_tasks")]
        pending_count: u32,
    },
    /// Caller-supplied text, sent as is.
    Custom {
        #[serde(default, alias = "custom_message")]
        text: String,
    },
}

impl Payload {
    /// Build a payload from a kind name and loosely typed fields.
    ///
    /// Unknown kinds, missing required fields and out-of-range values are
    /// rejected here, so the composer only ever sees valid payloads.
    pub fn from_fields(kind: &str, fields: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let kind: NotificationKind = kind.parse()?;
        let mut object = fields;
        object.insert("kind".into(), serde_json::Value::String(kind.as_str().into()));
        let payload: Payload = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| TaskPingError::invalid_payload(format!("{kind}: {e}")))?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            Payload::TaskCreated { .. } => NotificationKind::TaskCreated,
            Payload::TaskUpdated { .. } => NotificationKind::TaskUpdated,
            Payload::TaskCompleted { .. } => NotificationKind::TaskCompleted,
            Payload::TaskReminder { .. } => NotificationKind::TaskReminder,
            Payload::ProgressUpdate { .. } => NotificationKind::ProgressUpdate,
            Payload::Motivational { .. } => NotificationKind::Motivational,
            Payload::DailySummary { .. } => NotificationKind::DailySummary,
            Payload::Custom { .. } => NotificationKind::Custom,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Payload::ProgressUpdate { overall_progress, .. } if *overall_progress > 100 => {
                Err(TaskPingError::invalid_payload(format!(
                    "progress_update: overall_progress {overall_progress} is above 100"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// What a channel reports back for one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub accepted: bool,
    pub provider_ref: Option<String>,
    pub status: String,
    pub error: Option<String>,
}

impl SendReceipt {
    pub fn accepted(provider_ref: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            accepted: true,
            provider_ref: Some(provider_ref.into()),
            status: status.into(),
            error: None,
        }
    }

    pub fn rejected(status: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            provider_ref: None,
            status: status.into(),
            error: Some(error.into()),
        }
    }
}

/// Outcome of one delivery attempt. Immutable once built.
///
/// The constructors guarantee that a provider reference and an error detail
/// never appear together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    success: bool,
    to: String,
    provider_ref: Option<String>,
    status: String,
    error: Option<String>,
}

impl DispatchResult {
    pub const STATUS_FAILED: &'static str = "failed";
    pub const STATUS_SKIPPED: &'static str = "skipped";

    pub fn delivered(to: impl Into<String>, provider_ref: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            success: true,
            to: to.into(),
            provider_ref: Some(provider_ref.into()),
            status: status.into(),
            error: None,
        }
    }

    pub fn failed(to: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            to: to.into(),
            provider_ref: None,
            status: Self::STATUS_FAILED.into(),
            error: Some(error.into()),
        }
    }

    /// Nothing to send for this recipient (e.g. no pending tasks).
    pub fn skipped(to: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            to: to.into(),
            provider_ref: None,
            status: Self::STATUS_SKIPPED.into(),
            error: Some(reason.into()),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn provider_ref(&self) -> Option<&str> {
        self.provider_ref.as_deref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_skipped(&self) -> bool {
        !self.success && self.status == Self::STATUS_SKIPPED
    }

    pub fn is_failed(&self) -> bool {
        !self.success && !self.is_skipped()
    }
}

/// One cohort member's outcome within a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignEntry {
    pub user_id: String,
    pub result: DispatchResult,
}

/// Ordered results of a campaign, one entry per cohort member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignResult {
    entries: Vec<CampaignEntry>,
}

impl CampaignResult {
    pub fn new(entries: Vec<CampaignEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CampaignEntry] {
        &self.entries
    }

    pub fn results(&self) -> impl Iterator<Item = &DispatchResult> {
        self.entries.iter().map(|e| &e.result)
    }

    pub fn delivered(&self) -> usize {
        self.results().filter(|r| r.success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results().filter(|r| r.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results().filter(|r| r.is_skipped()).count()
    }
}

/// Task completion statistics for a progress update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStats {
    pub overall_progress: u8,
    pub total_revisions: u32,
    pub completed_tasks: u32,
    pub total_tasks: u32,
}

impl ProgressStats {
    /// Percentage of completed tasks, rounded half-to-even; 0 when there are no tasks.
    pub fn from_counts(completed_tasks: u32, total_tasks: u32) -> Self {
        let overall_progress = if total_tasks == 0 {
            0
        } else {
            let pct = f64::from(completed_tasks.min(total_tasks)) / f64::from(total_tasks) * 100.0;
            pct.round_ties_even() as u8
        };
        Self {
            overall_progress,
            total_revisions: 0,
            completed_tasks,
            total_tasks,
        }
    }

    pub fn payload(&self) -> Payload {
        Payload::ProgressUpdate {
            overall_progress: self.overall_progress,
            total_revisions: self.total_revisions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
        assert!("sms_blast".parse::<NotificationKind>().is_err());
    }

    #[test]
    fn test_from_fields_builds_reminder() {
        let payload = Payload::from_fields(
            "task_reminder",
            fields(json!({"title": "Chapter 4", "deadline": "OVERDUE: 2024-01-15 10:00"})),
        )
        .unwrap();
        assert_eq!(payload.kind(), NotificationKind::TaskReminder);
        assert_eq!(
            payload,
            Payload::TaskReminder {
                title: "Chapter 4".into(),
                deadline: Some("OVERDUE: 2024-01-15 10:00".into()),
            }
        );
    }

    #[test]
    fn test_from_fields_rejects_missing_required() {
        let err = Payload::from_fields("task_created", fields(json!({"title": "x"}))).unwrap_err();
        assert!(matches!(err, TaskPingError::InvalidPayload(_)));
        assert!(err.to_string().contains("creator_name"));
    }

    #[test]
    fn test_from_fields_rejects_unknown_kind() {
        let err = Payload::from_fields("fax", serde_json::Map::new()).unwrap_err();
        assert!(matches!(err, TaskPingError::InvalidPayload(_)));
    }

    #[test]
    fn test_motivational_streak_defaults_to_zero() {
        let payload = Payload::from_fields("motivational", serde_json::Map::new()).unwrap();
        assert_eq!(payload, Payload::Motivational { streak: 0 });
    }

    #[test]
    fn test_daily_summary_accepts_legacy_keys() {
        let payload = Payload::from_fields(
            "daily_summary",
            fields(json!({"completed_tasks": 2, "pending_tasks": 5})),
        )
        .unwrap();
        assert_eq!(
            payload,
            Payload::DailySummary { completed_count: 2, pending_count: 5 }
        );
    }

    #[test]
    fn test_custom_accepts_legacy_key() {
        let payload = Payload::from_fields("custom", fields(json!({"custom_message": "Exam moved to Friday"}))).unwrap();
        assert_eq!(payload.kind(), NotificationKind::Custom);
        assert_eq!(payload, Payload::Custom { text: "Exam moved to Friday".into() });
        assert!(!NotificationKind::Custom.is_task_scoped());
    }

    #[test]
    fn test_progress_above_hundred_rejected() {
        let err = Payload::from_fields(
            "progress_update",
            fields(json!({"overall_progress": 140, "total_revisions": 1})),
        )
        .unwrap_err();
        assert!(err.to_string().contains("above 100"));
    }

    #[test]
    fn test_dispatch_result_never_has_ref_and_error() {
        let ok = DispatchResult::delivered("+15550001111", "SM123", "queued");
        assert!(ok.success());
        assert!(ok.error().is_none());

        let failed = DispatchResult::failed("+15550001111", "no address");
        assert!(failed.provider_ref().is_none());
        assert_eq!(failed.status(), "failed");
        assert!(failed.is_failed());

        let skipped = DispatchResult::skipped("u1", "no pending tasks");
        assert!(skipped.is_skipped());
        assert!(!skipped.is_failed());
    }

    #[test]
    fn test_progress_from_counts() {
        assert_eq!(ProgressStats::from_counts(0, 0).overall_progress, 0);
        assert_eq!(ProgressStats::from_counts(3, 4).overall_progress, 75);
        assert_eq!(ProgressStats::from_counts(1, 3).overall_progress, 33);
        assert_eq!(ProgressStats::from_counts(4, 4).overall_progress, 100);
    }

    #[test]
    fn test_campaign_counts() {
        let result = CampaignResult::new(vec![
            CampaignEntry { user_id: "a".into(), result: DispatchResult::delivered("+1", "r1", "sent") },
            CampaignEntry { user_id: "b".into(), result: DispatchResult::failed("+2", "boom") },
            CampaignEntry { user_id: "c".into(), result: DispatchResult::skipped("c", "nothing") },
        ]);
        assert_eq!(result.len(), 3);
        assert_eq!(result.delivered(), 1);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.skipped(), 1);
    }
}
