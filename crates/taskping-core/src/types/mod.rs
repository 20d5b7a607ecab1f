//! Shared data model: users, tasks, notification payloads and delivery results.

pub mod notification;
pub mod task;
pub mod user;

pub use notification::{
    CampaignEntry, CampaignResult, DispatchResult, NotificationKind, Payload, ProgressStats,
    SendReceipt,
};
pub use task::{Task, TaskStatus, format_timestamp};
pub use user::{User, UserRole};
