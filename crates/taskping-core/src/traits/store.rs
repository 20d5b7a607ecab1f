//! Read-only data access consumed by the notification core.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Task, User, UserRole};

/// Read access to users and tasks.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    async fn get_task(&self, id: &str) -> Result<Option<Task>>;

    /// All tasks assigned to `user_id`, in store order.
    async fn list_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>>;

    /// Incomplete tasks assigned to `user_id`, in store order.
    async fn list_pending_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>>;

    /// Users, optionally restricted to one role, in store order.
    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>>;
}
