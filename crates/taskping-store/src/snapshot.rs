//! In-memory `DataStore` backed by a JSON snapshot file.

use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskping_core::error::{Result, TaskPingError};
use taskping_core::traits::DataStore;
use taskping_core::types::{Task, User, UserRole};

/// On-disk layout: `{ "users": [...], "tasks": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Snapshot-backed store. Iteration order is file order.
pub struct SnapshotStore {
    path: Option<PathBuf>,
    data: RwLock<Snapshot>,
}

impl SnapshotStore {
    /// Create a store from an in-memory snapshot (no backing file).
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            path: None,
            data: RwLock::new(snapshot),
        }
    }

    /// Open a store from a snapshot file.
    pub fn open(path: &Path) -> Result<Self> {
        let snapshot = Self::read_file(path)?;
        tracing::info!(
            "📂 Loaded {} users and {} tasks from {}",
            snapshot.users.len(),
            snapshot.tasks.len(),
            path.display()
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            data: RwLock::new(snapshot),
        })
    }

    fn read_file(path: &Path) -> Result<Snapshot> {
        if !path.exists() {
            return Err(TaskPingError::config(format!(
                "store snapshot not found: {}",
                path.display()
            )));
        }
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| TaskPingError::store(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Re-read the backing file, replacing the in-memory data.
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = Self::read_file(path)?;
        *self.write()? = snapshot;
        tracing::debug!("🔄 Reloaded snapshot from {}", path.display());
        Ok(())
    }

    /// Write the in-memory data back to the backing file.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.read()?)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        tracing::debug!("💾 Saved snapshot to {}", path.display());
        Ok(())
    }

    /// Insert or replace a user (matched by id), keeping its position.
    pub fn upsert_user(&self, user: User) -> Result<()> {
        let mut data = self.write()?;
        match data.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => data.users.push(user),
        }
        Ok(())
    }

    /// Insert or replace a task (matched by id), keeping its position.
    pub fn upsert_task(&self, task: Task) -> Result<()> {
        let mut data = self.write()?;
        match data.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => data.tasks.push(task),
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Snapshot>> {
        self.data
            .read()
            .map_err(|_| TaskPingError::store("snapshot lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Snapshot>> {
        self.data
            .write()
            .map_err(|_| TaskPingError::store("snapshot lock poisoned"))
    }
}

#[async_trait]
impl DataStore for SnapshotStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.read()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        Ok(self.read()?.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>> {
        Ok(self
            .read()?
            .tasks
            .iter()
            .filter(|t| t.assigned_to == user_id)
            .cloned()
            .collect())
    }

    async fn list_pending_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>> {
        Ok(self
            .read()?
            .tasks
            .iter()
            .filter(|t| t.assigned_to == user_id && t.is_pending())
            .cloned()
            .collect())
    }

    async fn list_users(&self, role: Option<UserRole>) -> Result<Vec<User>> {
        Ok(self
            .read()?
            .users
            .iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect())
    }
}
