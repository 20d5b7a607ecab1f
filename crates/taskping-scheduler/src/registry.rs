//! Job registry: schedule entries keyed by job identity.
//!
//! All state sits behind one `std::sync::Mutex`; no method awaits while
//! holding it. An identity that is still firing is never handed out again
//! until `finish` is called for it.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Local};

use crate::jobs::{FiredJob, Job, JobInfo, JobState};

struct Entry {
    job: Job,
    generation: u64,
    state: JobState,
    next_run: Option<DateTime<Local>>,
    last_run: Option<DateTime<Local>>,
    run_count: u32,
}

impl Entry {
    fn info(&self) -> JobInfo {
        JobInfo {
            id: self.job.id.clone(),
            name: self.job.name.clone(),
            trigger: self.job.trigger.to_string(),
            action: self.job.action.clone(),
            state: self.state,
            next_run: self.next_run,
            last_run: self.last_run,
            run_count: self.run_count,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    in_flight: HashSet<String>,
    next_generation: u64,
}

/// Registered jobs plus the set of identities currently firing.
#[derive(Default)]
pub struct JobRegistry {
    inner: Mutex<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic elsewhere; the map is still consistent.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `job`, replacing any entry with the same id. Returns true if one was replaced.
    pub fn register(&self, job: Job, now: DateTime<Local>) -> bool {
        let mut inner = self.lock();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        let next_run = job.trigger.first_run(now);
        if next_run.is_none() {
            tracing::warn!("⚠️ Job '{}' has no upcoming run ({})", job.id, job.trigger);
        }

        let id = job.id.clone();
        let name = job.name.clone();
        let replaced = inner
            .entries
            .insert(
                id.clone(),
                Entry {
                    job,
                    generation,
                    state: JobState::Scheduled,
                    next_run,
                    last_run: None,
                    run_count: 0,
                },
            )
            .is_some();

        if replaced {
            tracing::info!("♻️ Job replaced: '{name}' ({id})");
        } else {
            tracing::info!("📅 Job added: '{name}' ({id})");
        }
        replaced
    }

    /// Remove a job by id. A firing already underway runs to completion.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.lock().entries.remove(id).is_some();
        if removed {
            tracing::info!("🗑️ Job removed: {id}");
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<JobInfo> {
        self.lock().entries.get(id).map(Entry::info)
    }

    /// All registered jobs, sorted by id.
    pub fn list(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self.lock().entries.values().map(Entry::info).collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.lock().in_flight.contains(id)
    }

    /// Unregister everything.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Mark every due job as firing and advance its schedule.
    ///
    /// Jobs whose identity is still in flight are left for a later tick.
    /// Returned jobs are ordered by scheduled time, then id.
    pub fn take_due(&self, now: DateTime<Local>) -> Vec<FiredJob> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let mut due: Vec<(DateTime<Local>, FiredJob)> = Vec::new();

        for entry in inner.entries.values_mut() {
            if entry.state != JobState::Scheduled {
                continue;
            }
            let Some(scheduled) = entry.next_run else {
                continue;
            };
            if scheduled > now {
                continue;
            }
            if inner.in_flight.contains(&entry.job.id) {
                tracing::debug!("Job '{}' still running, deferring", entry.job.id);
                continue;
            }

            inner.in_flight.insert(entry.job.id.clone());
            entry.state = JobState::Firing;
            entry.last_run = Some(now);
            entry.run_count += 1;
            entry.next_run = entry.job.trigger.next_after_fire(now);

            tracing::info!("🔔 Job triggered: '{}' ({})", entry.job.name, entry.job.id);
            due.push((
                scheduled,
                FiredJob {
                    id: entry.job.id.clone(),
                    generation: entry.generation,
                    action: entry.job.action.clone(),
                    fired_at: now,
                },
            ));
        }

        due.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        due.into_iter().map(|(_, job)| job).collect()
    }

    /// Release a firing. Completed one-off entries are dropped unless they
    /// were replaced while firing.
    pub fn finish(&self, id: &str, generation: u64) {
        let mut inner = self.lock();
        inner.in_flight.remove(id);

        let Some(entry) = inner.entries.get_mut(id) else {
            return;
        };
        if entry.generation != generation {
            return;
        }
        if entry.job.trigger.is_one_off() {
            inner.entries.remove(id);
            tracing::debug!("One-off job '{id}' completed");
        } else {
            entry.state = JobState::Scheduled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobAction, Trigger};
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    #[test]
    fn test_register_replaces_same_identity() {
        let registry = JobRegistry::new();
        assert!(!registry.register(Job::task_reminder("u1", "t1", at(10, 0)), at(8, 0)));
        assert!(registry.register(Job::task_reminder("u1", "t1", at(11, 0)), at(8, 0)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("task_reminder_t1_u1").unwrap().next_run, Some(at(11, 0)));
    }

    #[test]
    fn test_one_off_fires_once() {
        let registry = JobRegistry::new();
        registry.register(Job::task_reminder("u1", "t1", at(10, 0)), at(8, 0));

        assert!(registry.take_due(at(9, 59)).is_empty());
        let fired = registry.take_due(at(10, 0));
        assert_eq!(fired.len(), 1);
        assert!(registry.is_in_flight(&fired[0].id));
        assert!(registry.take_due(at(10, 1)).is_empty());

        registry.finish(&fired[0].id, fired[0].generation);
        assert!(registry.is_empty());
        assert!(!registry.is_in_flight(&fired[0].id));
    }

    #[test]
    fn test_non_positive_interval_never_fires() {
        let registry = JobRegistry::new();
        for (id, period) in [("zero", Duration::zero()), ("negative", Duration::minutes(-5))] {
            let job = Job::new(id, id, Trigger::Interval { period }, JobAction::OverdueSweep);
            registry.register(job, at(8, 0));
            assert_eq!(registry.get(id).unwrap().next_run, None);
        }

        assert!(registry.take_due(at(8, 0)).is_empty());
        assert!(registry.take_due(at(9, 0)).is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_in_flight_identity_not_refired() {
        let registry = JobRegistry::new();
        let job = Job::new(
            "tick",
            "Tick",
            Trigger::Interval { period: Duration::minutes(1) },
            JobAction::OverdueSweep,
        );
        registry.register(job.clone(), at(8, 0));
        let first = registry.take_due(at(8, 1));
        assert_eq!(first.len(), 1);

        // Replaced while firing: the new entry waits for the old firing to finish.
        registry.register(job, at(8, 1));
        assert!(registry.take_due(at(8, 5)).is_empty());

        registry.finish("tick", first[0].generation);
        let second = registry.take_due(at(8, 5));
        assert_eq!(second.len(), 1);
        assert_ne!(second[0].generation, first[0].generation);
    }

    #[test]
    fn test_replacement_survives_stale_finish() {
        let registry = JobRegistry::new();
        registry.register(Job::task_reminder("u1", "t1", at(10, 0)), at(8, 0));
        let fired = registry.take_due(at(10, 0));
        registry.register(Job::task_reminder("u1", "t1", at(12, 0)), at(10, 0));

        registry.finish(&fired[0].id, fired[0].generation);
        let info = registry.get("task_reminder_t1_u1").unwrap();
        assert_eq!(info.state, JobState::Scheduled);
        assert_eq!(info.next_run, Some(at(12, 0)));
    }

    #[test]
    fn test_recurring_returns_to_scheduled() {
        let registry = JobRegistry::new();
        registry.register(
            Job::new("cron", "Cron", Trigger::cron("30 * * * *").unwrap(), JobAction::MotivationalSweep),
            at(8, 0),
        );
        let fired = registry.take_due(at(8, 30));
        assert_eq!(registry.get("cron").unwrap().state, JobState::Firing);
        registry.finish("cron", fired[0].generation);

        let info = registry.get("cron").unwrap();
        assert_eq!(info.state, JobState::Scheduled);
        assert_eq!(info.run_count, 1);
        assert_eq!(info.next_run, Some(at(9, 30)));
    }

    #[test]
    fn test_due_order_and_cancel() {
        let registry = JobRegistry::new();
        registry.register(Job::task_reminder("u1", "b", at(9, 0)), at(8, 0));
        registry.register(Job::task_reminder("u1", "a", at(9, 30)), at(8, 0));
        registry.register(Job::task_reminder("u2", "c", at(11, 0)), at(8, 0));
        assert!(registry.cancel("task_reminder_c_u2"));
        assert!(!registry.cancel("task_reminder_c_u2"));

        let ids: Vec<String> = registry.take_due(at(12, 0)).into_iter().map(|j| j.id).collect();
        assert_eq!(ids, ["task_reminder_b_u1", "task_reminder_a_u1"]);
    }
}
