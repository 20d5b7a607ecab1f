//! Scheduler: the clock loop that fires due jobs.
//! Uses tokio::time::interval for ticking; each fired job runs on its own task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use taskping_core::Clock;

use crate::jobs::{FiredJob, Job, JobInfo, JobRunner};
use crate::registry::JobRegistry;

struct ClockLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the registry, the clock loop and the handles of running jobs.
pub struct Scheduler {
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
    runner: Arc<dyn JobRunner>,
    tick_period: Duration,
    running: AtomicBool,
    clock_loop: Mutex<Option<ClockLoop>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, runner: Arc<dyn JobRunner>, tick_period: Duration) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            clock,
            runner,
            tick_period: tick_period.max(Duration::from_millis(10)),
            running: AtomicBool::new(false),
            clock_loop: Mutex::new(None),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Register (or replace) a job, computing its first run from the scheduler clock.
    pub fn register(&self, job: Job) -> bool {
        self.registry.register(job, self.clock.now())
    }

    pub fn cancel(&self, id: &str) -> bool {
        self.registry.cancel(id)
    }

    pub fn jobs(&self) -> Vec<JobInfo> {
        self.registry.list()
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the clock loop. Returns false if it was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut clock_loop = lock(&self.clock_loop);
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(stale) = clock_loop.take() {
            stale.handle.abort();
        }

        let (shutdown, mut stopped) = watch::channel(false);
        let weak = Arc::downgrade(self);
        let period = self.tick_period;
        tracing::info!("⏰ Scheduler started (check every {}s)", period.as_secs_f64());

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(scheduler) = weak.upgrade() else { break };
                        scheduler.tick();
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("⏹️ Scheduler clock stopped");
        });

        *clock_loop = Some(ClockLoop { shutdown, handle });
        true
    }

    /// Stop firing new jobs. Jobs already running are left to finish.
    pub fn stop(&self) {
        let clock_loop = lock(&self.clock_loop).take();
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(clock_loop) = clock_loop {
            let _ = clock_loop.shutdown.send(true);
        }
        tracing::info!("🛑 Scheduler stopping, {} job(s) still running", self.running_jobs());
    }

    /// Fire every due job. Returns the ids fired; nothing fires while stopped.
    pub fn tick(&self) -> Vec<String> {
        if !self.is_running() {
            return Vec::new();
        }
        let fired = self.registry.take_due(self.clock.now());
        let ids: Vec<String> = fired.iter().map(|job| job.id.clone()).collect();

        let mut in_flight = lock(&self.in_flight);
        in_flight.retain(|handle| !handle.is_finished());
        for job in fired {
            in_flight.push(self.spawn_job(job));
        }
        ids
    }

    fn spawn_job(&self, job: FiredJob) -> JoinHandle<()> {
        let runner = Arc::clone(&self.runner);
        let registry = Arc::clone(&self.registry);

        tokio::spawn(async move {
            let id = job.id.clone();
            let generation = job.generation;
            let started = std::time::Instant::now();

            // Inner task so a panicking handler surfaces as a JoinError here.
            let outcome = tokio::spawn(async move { runner.run(&job).await }).await;
            match outcome {
                Ok(Ok(())) => {
                    tracing::info!("✅ Job '{id}' finished in {}ms", started.elapsed().as_millis());
                }
                Ok(Err(e)) => tracing::error!("❌ Job '{id}' failed: {e}"),
                Err(e) if e.is_panic() => tracing::error!("💥 Job '{id}' panicked"),
                Err(e) => tracing::warn!("⚠️ Job '{id}' was cancelled: {e}"),
            }
            registry.finish(&id, generation);
        })
    }

    /// Number of fired jobs whose handlers have not returned yet.
    pub fn running_jobs(&self) -> usize {
        lock(&self.in_flight).iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every running job to finish.
    pub async fn drain(&self) {
        loop {
            let handles = std::mem::take(&mut *lock(&self.in_flight));
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(clock_loop) = lock(&self.clock_loop).take() {
            clock_loop.handle.abort();
        }
    }
}
