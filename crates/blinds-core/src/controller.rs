//! Single-threaded run loop.
//!
//! `Controller` owns the position state machine and is the only consumer of
//! the scheduler queue. It pops due jobs in order and runs each one to
//! completion, so two actuations can never overlap on the motor pins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::driver::ActuatorDriver;
use crate::error::Result;
use crate::handle::ControllerHandle;
use crate::position::Blinds;
use crate::scheduler::{Command, Job, Scheduler, Task};
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::status::{Status, StatusHandle};

pub struct Controller<D: ActuatorDriver> {
    blinds: Blinds<D>,
    scheduler: Scheduler,
    status: StatusHandle,
}

impl<D: ActuatorDriver> Controller<D> {
    /// Fresh controller at position zero with an empty queue.
    pub fn new(driver: Arc<D>, config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::restore(driver, Snapshot::new(config, 0), clock)
    }

    /// Rebuild a controller from `snapshot`, binding pins on `driver` from the
    /// restored config and re-registering every recurring job at its stored
    /// next fire time. Occurrences already in the past fire on the first
    /// drain and catch up from there.
    pub fn restore(driver: Arc<D>, snapshot: Snapshot, clock: Arc<dyn Clock>) -> Result<Self> {
        snapshot.config.validate()?;
        let status = StatusHandle::new(Status::new(
            snapshot.config.clone(),
            snapshot.position_ms,
        ));
        let blinds = Blinds::new(driver, snapshot.config, snapshot.position_ms, status.clone())?;
        let scheduler = Scheduler::new(clock);

        for entry in snapshot.recurring {
            scheduler.register_recurring(
                &entry.name,
                entry.next_fire_time,
                entry.period,
                entry.command,
            )?;
        }
        for job in snapshot.pending {
            match &job.task {
                Task::Recurring { .. } => {}
                Task::Execute {
                    command: Command::Save,
                } => {}
                _ => {
                    scheduler.requeue(job);
                }
            }
        }

        Ok(Self {
            blinds,
            scheduler,
            status,
        })
    }

    /// Load the snapshot at `config.save_path`, falling back to a fresh
    /// controller built from `config` when there is none or it is unusable.
    pub fn load(driver: Arc<D>, config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = SnapshotStore::new(&config.save_path);
        if let Some(mut snapshot) = store.load() {
            // Keep saving where we loaded from.
            snapshot.config.save_path = config.save_path.clone();
            match Self::restore(driver.clone(), snapshot, clock.clone()) {
                Ok(controller) => return Ok(controller),
                Err(e) => warn!("Discarding unusable snapshot: {e}"),
            }
        }
        Self::new(driver, config, clock)
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle::new(self.scheduler.clone(), self.status.clone())
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn blinds(&self) -> &Blinds<D> {
        &self.blinds
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            recurring: self.scheduler.list_recurring(),
            pending: self.scheduler.pending(),
            ..Snapshot::new(self.blinds.config().clone(), self.blinds.position())
        }
    }

    // ---------------------------------------------------------------------------
    // Run loop
    // ---------------------------------------------------------------------------

    /// Run every job that is due now. Returns when the queue holds nothing
    /// due, with the time of the next pending job.
    pub fn run_pending(&mut self) -> Option<DateTime<Utc>> {
        while let Some(job) = self.scheduler.pop_due() {
            self.execute(job);
        }
        self.scheduler.next_due()
    }

    /// Drain due jobs until `shutdown` is set, sleeping at most `poll_period`
    /// between drains so newly submitted work is picked up promptly.
    pub fn run_forever(&mut self, poll_period: std::time::Duration, shutdown: &AtomicBool) {
        info!("Starting scheduler");
        while !shutdown.load(Ordering::Relaxed) {
            let wait = match self.run_pending() {
                Some(at) => (at - self.scheduler.now())
                    .to_std()
                    .unwrap_or_default()
                    .min(poll_period),
                None => poll_period,
            };
            std::thread::sleep(wait);
        }
        info!("Scheduler stopped");
    }

    fn execute(&mut self, job: Job) {
        debug!(id = job.id, at = %job.scheduled_at, task = ?job.task, "running job");
        match &job.task {
            Task::Execute { command } => {
                self.apply(command);
                if command.is_mutating() {
                    self.scheduler.submit(Command::Save);
                }
            }
            Task::Deferred { command } => {
                self.scheduler.submit(command.clone());
            }
            Task::Recurring { name, command, .. } => {
                info!("Recurring '{name}' fired: {}", command.action_name());
                self.scheduler.submit(command.clone());
                self.scheduler.rearm(&job);
                self.scheduler.submit(Command::Save);
            }
        }
    }

    fn apply(&mut self, command: &Command) {
        let result = match command {
            Command::Open => self.blinds.open(),
            Command::Close => self.blinds.close(),
            Command::SetPosition { position_ms } => self.blinds.move_to(*position_ms),
            Command::ResetPosition { position_ms } => self.blinds.reset_position(*position_ms),
            Command::Reconfigure { patch } => self.blinds.reconfigure(patch),
            Command::Save => {
                self.save();
                Ok(())
            }
        };
        if let Err(e) = result {
            error!("{} failed: {e}", command.action_name());
            self.status.update(|s| s.last_fault = Some(e.to_string()));
        }
    }

    /// Write the snapshot. Failure is logged and remembered; the controller
    /// keeps running from memory until a later save succeeds.
    pub fn save(&mut self) {
        let store = SnapshotStore::new(&self.blinds.config().save_path);
        if let Err(e) = store.save(&self.snapshot()) {
            warn!("Snapshot not saved, continuing in memory: {e}");
            self.status.update(|s| s.last_fault = Some(e.to_string()));
        }
    }
}
