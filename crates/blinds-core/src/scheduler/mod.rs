//! Command scheduler.
//!
//! One queue serializes every mutating operation. Producers (the network
//! boundary, the button poller, recurring occurrences) only ever enqueue; the
//! run loop in [`crate::controller`] is the single consumer and runs one job
//! to completion before looking at the next.
//!
//! [`Scheduler`] is a cheap, cloneable handle around the shared queue and is
//! safe to call from any thread while the run loop drains it.

pub mod command;
pub mod job;
pub mod queue;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::Clock;
use crate::error::{BlindsError, Result};

pub use command::{Command, DedupKey, PRIORITY_DEFAULT, PRIORITY_MOTION, PRIORITY_SCHEDULED};
pub use job::{Job, JobId, RecurringJob, Task};
pub use queue::JobQueue;

#[derive(Clone)]
pub struct Scheduler {
    queue: Arc<Mutex<JobQueue>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queue", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(JobQueue::new())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, JobQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---------------------------------------------------------------------------
    // Producers
    // ---------------------------------------------------------------------------

    /// Queue `command` to run as soon as the loop gets to it.
    pub fn enqueue(&self, command: Command, priority: u8) -> JobId {
        let now = self.now();
        self.lock().push(now, priority, Task::Execute { command })
    }

    /// Like `enqueue`, but first cancels every pending job with the same
    /// dedup key. Afterwards at most one such job is pending: this one.
    pub fn dedup_enqueue(&self, command: Command, priority: u8) -> JobId {
        let now = self.now();
        self.lock().dedup_push(now, priority, command)
    }

    /// The queued front door: motion commands and saves are deduplicated,
    /// everything else is appended.
    pub fn submit(&self, command: Command) -> JobId {
        let priority = command.priority();
        if command.dedup_key().is_some() {
            self.dedup_enqueue(command, priority)
        } else {
            self.enqueue(command, priority)
        }
    }

    /// One-shot command at an absolute time. When due it goes through
    /// [`Scheduler::submit`].
    pub fn schedule_at(&self, at: DateTime<Utc>, command: Command) -> JobId {
        self.lock()
            .push(at, PRIORITY_SCHEDULED, Task::Deferred { command })
    }

    /// Register (or replace) the recurring job `name`, first firing at
    /// `first` and then every `period` after its previous scheduled time.
    pub fn register_recurring(
        &self,
        name: &str,
        first: DateTime<Utc>,
        period: Duration,
        command: Command,
    ) -> Result<JobId> {
        if name.trim().is_empty() {
            return Err(BlindsError::InvalidCommand(
                "recurring job name is empty".into(),
            ));
        }
        if period.as_secs() == 0 {
            return Err(BlindsError::InvalidCommand(format!(
                "recurring job '{name}' needs a period of at least one second"
            )));
        }
        let second = chrono::Duration::from_std(period)
            .ok()
            .and_then(|step| first.checked_add_signed(step));
        if second.is_none() {
            return Err(BlindsError::InvalidCommand(format!(
                "recurring job '{name}' period of {}s is out of range",
                period.as_secs()
            )));
        }
        Ok(self.lock().register_recurring(name, first, period, command))
    }

    /// Returns whether `name` was registered.
    pub fn cancel_recurring(&self, name: &str) -> bool {
        self.lock().cancel_recurring(name)
    }

    pub fn list_recurring(&self) -> Vec<RecurringJob> {
        self.lock().recurring()
    }

    pub fn cancel(&self, id: JobId) -> bool {
        self.lock().cancel(id)
    }

    // ---------------------------------------------------------------------------
    // Consumer side
    // ---------------------------------------------------------------------------

    pub fn pop_due(&self) -> Option<Job> {
        let now = self.now();
        self.lock().pop_due(now)
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.lock().next_due()
    }

    pub fn rearm(&self, fired: &Job) -> Option<JobId> {
        self.lock().rearm(fired)
    }

    /// Re-queue a job restored from a snapshot at its original time and
    /// priority.
    pub fn requeue(&self, job: Job) -> JobId {
        self.lock().push(job.scheduled_at, job.priority, job.task)
    }

    pub fn pending(&self) -> Vec<Job> {
        self.lock().pending()
    }

    pub fn pending_for(&self, key: DedupKey) -> Vec<Job> {
        self.lock().pending_for(key).into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn scheduler() -> (Arc<ManualClock>, Scheduler) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let s = Scheduler::new(clock.clone());
        (clock, s)
    }

    #[test]
    fn submit_dedups_motion_and_save() {
        let (_clock, s) = scheduler();
        s.submit(Command::SetPosition { position_ms: 6000 });
        s.submit(Command::Save);
        s.submit(Command::SetPosition { position_ms: 2000 });
        s.submit(Command::Save);
        s.submit(Command::ResetPosition { position_ms: 0 });
        s.submit(Command::ResetPosition { position_ms: 0 });

        let motion = s.pending_for(DedupKey::Motion);
        assert_eq!(motion.len(), 1);
        assert_eq!(
            motion[0].task.command(),
            &Command::SetPosition { position_ms: 2000 }
        );
        assert_eq!(s.pending_for(DedupKey::Save).len(), 1);
        assert_eq!(s.pending().len(), 4);
    }

    #[test]
    fn motion_runs_before_same_time_default_jobs() {
        let (_clock, s) = scheduler();
        s.submit(Command::Save);
        s.submit(Command::Open);
        let first = s.pop_due().unwrap();
        assert_eq!(first.task.command(), &Command::Open);
    }

    #[test]
    fn schedule_at_waits_for_its_time() {
        let (clock, s) = scheduler();
        let at = clock.now() + chrono::Duration::minutes(5);
        s.schedule_at(at, Command::Close);
        assert!(s.pop_due().is_none());
        clock.set(at);
        let job = s.pop_due().unwrap();
        assert!(matches!(job.task, Task::Deferred { .. }));
    }

    #[test]
    fn register_recurring_rejects_bad_input() {
        let (clock, s) = scheduler();
        let err = s
            .register_recurring("tick", clock.now(), Duration::ZERO, Command::Open)
            .unwrap_err();
        assert!(matches!(err, BlindsError::InvalidCommand(_)));
        assert!(s
            .register_recurring(" ", clock.now(), Duration::from_secs(1), Command::Open)
            .is_err());
        assert!(s.pending().is_empty());
    }

    #[test]
    fn register_recurring_rejects_unrepresentable_period() {
        let (clock, s) = scheduler();
        let err = s
            .register_recurring(
                "x",
                clock.now(),
                Duration::from_secs(10_000_000_000_000),
                Command::Save,
            )
            .unwrap_err();
        assert!(matches!(err, BlindsError::InvalidCommand(_)));
        assert!(err.to_string().contains("out of range"));
        assert!(s.pending().is_empty());
        assert!(s.list_recurring().is_empty());
    }

    #[test]
    fn producers_on_other_threads_share_the_queue() {
        let (_clock, s) = scheduler();
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let s = s.clone();
                std::thread::spawn(move || {
                    s.submit(Command::SetPosition { position_ms: i });
                    s.submit(Command::ResetPosition { position_ms: i });
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(s.pending_for(DedupKey::Motion).len(), 1);
        assert_eq!(s.pending().len(), 9);
    }
}
