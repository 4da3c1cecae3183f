//! Ordered job queue and recurring-job registry.
//!
//! Plain data structure with no locking and no clock; [`super::Scheduler`]
//! wraps it in a mutex and supplies the current time.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::command::{Command, DedupKey, PRIORITY_SCHEDULED};
use super::job::{Job, JobId, RecurringJob, Task};

/// Sort key: due time, then priority, then insertion order.
type JobKey = (DateTime<Utc>, u8, JobId);

#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: BTreeMap<JobKey, Job>,
    index: HashMap<JobId, JobKey>,
    recurring: BTreeMap<String, RecurringJob>,
    next_id: JobId,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn push(&mut self, at: DateTime<Utc>, priority: u8, task: Task) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        let key = (at, priority, id);
        debug!(id, %at, priority, ?task, "queued");
        self.jobs.insert(
            key,
            Job {
                id,
                scheduled_at: at,
                priority,
                task,
            },
        );
        self.index.insert(id, key);
        id
    }

    /// Remove a pending job. Returns false if it already ran or was cancelled.
    pub fn cancel(&mut self, id: JobId) -> bool {
        match self.index.remove(&id) {
            Some(key) => {
                debug!(id, "cancelled");
                self.jobs.remove(&key).is_some()
            }
            None => false,
        }
    }

    /// Cancel every pending `Execute` job sharing `command`'s dedup key, then
    /// queue `command`. Commands without a dedup key are queued as-is.
    pub fn dedup_push(&mut self, at: DateTime<Utc>, priority: u8, command: Command) -> JobId {
        if let Some(key) = command.dedup_key() {
            let superseded: Vec<JobId> = self
                .jobs
                .values()
                .filter(|job| match &job.task {
                    Task::Execute { command } => command.dedup_key() == Some(key),
                    _ => false,
                })
                .map(|job| job.id)
                .collect();
            for id in superseded {
                self.cancel(id);
            }
        }
        self.push(at, priority, Task::Execute { command })
    }

    /// Pending `Execute` jobs for `key`, oldest first.
    pub fn pending_for(&self, key: DedupKey) -> Vec<&Job> {
        self.jobs
            .values()
            .filter(|job| match &job.task {
                Task::Execute { command } => command.dedup_key() == Some(key),
                _ => false,
            })
            .collect()
    }

    /// Pop the first job due at or before `now`.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<Job> {
        let key = *self.jobs.keys().next()?;
        if key.0 > now {
            return None;
        }
        self.index.remove(&key.2);
        self.jobs.remove(&key)
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.jobs.keys().next().map(|(at, _, _)| *at)
    }

    /// Every pending job in execution order.
    pub fn pending(&self) -> Vec<Job> {
        self.jobs.values().cloned().collect()
    }

    // ---------------------------------------------------------------------------
    // Recurring registry
    // ---------------------------------------------------------------------------

    /// Queue an occurrence of `name` at `at` and make it the registry's live
    /// occurrence, cancelling whichever occurrence it replaces.
    pub fn register_recurring(
        &mut self,
        name: &str,
        at: DateTime<Utc>,
        period: Duration,
        command: Command,
    ) -> JobId {
        let id = self.push(
            at,
            PRIORITY_SCHEDULED,
            Task::Recurring {
                name: name.to_string(),
                command: command.clone(),
                period,
            },
        );
        let entry = RecurringJob {
            name: name.to_string(),
            command,
            period,
            next_fire_time: at,
            job_id: Some(id),
        };
        if let Some(stale) = self
            .recurring
            .insert(name.to_string(), entry)
            .and_then(|prev| prev.job_id)
        {
            self.cancel(stale);
        }
        info!("Recurring '{name}' next fires at {at}");
        id
    }

    /// Queue the occurrence after `fired`, one period after its *scheduled*
    /// time. Skipped when the registry no longer points at `fired`, i.e. the
    /// name was cancelled or re-registered while the occurrence ran.
    pub fn rearm(&mut self, fired: &Job) -> Option<JobId> {
        let Task::Recurring {
            name,
            command,
            period,
        } = &fired.task
        else {
            return None;
        };
        let live = self.recurring.get(name).and_then(|r| r.job_id);
        if live != Some(fired.id) {
            debug!(name, "recurring occurrence superseded, not re-arming");
            return None;
        }
        let Some(next) = chrono::Duration::from_std(*period)
            .ok()
            .and_then(|step| fired.scheduled_at.checked_add_signed(step))
        else {
            warn!(name, "next occurrence is past the end of time, dropping recurring job");
            self.recurring.remove(name);
            return None;
        };
        Some(self.register_recurring(name, next, *period, command.clone()))
    }

    /// Remove `name` from the registry and cancel its pending occurrence.
    /// Unknown names are ignored.
    pub fn cancel_recurring(&mut self, name: &str) -> bool {
        match self.recurring.remove(name) {
            Some(entry) => {
                if let Some(id) = entry.job_id {
                    self.cancel(id);
                }
                info!("Recurring '{name}' cancelled");
                true
            }
            None => false,
        }
    }

    pub fn recurring(&self) -> Vec<RecurringJob> {
        self.recurring.values().cloned().collect()
    }
}
