//! Job data model.
//!
//! A `Job` is one queued unit of work: what to do (`Task`) and when
//! (`scheduled_at`, then `priority`, then insertion order). Lifecycle:
//!
//! `Pending → Running → Done`, or `Pending → Cancelled`.
//!
//! Only `Pending` jobs live in the queue; the run loop removes a job before it
//! starts running it, so cancelling a running job is a no-op.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

use super::command::Command;

/// Handle returned by every enqueue operation. Monotonic per queue, so it
/// doubles as the insertion-order tie-break.
pub type JobId = u64;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    /// Run the command against the state machine.
    Execute { command: Command },
    /// One-shot scheduled command. When due it is submitted through the
    /// normal front door, so it takes part in deduplication at that time.
    Deferred { command: Command },
    /// One occurrence of a named recurring job.
    Recurring {
        name: String,
        command: Command,
        #[serde(
            serialize_with = "serialize_duration",
            deserialize_with = "deserialize_duration"
        )]
        period: Duration,
    },
}

impl Task {
    pub fn command(&self) -> &Command {
        match self {
            Task::Execute { command }
            | Task::Deferred { command }
            | Task::Recurring { command, .. } => command,
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub scheduled_at: DateTime<Utc>,
    /// Lower runs first among jobs due at the same instant.
    pub priority: u8,
    pub task: Task,
}

// ---------------------------------------------------------------------------
// RecurringJob
// ---------------------------------------------------------------------------

/// Registry entry for a named recurring job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringJob {
    pub name: String,
    pub command: Command,
    #[serde(
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub period: Duration,
    pub next_fire_time: DateTime<Utc>,
    /// Queued occurrence currently representing this entry. Not persisted;
    /// reloading re-registers the entry under a fresh id.
    #[serde(skip)]
    pub job_id: Option<JobId>,
}

// ---------------------------------------------------------------------------
// Serde helpers for Duration (serialized as seconds: u64)
// ---------------------------------------------------------------------------

fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_u64(d.as_secs())
}

fn deserialize_duration<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(d)?;
    Ok(Duration::from_secs(secs))
}
