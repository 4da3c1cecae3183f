//! Remote control surface.
//!
//! A `ControllerHandle` is what the HTTP layer, the button poller and the CLI
//! hold. Mutations become queued jobs; reads come from the published
//! [`Status`] snapshot. Nothing here touches the driver.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::config::{Config, ConfigPatch};
use crate::error::{BlindsError, Result};
use crate::scheduler::{Command, JobId, RecurringJob, Scheduler};
use crate::status::{ActuationState, Status, StatusHandle};

pub const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone)]
pub struct ControllerHandle {
    scheduler: Scheduler,
    status: StatusHandle,
}

impl ControllerHandle {
    pub fn new(scheduler: Scheduler, status: StatusHandle) -> Self {
        Self { scheduler, status }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // ---------------------------------------------------------------------------
    // Queued mutations
    // ---------------------------------------------------------------------------

    pub fn open_blinds(&self) -> JobId {
        self.scheduler.submit(Command::Open)
    }

    pub fn close_blinds(&self) -> JobId {
        self.scheduler.submit(Command::Close)
    }

    pub fn set_blinds(&self, position_ms: u64) -> JobId {
        self.scheduler.submit(Command::SetPosition { position_ms })
    }

    pub fn reset_position(&self, position_ms: u64) -> JobId {
        self.scheduler.submit(Command::ResetPosition { position_ms })
    }

    /// Queue a config change. The patch is checked against the current config
    /// up front so a bad request is rejected instead of failing later in the
    /// run loop.
    pub fn reconfigure(&self, patch: ConfigPatch) -> Result<JobId> {
        if patch.is_empty() {
            return Err(BlindsError::InvalidConfig("empty config patch".into()));
        }
        self.status.get().config.merged(&patch).validate()?;
        Ok(self.scheduler.submit(Command::Reconfigure { patch }))
    }

    pub fn submit(&self, command: Command) -> JobId {
        self.scheduler.submit(command)
    }

    // ---------------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------------

    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn get_position(&self) -> u64 {
        self.status.get().position_ms
    }

    pub fn get_state(&self) -> ActuationState {
        self.status.get().state
    }

    pub fn get_config(&self) -> Config {
        self.status.get().config
    }

    pub fn get_recurring(&self) -> Vec<RecurringJob> {
        self.scheduler.list_recurring()
    }

    // ---------------------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------------------

    /// Run `action` once at `at`. Times in the past run on the next drain.
    pub fn schedule_command(&self, at: DateTime<Utc>, action: &str, args: &Value) -> Result<JobId> {
        let command = Command::parse(action, args)?;
        info!("Scheduled {action} at {at}");
        Ok(self.scheduler.schedule_at(at, command))
    }

    /// Register or replace the recurring job `name`. The registry change is
    /// persisted by a queued save.
    pub fn schedule_recurring(
        &self,
        name: &str,
        first: DateTime<Utc>,
        period_secs: u64,
        action: &str,
        args: &Value,
    ) -> Result<JobId> {
        let command = Command::parse(action, args)?;
        let id = self.scheduler.register_recurring(
            name,
            first,
            Duration::from_secs(period_secs),
            command,
        )?;
        self.scheduler.submit(Command::Save);
        Ok(id)
    }

    /// Daily job at `hour:minute` local time, first firing at the next such
    /// instant after now.
    pub fn schedule_daily(
        &self,
        name: &str,
        hour: u32,
        minute: u32,
        action: &str,
        args: &Value,
    ) -> Result<JobId> {
        let first = next_local_time(self.scheduler.now(), hour, minute)?;
        self.schedule_recurring(name, first, SECONDS_PER_DAY, action, args)
    }

    /// Returns whether `name` was registered. A save is queued either way.
    pub fn cancel_recurring(&self, name: &str) -> bool {
        let removed = self.scheduler.cancel_recurring(name);
        self.scheduler.submit(Command::Save);
        removed
    }
}

/// First instant strictly after `now` whose local wall-clock time is
/// `hour:minute`.
pub fn next_local_time(now: DateTime<Utc>, hour: u32, minute: u32) -> Result<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
        BlindsError::InvalidCommand(format!("{hour:02}:{minute:02} is not a time of day"))
    })?;
    let today = now.with_timezone(&Local).date_naive();
    // A day can skip the time entirely on a DST change; try the next few.
    for day in today.iter_days().take(3) {
        let Some(candidate) = day.and_time(time).and_local_timezone(Local).earliest() else {
            continue;
        };
        let candidate = candidate.with_timezone(&Utc);
        if candidate > now {
            return Ok(candidate);
        }
    }
    Err(BlindsError::InvalidCommand(format!(
        "no upcoming local time {hour:02}:{minute:02}"
    )))
}
