//! Position state machine.
//!
//! Position is accumulated motor-on time in milliseconds, not a distance. Every
//! drive re-measures elapsed time on the driver clock and adds that, so
//! scheduler and OS jitter end up in the position instead of being lost.
//! Closing always ends with an authoritative reset to zero.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::{Config, ConfigPatch};
use crate::driver::{ActuatorDriver, Level, PinMode, Pull};
use crate::error::{BlindsError, Result};
use crate::status::{ActuationState, StatusHandle};

/// Settle time around direction changes.
pub const DIRECTION_SETTLE_MS: u64 = 100;

const FORWARD: Level = Level::Low;
const REVERSE: Level = Level::High;

/// `ms` as a signed drive target, or `InvalidCommand` if it does not fit.
fn signed_ms(what: &str, ms: u64) -> Result<i64> {
    i64::try_from(ms)
        .map_err(|_| BlindsError::InvalidCommand(format!("{what} of {ms} ms is out of range")))
}

pub struct Blinds<D: ActuatorDriver> {
    driver: Arc<D>,
    config: Config,
    position: i64,
    state: ActuationState,
    status: StatusHandle,
}

impl<D: ActuatorDriver> Blinds<D> {
    /// Bind the pins named in `config` and start at `position_ms`.
    pub fn new(
        driver: Arc<D>,
        config: Config,
        position_ms: u64,
        status: StatusHandle,
    ) -> Result<Self> {
        let blinds = Self {
            driver,
            config,
            position: signed_ms("position", position_ms)?,
            state: ActuationState::Rest,
            status,
        };
        blinds.bind_pins()?;
        blinds.publish();
        Ok(blinds)
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn position(&self) -> u64 {
        self.position.max(0) as u64
    }

    pub fn state(&self) -> ActuationState {
        self.state
    }

    fn bind_pins(&self) -> Result<()> {
        let c = &self.config;
        debug!(
            motor = c.motor_pin,
            direction = c.direction_pin,
            button = c.button_pin,
            "binding pins"
        );
        self.driver.set_mode(c.motor_pin, PinMode::Output)?;
        self.driver.set_mode(c.direction_pin, PinMode::Output)?;
        self.driver.write(c.motor_pin, Level::Low)?;
        self.driver.write(c.direction_pin, FORWARD)?;
        self.driver.set_mode(c.button_pin, PinMode::Input)?;
        self.driver
            .set_pull(c.button_pin, Pull::holding(c.button_idle_level))?;
        Ok(())
    }

    fn publish(&self) {
        let position_ms = self.position();
        let state = self.state;
        let config = self.config.clone();
        self.status.update(|s| {
            s.position_ms = position_ms;
            s.state = state;
            s.config = config;
        });
    }

    fn record_fault(&self, message: String) {
        self.status.update(|s| s.last_fault = Some(message));
    }

    // ---------------------------------------------------------------------------
    // Operations
    // ---------------------------------------------------------------------------

    /// Drive until the accumulated motor-on time reaches `target`.
    ///
    /// A negative target is allowed; `close` uses it to overdrive into the
    /// stop. The stored position never goes below zero.
    pub fn set_position(&mut self, target: i64) -> Result<()> {
        let diff = target.saturating_sub(self.position);
        debug!(target, position = self.position, diff, "set_position");

        let outcome = if diff > 0 {
            self.state = ActuationState::Opening;
            self.publish();
            info!("Opening blinds for {diff} ms");
            self.drive(diff.unsigned_abs()).map(saturating_signed)
        } else if diff < 0 {
            self.state = ActuationState::Closing;
            self.publish();
            info!("Closing blinds for {} ms", -diff);
            self.drive_reverse(diff.unsigned_abs())
                .map(|elapsed| -saturating_signed(elapsed))
        } else {
            Ok(0)
        };

        match outcome {
            Ok(moved) => {
                self.position = self.position.saturating_add(moved).max(0);
                self.state = ActuationState::Rest;
                self.publish();
                if moved != 0 {
                    self.status.update(|s| s.last_fault = None);
                }
                debug!(position = self.position, "blinds at rest");
                Ok(())
            }
            Err(e) => {
                error!(state = ?self.state, "actuation aborted: {e}");
                self.record_fault(e.to_string());
                self.abort_motion();
                Err(e)
            }
        }
    }

    /// Drive to a non-negative position. Targets that do not fit the signed
    /// position are rejected without moving.
    pub fn move_to(&mut self, position_ms: u64) -> Result<()> {
        self.set_position(signed_ms("position", position_ms)?)
    }

    pub fn open(&mut self) -> Result<()> {
        self.move_to(self.config.open_duration_ms)
    }

    /// Overdrive past the closed stop by `close_offset_ms`, then declare the
    /// position zero regardless of what was measured.
    pub fn close(&mut self) -> Result<()> {
        let offset = signed_ms("close_offset_ms", self.config.close_offset_ms)?;
        self.set_position(-offset)?;
        self.reset_position(0)
    }

    pub fn reset_position(&mut self, position_ms: u64) -> Result<()> {
        let position = signed_ms("position", position_ms)?;
        info!("Resetting position to {position_ms} ms");
        self.position = position;
        self.publish();
        Ok(())
    }

    /// Merge `patch` into the live config and re-bind pins if any changed.
    ///
    /// Runs as a queued job, so no drive holding the old pin numbers can be in
    /// flight.
    pub fn reconfigure(&mut self, patch: &ConfigPatch) -> Result<()> {
        let next = self.config.merged(patch);
        next.validate()?;
        if patch.touches_pins() {
            // Leave the old motor pin idle before handing control to the new one.
            self.driver.write(self.config.motor_pin, Level::Low)?;
            self.driver.write(self.config.direction_pin, FORWARD)?;
        }
        self.config = next;
        if patch.touches_pins() {
            self.bind_pins()?;
        }
        info!("Reconfigured: {:?}", self.config);
        self.publish();
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Motor primitives
    // ---------------------------------------------------------------------------

    /// Energize the motor for `ms` and return the measured on-time.
    fn drive(&self, ms: u64) -> Result<u64> {
        let motor = self.config.motor_pin;
        let t0 = self.driver.now_ms();
        self.driver.write(motor, Level::High)?;
        self.driver.sleep_ms(ms);
        self.driver.write(motor, Level::Low)?;
        Ok(self.driver.now_ms().saturating_sub(t0))
    }

    fn drive_reverse(&self, ms: u64) -> Result<u64> {
        let dir = self.config.direction_pin;
        self.driver.write(dir, REVERSE)?;
        self.driver.sleep_ms(DIRECTION_SETTLE_MS);
        let elapsed = self.drive(ms)?;
        self.driver.sleep_ms(DIRECTION_SETTLE_MS);
        self.driver.write(dir, FORWARD)?;
        Ok(elapsed)
    }

    /// Best effort: stop the motor and restore the forward direction after a
    /// fault. Secondary failures are only logged.
    fn abort_motion(&self) {
        if let Err(e) = self.driver.write(self.config.motor_pin, Level::Low) {
            error!("could not stop motor after fault: {e}");
        }
        if let Err(e) = self.driver.write(self.config.direction_pin, FORWARD) {
            error!("could not restore direction after fault: {e}");
        }
    }
}

fn saturating_signed(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}
