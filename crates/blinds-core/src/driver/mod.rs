//! Actuator driver capability.
//!
//! The core never toggles hardware directly. Everything it needs from the
//! board (pin modes, pull resistors, output writes, input reads, sleeping and
//! a monotonic millisecond clock) goes through [`ActuatorDriver`], which is
//! constructed once at process start and injected into the state machine.

pub mod simulated;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BlindsError;

pub use simulated::{PinEvent, SimulatedDriver};

/// Board pin number as understood by the driver.
pub type Pin = u8;

// ---------------------------------------------------------------------------
// Level / PinMode / Pull
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl std::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinMode {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pull {
    Off,
    Down,
    Up,
}

impl Pull {
    /// Pull that holds an input at `idle` while nothing drives it.
    pub fn holding(idle: Level) -> Self {
        match idle {
            Level::High => Pull::Up,
            Level::Low => Pull::Down,
        }
    }
}

// ---------------------------------------------------------------------------
// DriverError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pin {pin}: {reason}")]
pub struct DriverError {
    pub pin: Pin,
    pub reason: String,
}

impl DriverError {
    pub fn new(pin: Pin, reason: impl Into<String>) -> Self {
        Self {
            pin,
            reason: reason.into(),
        }
    }
}

impl From<DriverError> for BlindsError {
    fn from(e: DriverError) -> Self {
        BlindsError::ActuatorFault {
            pin: e.pin,
            reason: e.reason,
        }
    }
}

// ---------------------------------------------------------------------------
// ActuatorDriver
// ---------------------------------------------------------------------------

/// Digital I/O and timing capability used by the position state machine and
/// the debounce classifier.
///
/// Methods take `&self`: a single driver is shared between the run loop and
/// the button poller thread, so implementations synchronize internally.
pub trait ActuatorDriver: Send + Sync {
    fn set_mode(&self, pin: Pin, mode: PinMode) -> Result<(), DriverError>;

    fn set_pull(&self, pin: Pin, pull: Pull) -> Result<(), DriverError>;

    fn write(&self, pin: Pin, level: Level) -> Result<(), DriverError>;

    fn read(&self, pin: Pin) -> Result<Level, DriverError>;

    /// Block the calling thread for roughly `ms` milliseconds.
    fn sleep_ms(&self, ms: u64);

    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;
}

impl<T: ActuatorDriver + ?Sized> ActuatorDriver for Arc<T> {
    fn set_mode(&self, pin: Pin, mode: PinMode) -> Result<(), DriverError> {
        (**self).set_mode(pin, mode)
    }

    fn set_pull(&self, pin: Pin, pull: Pull) -> Result<(), DriverError> {
        (**self).set_pull(pin, pull)
    }

    fn write(&self, pin: Pin, level: Level) -> Result<(), DriverError> {
        (**self).write(pin, level)
    }

    fn read(&self, pin: Pin) -> Result<Level, DriverError> {
        (**self).read(pin)
    }

    fn sleep_ms(&self, ms: u64) {
        (**self).sleep_ms(ms)
    }

    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
