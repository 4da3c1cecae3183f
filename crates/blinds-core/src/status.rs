//! Read-only view of the controller for the network boundary.
//!
//! The run loop owns the position state machine outright; remote readers see a
//! copy published after every change instead of touching the live object.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::Config;

/// What the motor is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActuationState {
    #[default]
    Rest,
    Opening,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub position_ms: u64,
    pub state: ActuationState,
    pub config: Config,
    /// Most recent actuator or persistence fault. Cleared by the next
    /// successful actuation.
    pub last_fault: Option<String>,
}

impl Status {
    pub fn new(config: Config, position_ms: u64) -> Self {
        Self {
            position_ms,
            state: ActuationState::Rest,
            config,
            last_fault: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusHandle {
    inner: Arc<RwLock<Status>>,
}

impl StatusHandle {
    pub fn new(status: Status) -> Self {
        Self {
            inner: Arc::new(RwLock::new(status)),
        }
    }

    pub fn get(&self) -> Status {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut Status)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}
