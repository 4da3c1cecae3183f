//! Button poller.
//!
//! Runs on its own thread, classifies presses with [`classify_press`] and
//! turns them into queued commands. It never drives the motor itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::debounce::{classify_press, Press};
use crate::driver::ActuatorDriver;
use crate::handle::ControllerHandle;
use crate::scheduler::Command;

/// Sleep between classifications while nothing is pressed.
pub const IDLE_POLL_MS: u64 = 10;

pub struct ButtonPoller<D: ActuatorDriver + ?Sized> {
    driver: Arc<D>,
    handle: ControllerHandle,
    idle_poll_ms: u64,
}

impl<D: ActuatorDriver + ?Sized + 'static> ButtonPoller<D> {
    pub fn new(driver: Arc<D>, handle: ControllerHandle) -> Self {
        Self {
            driver,
            handle,
            idle_poll_ms: IDLE_POLL_MS,
        }
    }

    pub fn with_idle_poll_ms(mut self, ms: u64) -> Self {
        self.idle_poll_ms = ms;
        self
    }

    /// What a press means given the current position: a short press toggles,
    /// a long press always closes.
    pub fn command_for(press: Press, position_ms: u64) -> Option<Command> {
        match press {
            Press::NoPress => None,
            Press::ShortPress if position_ms > 0 => Some(Command::Close),
            Press::ShortPress => Some(Command::Open),
            Press::LongPress => Some(Command::Close),
        }
    }

    /// Classify one gesture and submit the resulting command, if any.
    pub fn poll_once(&self) -> Press {
        // Pin numbers can change under reconfigure; always use the live ones.
        let config = self.handle.get_config();
        let press = match classify_press(&*self.driver, &config) {
            Ok(press) => press,
            Err(e) => {
                warn!("button read failed: {e}");
                return Press::NoPress;
            }
        };
        if let Some(command) = Self::command_for(press, self.handle.get_position()) {
            info!("Button {press:?}: {}", command.action_name());
            self.handle.submit(command);
        }
        press
    }

    pub fn run(&self, shutdown: &AtomicBool) {
        debug!("button poller started");
        while !shutdown.load(Ordering::Relaxed) {
            if self.poll_once() == Press::NoPress {
                self.driver.sleep_ms(self.idle_poll_ms);
            }
        }
        debug!("button poller stopped");
    }

    pub fn spawn(self, shutdown: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("button".into())
            .spawn(move || self.run(&shutdown))
    }
}
