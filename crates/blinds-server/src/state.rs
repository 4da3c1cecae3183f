use std::sync::Arc;

use blinds_core::debounce::{classify_press, Press};
use blinds_core::driver::{ActuatorDriver, DriverError};
use blinds_core::handle::ControllerHandle;

/// Blocking one-shot button classification.
pub type ButtonProbe = Arc<dyn Fn() -> Result<Press, DriverError> + Send + Sync>;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub handle: ControllerHandle,
    pub button: ButtonProbe,
}

impl AppState {
    pub fn new(handle: ControllerHandle, button: ButtonProbe) -> Self {
        Self { handle, button }
    }

    /// Probe the button on `driver` using whatever pins the controller is
    /// currently configured with.
    pub fn with_driver<D>(handle: ControllerHandle, driver: Arc<D>) -> Self
    where
        D: ActuatorDriver + ?Sized + 'static,
    {
        let live = handle.clone();
        let button: ButtonProbe = Arc::new(move || classify_press(&*driver, &live.get_config()));
        Self::new(handle, button)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blinds_core::clock::ManualClock;
    use blinds_core::config::Config;
    use blinds_core::driver::{Level, SimulatedDriver};
    use blinds_core::scheduler::Scheduler;
    use blinds_core::status::{Status, StatusHandle};

    #[test]
    fn driver_probe_reads_the_configured_button() {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let status = StatusHandle::new(Status::new(Config::default(), 0));
        let handle = ControllerHandle::new(Scheduler::new(clock), status);
        let drv = Arc::new(SimulatedDriver::new());
        drv.script_input(28, &[(0, Level::Low), (100, Level::High)]);
        let state = AppState::with_driver(handle, drv);
        assert_eq!((state.button)().unwrap(), Press::ShortPress);
    }
}
