pub mod config;
pub mod led_test;
pub mod serve;

use std::sync::Arc;

use blinds_core::driver::SimulatedDriver;

/// Pin backend for every mode. GPIO access is provided by the board support
/// layer; this binary drives simulated pins in real time.
pub fn pin_driver() -> Arc<SimulatedDriver> {
    tracing::warn!("No GPIO backend linked, driving simulated pins");
    Arc::new(SimulatedDriver::realtime())
}
