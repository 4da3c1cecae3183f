use std::sync::Arc;

use anyhow::Result;
use blinds_core::config::Config;
use blinds_core::driver::ActuatorDriver;
use blinds_core::position::Blinds;
use blinds_core::status::{Status, StatusHandle};

/// Pause between the open and the close of each cycle.
const HOLD_MS: u64 = 10_000;

/// Open, hold, close, repeat. Drives the state machine directly with no
/// scheduler, so nothing else can interleave.
pub fn run(config: Config, cycles: Option<u32>) -> Result<()> {
    let driver = super::pin_driver();
    cycle(driver, config, cycles, HOLD_MS)
}

fn cycle<D: ActuatorDriver>(
    driver: Arc<D>,
    config: Config,
    cycles: Option<u32>,
    hold_ms: u64,
) -> Result<()> {
    let status = StatusHandle::new(Status::new(config.clone(), 0));
    let mut blinds = Blinds::new(driver.clone(), config, 0, status)?;
    let mut done = 0u32;
    while cycles.map_or(true, |n| done < n) {
        blinds.open()?;
        driver.sleep_ms(hold_ms);
        blinds.close()?;
        driver.sleep_ms(hold_ms);
        done += 1;
        tracing::info!("LED test cycle {done} complete");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blinds_core::driver::SimulatedDriver;

    #[test]
    fn each_cycle_opens_then_closes() {
        let drv = Arc::new(SimulatedDriver::new());
        let config = Config {
            open_duration_ms: 1000,
            close_offset_ms: 200,
            ..Config::default()
        };
        cycle(drv.clone(), config, Some(2), 500).unwrap();
        let motor = drv.pulses(0);
        assert_eq!(motor.len(), 4);
        assert_eq!(motor[0], (0, 1000));
        // close: 500 ms hold, 100 ms direction settle, 1200 ms reverse
        assert_eq!(motor[1], (1600, 2800));
        assert_eq!(drv.pulses(2).len(), 2);
    }
}
