//! In-memory driver used by tests and by the CLI's dry-run hardware mode.
//!
//! Two timing flavours are available:
//!
//! - [`SimulatedDriver::new`] keeps a virtual clock that only advances when
//!   something sleeps, so actuation timing is fully deterministic.
//! - [`SimulatedDriver::realtime`] sleeps the calling thread and reads a real
//!   monotonic clock, which is what a dry run on a development machine wants.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{ActuatorDriver, DriverError, Level, Pin, PinMode, Pull};

/// Output writes kept for [`SimulatedDriver::writes`]; older ones are
/// dropped so a long-running dry run stays bounded.
pub const WRITE_LOG_CAP: usize = 4096;

/// One recorded output write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    pub at_ms: u64,
    pub pin: Pin,
    pub level: Level,
}

#[derive(Debug)]
enum Timing {
    Virtual,
    Realtime(Instant),
}

#[derive(Debug, Default)]
struct SimState {
    virtual_ms: u64,
    sleep_jitter_ms: u64,
    modes: HashMap<Pin, PinMode>,
    pulls: HashMap<Pin, Pull>,
    outputs: HashMap<Pin, Level>,
    /// Absolute-time input timelines, sorted by time.
    inputs: HashMap<Pin, Vec<(u64, Level)>>,
    faults: HashSet<Pin>,
    log: VecDeque<PinEvent>,
}

#[derive(Debug)]
pub struct SimulatedDriver {
    timing: Timing,
    state: Mutex<SimState>,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    /// Driver with a virtual clock starting at 0 ms.
    pub fn new() -> Self {
        Self {
            timing: Timing::Virtual,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Driver that really sleeps and reads a monotonic clock.
    pub fn realtime() -> Self {
        Self {
            timing: Timing::Realtime(Instant::now()),
            state: Mutex::new(SimState::default()),
        }
    }

    /// Every virtual sleep overshoots by `ms`, the way an OS scheduler does.
    pub fn with_sleep_jitter(self, ms: u64) -> Self {
        self.lock().sleep_jitter_ms = ms;
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now_locked(&self, state: &SimState) -> u64 {
        match &self.timing {
            Timing::Virtual => state.virtual_ms,
            Timing::Realtime(origin) => origin.elapsed().as_millis() as u64,
        }
    }

    /// Hold `pin` at `level` from now on.
    pub fn set_input(&self, pin: Pin, level: Level) {
        let mut state = self.lock();
        let now = self.now_locked(&state);
        state.inputs.insert(pin, vec![(now, level)]);
    }

    /// Replace the input timeline for `pin`. Offsets are relative to now;
    /// the pin reads the level of the latest entry whose offset has passed.
    pub fn script_input(&self, pin: Pin, timeline: &[(u64, Level)]) {
        let mut state = self.lock();
        let now = self.now_locked(&state);
        let mut entries: Vec<(u64, Level)> = timeline
            .iter()
            .map(|(offset, level)| (now + offset, *level))
            .collect();
        entries.sort_by_key(|(at, _)| *at);
        state.inputs.insert(pin, entries);
    }

    /// Make every subsequent operation on `pin` fail.
    pub fn fail_pin(&self, pin: Pin) {
        self.lock().faults.insert(pin);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    pub fn output(&self, pin: Pin) -> Option<Level> {
        self.lock().outputs.get(&pin).copied()
    }

    pub fn mode(&self, pin: Pin) -> Option<PinMode> {
        self.lock().modes.get(&pin).copied()
    }

    pub fn pull(&self, pin: Pin) -> Option<Pull> {
        self.lock().pulls.get(&pin).copied()
    }

    /// The last [`WRITE_LOG_CAP`] output writes, oldest first.
    pub fn writes(&self) -> Vec<PinEvent> {
        self.lock().log.iter().copied().collect()
    }

    /// Closed high intervals `(rise_ms, fall_ms)` on `pin`. Each interval is
    /// one motor drive when `pin` is the motor pin.
    pub fn pulses(&self, pin: Pin) -> Vec<(u64, u64)> {
        let state = self.lock();
        let mut out = Vec::new();
        let mut rise = None;
        for ev in state.log.iter().filter(|e| e.pin == pin) {
            match (ev.level, rise) {
                (Level::High, None) => rise = Some(ev.at_ms),
                (Level::Low, Some(start)) => {
                    out.push((start, ev.at_ms));
                    rise = None;
                }
                _ => {}
            }
        }
        out
    }

    fn check(&self, state: &SimState, pin: Pin) -> Result<(), DriverError> {
        if state.faults.contains(&pin) {
            return Err(DriverError::new(pin, "simulated fault"));
        }
        Ok(())
    }
}

impl ActuatorDriver for SimulatedDriver {
    fn set_mode(&self, pin: Pin, mode: PinMode) -> Result<(), DriverError> {
        let mut state = self.lock();
        self.check(&state, pin)?;
        state.modes.insert(pin, mode);
        Ok(())
    }

    fn set_pull(&self, pin: Pin, pull: Pull) -> Result<(), DriverError> {
        let mut state = self.lock();
        self.check(&state, pin)?;
        state.pulls.insert(pin, pull);
        Ok(())
    }

    fn write(&self, pin: Pin, level: Level) -> Result<(), DriverError> {
        let mut state = self.lock();
        self.check(&state, pin)?;
        let at_ms = self.now_locked(&state);
        state.outputs.insert(pin, level);
        if state.log.len() == WRITE_LOG_CAP {
            state.log.pop_front();
        }
        state.log.push_back(PinEvent { at_ms, pin, level });
        Ok(())
    }

    fn read(&self, pin: Pin) -> Result<Level, DriverError> {
        let state = self.lock();
        self.check(&state, pin)?;
        let now = self.now_locked(&state);
        let scripted = state.inputs.get(&pin).and_then(|timeline| {
            timeline
                .iter()
                .take_while(|(at, _)| *at <= now)
                .last()
                .map(|(_, level)| *level)
        });
        if let Some(level) = scripted {
            return Ok(level);
        }
        Ok(match state.pulls.get(&pin) {
            Some(Pull::Up) => Level::High,
            _ => Level::Low,
        })
    }

    fn sleep_ms(&self, ms: u64) {
        match &self.timing {
            Timing::Virtual => {
                let mut state = self.lock();
                state.virtual_ms += ms + state.sleep_jitter_ms;
            }
            Timing::Realtime(_) => std::thread::sleep(Duration::from_millis(ms)),
        }
    }

    fn now_ms(&self) -> u64 {
        let state = self.lock();
        self.now_locked(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_log_is_bounded() {
        let drv = SimulatedDriver::new();
        for i in 0..(WRITE_LOG_CAP + 10) {
            let level = if i % 2 == 0 { Level::High } else { Level::Low };
            drv.write(3, level).unwrap();
            drv.sleep_ms(1);
        }
        let writes = drv.writes();
        assert_eq!(writes.len(), WRITE_LOG_CAP);
        assert_eq!(writes[0].at_ms, 10);
        assert_eq!(writes.last().unwrap().at_ms, (WRITE_LOG_CAP + 9) as u64);
        assert_eq!(drv.pulses(3).len(), WRITE_LOG_CAP / 2);
    }

    #[test]
    fn virtual_clock_advances_only_on_sleep() {
        let drv = SimulatedDriver::new();
        assert_eq!(drv.now_ms(), 0);
        drv.sleep_ms(250);
        assert_eq!(drv.now_ms(), 250);
    }

    #[test]
    fn sleep_jitter_is_added_to_every_sleep() {
        let drv = SimulatedDriver::new().with_sleep_jitter(3);
        drv.sleep_ms(10);
        drv.sleep_ms(10);
        assert_eq!(drv.now_ms(), 26);
    }

    #[test]
    fn unscripted_input_follows_pull() {
        let drv = SimulatedDriver::new();
        assert_eq!(drv.read(4).unwrap(), Level::Low);
        drv.set_pull(4, Pull::Up).unwrap();
        assert_eq!(drv.read(4).unwrap(), Level::High);
    }

    #[test]
    fn scripted_input_changes_over_time() {
        let drv = SimulatedDriver::new();
        drv.script_input(7, &[(0, Level::Low), (100, Level::High)]);
        assert_eq!(drv.read(7).unwrap(), Level::Low);
        drv.sleep_ms(99);
        assert_eq!(drv.read(7).unwrap(), Level::Low);
        drv.sleep_ms(1);
        assert_eq!(drv.read(7).unwrap(), Level::High);
    }

    #[test]
    fn pulses_pairs_rising_and_falling_edges() {
        let drv = SimulatedDriver::new();
        drv.write(0, Level::High).unwrap();
        drv.sleep_ms(40);
        drv.write(0, Level::Low).unwrap();
        drv.write(2, Level::High).unwrap();
        drv.sleep_ms(5);
        drv.write(0, Level::High).unwrap();
        drv.sleep_ms(10);
        drv.write(0, Level::Low).unwrap();
        assert_eq!(drv.pulses(0), vec![(0, 40), (45, 55)]);
        assert_eq!(drv.output(2), Some(Level::High));
    }

    #[test]
    fn failed_pin_rejects_operations() {
        let drv = SimulatedDriver::new();
        drv.fail_pin(3);
        let err = drv.write(3, Level::High).unwrap_err();
        assert_eq!(err.pin, 3);
        assert!(drv.write(4, Level::High).is_ok());
        drv.clear_faults();
        assert!(drv.write(3, Level::High).is_ok());
    }
}
