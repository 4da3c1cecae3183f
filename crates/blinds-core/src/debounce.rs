//! Button gesture classifier.
//!
//! `classify_press` blocks the calling thread for as long as the button is
//! held. It must only run on a dedicated polling thread (see
//! [`crate::button`]) or a blocking worker, never inside a scheduled job.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::driver::{ActuatorDriver, DriverError};

/// Poll cadence while sampling the button.
pub const POLL_MS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Press {
    NoPress,
    ShortPress,
    LongPress,
}

/// Classify the gesture currently on the button pin.
///
/// 1. Button idle on the first read: `NoPress`, without waiting.
/// 2. Released within `short_debounce_ms`: noise, `NoPress`.
/// 3. Released within `short_debounce_ms + long_debounce_extra_ms`: `ShortPress`.
/// 4. Otherwise wait for release and report `LongPress`.
pub fn classify_press<D>(driver: &D, config: &Config) -> Result<Press, DriverError>
where
    D: ActuatorDriver + ?Sized,
{
    let pin = config.button_pin;
    let released = config.button_idle_level;
    if driver.read(pin)? == released {
        return Ok(Press::NoPress);
    }

    let short_end = config.short_debounce_ms;
    let long_end = short_end.saturating_add(config.long_debounce_extra_ms);
    let start = driver.now_ms();
    loop {
        driver.sleep_ms(POLL_MS);
        let elapsed = driver.now_ms().saturating_sub(start);
        if driver.read(pin)? == released {
            return Ok(if elapsed <= short_end {
                Press::NoPress
            } else {
                Press::ShortPress
            });
        }
        if elapsed > long_end {
            break;
        }
    }

    while driver.read(pin)? != released {
        driver.sleep_ms(POLL_MS);
    }
    Ok(Press::LongPress)
}
