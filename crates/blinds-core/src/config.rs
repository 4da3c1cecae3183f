use crate::driver::{Level, Pin};
use crate::error::{BlindsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest duration or position a drive can be asked for. Positions are
/// signed internally so the close overdrive can go below zero.
pub const MAX_DURATION_MS: u64 = i64::MAX as u64;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Hardware and timing parameters of one blinds installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_motor_pin")]
    pub motor_pin: Pin,
    #[serde(default = "default_direction_pin")]
    pub direction_pin: Pin,
    #[serde(default = "default_button_pin")]
    pub button_pin: Pin,
    /// Drive time from fully closed to fully open.
    #[serde(default = "default_open_duration_ms")]
    pub open_duration_ms: u64,
    /// Extra drive time when closing so the covering always reaches the stop.
    #[serde(default)]
    pub close_offset_ms: u64,
    #[serde(default = "default_short_debounce_ms")]
    pub short_debounce_ms: u64,
    #[serde(default = "default_long_debounce_extra_ms")]
    pub long_debounce_extra_ms: u64,
    /// Input level of the button while it is not pressed.
    #[serde(default = "default_button_idle_level")]
    pub button_idle_level: Level,
    #[serde(default = "default_save_path")]
    pub save_path: PathBuf,
}

fn default_motor_pin() -> Pin {
    0
}

fn default_direction_pin() -> Pin {
    2
}

fn default_button_pin() -> Pin {
    28
}

fn default_open_duration_ms() -> u64 {
    6000
}

fn default_short_debounce_ms() -> u64 {
    50
}

fn default_long_debounce_extra_ms() -> u64 {
    700
}

fn default_button_idle_level() -> Level {
    Level::High
}

fn default_save_path() -> PathBuf {
    PathBuf::from("/data/blinds.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            motor_pin: default_motor_pin(),
            direction_pin: default_direction_pin(),
            button_pin: default_button_pin(),
            open_duration_ms: default_open_duration_ms(),
            close_offset_ms: 0,
            short_debounce_ms: default_short_debounce_ms(),
            long_debounce_extra_ms: default_long_debounce_extra_ms(),
            button_idle_level: default_button_idle_level(),
            save_path: default_save_path(),
        }
    }
}

impl Config {
    /// Read a YAML file of overrides on top of the defaults.
    pub fn load_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let patch: ConfigPatch = serde_yaml::from_str(&data)?;
        let config = Config::default().merged(&patch);
        config.validate()?;
        Ok(config)
    }

    /// Copy of `self` with every key present in `patch` replaced.
    pub fn merged(&self, patch: &ConfigPatch) -> Self {
        let mut next = self.clone();
        next.reconfigure(patch);
        next
    }

    /// Merge `patch` into `self`. Keys absent from the patch keep their value.
    pub fn reconfigure(&mut self, patch: &ConfigPatch) {
        if let Some(v) = patch.motor_pin {
            self.motor_pin = v;
        }
        if let Some(v) = patch.direction_pin {
            self.direction_pin = v;
        }
        if let Some(v) = patch.button_pin {
            self.button_pin = v;
        }
        if let Some(v) = patch.open_duration_ms {
            self.open_duration_ms = v;
        }
        if let Some(v) = patch.close_offset_ms {
            self.close_offset_ms = v;
        }
        if let Some(v) = patch.short_debounce_ms {
            self.short_debounce_ms = v;
        }
        if let Some(v) = patch.long_debounce_extra_ms {
            self.long_debounce_extra_ms = v;
        }
        if let Some(v) = patch.button_idle_level {
            self.button_idle_level = v;
        }
        if let Some(v) = &patch.save_path {
            self.save_path = v.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        let pins = [
            ("motor_pin", self.motor_pin),
            ("direction_pin", self.direction_pin),
            ("button_pin", self.button_pin),
        ];
        for (i, (a_name, a)) in pins.iter().enumerate() {
            for (b_name, b) in &pins[i + 1..] {
                if a == b {
                    return Err(BlindsError::InvalidConfig(format!(
                        "{a_name} and {b_name} are both pin {a}"
                    )));
                }
            }
        }
        if self.open_duration_ms == 0 {
            return Err(BlindsError::InvalidConfig(
                "open_duration_ms must be greater than zero".into(),
            ));
        }
        for (name, ms) in [
            ("open_duration_ms", self.open_duration_ms),
            ("close_offset_ms", self.close_offset_ms),
        ] {
            if ms > MAX_DURATION_MS {
                return Err(BlindsError::InvalidConfig(format!(
                    "{name} of {ms} ms is out of range"
                )));
            }
        }
        if self.save_path.as_os_str().is_empty() {
            return Err(BlindsError::InvalidConfig("save_path is empty".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConfigPatch
// ---------------------------------------------------------------------------

/// Partial config used by `reconfigure`. Unknown keys are rejected so a typo
/// in a remote call is reported instead of silently ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motor_pin: Option<Pin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction_pin: Option<Pin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_pin: Option<Pin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_offset_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_debounce_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_debounce_extra_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_idle_level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_path: Option<PathBuf>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == ConfigPatch::default()
    }

    /// True when applying the patch changes a pin assignment or pull setup,
    /// i.e. the driver bindings must be re-established.
    pub fn touches_pins(&self) -> bool {
        self.motor_pin.is_some()
            || self.direction_pin.is_some()
            || self.button_pin.is_some()
            || self.button_idle_level.is_some()
    }
}
