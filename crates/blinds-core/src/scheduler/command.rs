//! The closed set of operations a job can carry.
//!
//! Remote callers name actions by string; [`Command::parse`] is the only place
//! those strings are resolved, so an unknown name fails when the job is
//! registered rather than when it fires.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ConfigPatch, MAX_DURATION_MS};
use crate::error::{BlindsError, Result};

/// Runs ahead of anything else due at the same instant.
pub const PRIORITY_MOTION: u8 = 0;
/// One-shot and recurring scheduled occurrences.
pub const PRIORITY_SCHEDULED: u8 = 5;
pub const PRIORITY_DEFAULT: u8 = 10;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    Open,
    Close,
    SetPosition {
        position_ms: u64,
    },
    ResetPosition {
        #[serde(default)]
        position_ms: u64,
    },
    Reconfigure {
        patch: ConfigPatch,
    },
    Save,
}

/// Identity used by `dedup_enqueue` to decide which pending jobs a new one
/// supersedes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// Every command that drives the motor to a target position.
    Motion,
    Save,
}

impl Command {
    /// Resolve a remote action name and its JSON arguments.
    ///
    /// Arguments may be positional (`[2000]`), a bare value (`2000`), an
    /// object (`{"position_ms": 2000}`), or `null` when none are needed.
    pub fn parse(name: &str, args: &Value) -> Result<Self> {
        match name {
            "open_blinds" | "open" => Ok(Command::Open),
            "close_blinds" | "close" => Ok(Command::Close),
            "set_blinds" | "set_position" => Ok(Command::SetPosition {
                position_ms: position_arg(name, args)?.ok_or_else(|| {
                    BlindsError::InvalidCommand(format!("{name} requires a position"))
                })?,
            }),
            "reset_position" => Ok(Command::ResetPosition {
                position_ms: position_arg(name, args)?.unwrap_or(0),
            }),
            "reconfigure" => {
                let patch = match first_arg(args) {
                    Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
                        BlindsError::InvalidCommand(format!("reconfigure: {e}"))
                    })?,
                    None => ConfigPatch::default(),
                };
                Ok(Command::Reconfigure { patch })
            }
            "save" => Ok(Command::Save),
            other => Err(BlindsError::InvalidCommand(format!(
                "unknown action '{other}'"
            ))),
        }
    }

    /// Remote name of this command, the inverse of [`Command::parse`].
    pub fn action_name(&self) -> &'static str {
        match self {
            Command::Open => "open_blinds",
            Command::Close => "close_blinds",
            Command::SetPosition { .. } => "set_blinds",
            Command::ResetPosition { .. } => "reset_position",
            Command::Reconfigure { .. } => "reconfigure",
            Command::Save => "save",
        }
    }

    /// Positional arguments in the form `parse` accepts.
    pub fn args(&self) -> Value {
        match self {
            Command::SetPosition { position_ms } | Command::ResetPosition { position_ms } => {
                serde_json::json!([position_ms])
            }
            Command::Reconfigure { patch } => {
                serde_json::json!([serde_json::to_value(patch).unwrap_or(Value::Null)])
            }
            Command::Open | Command::Close | Command::Save => serde_json::json!([]),
        }
    }

    pub fn dedup_key(&self) -> Option<DedupKey> {
        match self {
            Command::Open | Command::Close | Command::SetPosition { .. } => {
                Some(DedupKey::Motion)
            }
            Command::Save => Some(DedupKey::Save),
            Command::ResetPosition { .. } | Command::Reconfigure { .. } => None,
        }
    }

    /// Priority used when the command enters the queue through `submit`.
    pub fn priority(&self) -> u8 {
        match self.dedup_key() {
            Some(DedupKey::Motion) => PRIORITY_MOTION,
            _ => PRIORITY_DEFAULT,
        }
    }

    /// Whether running the command changes persisted state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Command::Save)
    }
}

fn first_arg(args: &Value) -> Option<&Value> {
    match args {
        Value::Null => None,
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

fn position_arg(name: &str, args: &Value) -> Result<Option<u64>> {
    let value = match first_arg(args) {
        None => return Ok(None),
        Some(Value::Object(map)) => match map.get("position_ms").or_else(|| map.get("pos")) {
            Some(v) => v,
            None => return Ok(None),
        },
        Some(v) => v,
    };
    let position = value.as_u64().ok_or_else(|| {
        BlindsError::InvalidCommand(format!(
            "{name}: position must be a non-negative integer, got {value}"
        ))
    })?;
    if position > MAX_DURATION_MS {
        return Err(BlindsError::InvalidCommand(format!(
            "{name}: position {position} ms is out of range"
        )));
    }
    Ok(Some(position))
}
