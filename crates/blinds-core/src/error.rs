use thiserror::Error;

use crate::driver::Pin;

#[derive(Debug, Error)]
pub enum BlindsError {
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("actuator fault on pin {pin}: {reason}")]
    ActuatorFault { pin: Pin, reason: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BlindsError>;
