pub mod button;
pub mod clock;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod driver;
pub mod error;
pub mod handle;
pub mod io;
pub mod position;
pub mod scheduler;
pub mod snapshot;
pub mod status;

pub use error::{BlindsError, Result};
