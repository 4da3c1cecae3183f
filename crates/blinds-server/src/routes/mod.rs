pub mod blinds;
pub mod button;
pub mod config;
pub mod schedule;
