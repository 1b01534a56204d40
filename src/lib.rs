// Core modules
pub mod api;
pub mod backtest;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod live;
pub mod models;
pub mod secrets;
pub mod settings;
pub mod startup;
pub mod strategy;

// Re-export commonly used types
pub use error::{BotError, ProvisionError, Result};
pub use models::*;
pub use strategy::Strategy;
