//! # TaskPing Core
//! Data model, error type, configuration, and the traits that connect the
//! notification engine to its channel, data store, and clock.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::TaskPingConfig;
pub use error::{Result, TaskPingError};
pub use traits::{Clock, DataStore, ManualClock, NotificationChannel, SystemClock};
