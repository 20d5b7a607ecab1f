//! # TaskPing Channels
//! Delivery transports for notifications.
//!
//! - `sms`: Twilio-compatible SMS REST API
//! - `log`: dry-run channel that only logs

pub mod log;
pub mod sms;

use std::sync::Arc;

use taskping_core::config::ChannelConfig;
use taskping_core::error::{Result, TaskPingError};
use taskping_core::traits::NotificationChannel;

pub use log::LogChannel;
pub use sms::{SmsChannel, SmsConfig};

/// Build the configured channel.
pub fn from_config(config: &ChannelConfig) -> Result<Arc<dyn NotificationChannel>> {
    match config.provider.as_str() {
        "twilio" => Ok(Arc::new(SmsChannel::new(SmsConfig::from(config))?)),
        "log" => Ok(Arc::new(LogChannel::new())),
        other => Err(TaskPingError::config(format!("unknown channel provider '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_provider() {
        let mut config = ChannelConfig::default();
        config.provider = "log".into();
        assert_eq!(from_config(&config).unwrap().name(), "log");

        config.provider = "twilio".into();
        config.account_sid = "AC1".into();
        config.auth_token = "t".into();
        config.from_number = "+15550000000".into();
        assert_eq!(from_config(&config).unwrap().name(), "sms");

        config.provider = "pager".into();
        assert!(from_config(&config).is_err());
    }
}
