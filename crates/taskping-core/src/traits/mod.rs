//! Seams between the notification core and its collaborators.

pub mod channel;
pub mod clock;
pub mod store;

pub use channel::NotificationChannel;
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::DataStore;
