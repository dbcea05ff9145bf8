//! Output nodes
//!
//! Executors that deliver results to people.

mod notification;

pub use notification::{DeliveredNotification, NotificationExecutor};
