//! Background work that runs alongside the API.

pub mod reminder;

pub use reminder::{spawn_reminder_task, ReminderMonitor};
