//! Reminder delivery and system email.
//!
//! A [`Notifier`] turns a due [`Reminder`] into something the user sees or
//! hears. The desktop side is left to whatever command the user configures
//! (`notify-send`, `osascript`, a sound player...); without one the reminder
//! is only logged.

pub mod email;

pub use email::{ResetMailer, SmtpMailer};

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::config::ReminderConfig;
use crate::engine::reminder::Reminder;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, reminder: &Reminder) -> Result<()>;
}

/// Writes reminders to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, reminder: &Reminder) -> Result<()> {
        tracing::info!(
            kind = %reminder.kind,
            title = reminder.title(),
            "{}",
            reminder.message()
        );
        Ok(())
    }
}

/// Runs an external program with the reminder title and message appended
/// as the last two arguments. The child is not waited on.
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    /// Build from `[program, args...]`, `None` if the list is empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn command(&self, reminder: &Reminder) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(reminder.title())
            .arg(reminder.message())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn notify(&self, reminder: &Reminder) -> Result<()> {
        let child = self
            .command(reminder)
            .spawn()
            .with_context(|| format!("Failed to run {}", self.program))?;

        tracing::debug!(
            program = %self.program,
            pid = child.id(),
            kind = %reminder.kind,
            "Reminder command started"
        );
        Ok(())
    }
}

fn notifier_for(argv: Option<&Vec<String>>) -> Arc<dyn Notifier> {
    match argv.and_then(|argv| CommandNotifier::from_argv(argv)) {
        Some(cmd) => Arc::new(cmd),
        None => Arc::new(LogNotifier),
    }
}

/// The `(toast, alarm)` notifiers described by the reminder config
pub fn build_notifiers(config: &ReminderConfig) -> (Arc<dyn Notifier>, Arc<dyn Notifier>) {
    (
        notifier_for(config.toast_command.as_ref()),
        notifier_for(config.alarm_command.as_ref()),
    )
}
