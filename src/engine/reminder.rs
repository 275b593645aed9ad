//! Bedtime and alarm reminder module
//!
//! A background task polls the wall clock on a fixed interval (30 seconds by
//! default) and compares the current hour and minute against the user's
//! enabled bedtime and alarm times. When they match it:
//! - sends a toast for bedtime (fire-and-forget)
//! - runs the alarm notifier for the alarm
//!
//! Each reminder fires at most once per calendar minute. A minute that is
//! never observed (process suspended, laptop asleep) is simply missed; there
//! is no catch-up.

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::config::ReminderConfig;
use crate::db::{DbPool, ReminderSettings, UserSettings};
use crate::notifications::Notifier;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockTimeError {
    #[error("hour must be between 1 and 12, got {0:?}")]
    Hour(String),
    #[error("minute must be between 0 and 59, got {0:?}")]
    Minute(String),
    #[error("expected AM or PM, got {0:?}")]
    Meridiem(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Meridiem {
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
}

impl fmt::Display for Meridiem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Am => write!(f, "AM"),
            Self::Pm => write!(f, "PM"),
        }
    }
}

impl FromStr for Meridiem {
    type Err = ClockTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AM" => Ok(Self::Am),
            "PM" => Ok(Self::Pm),
            _ => Err(ClockTimeError::Meridiem(s.to_string())),
        }
    }
}

/// A time of day on a 12-hour clock, as the user sets it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockTime {
    hour: u32,
    minute: u32,
    meridiem: Meridiem,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32, meridiem: Meridiem) -> Result<Self, ClockTimeError> {
        if !(1..=12).contains(&hour) {
            return Err(ClockTimeError::Hour(hour.to_string()));
        }
        if minute > 59 {
            return Err(ClockTimeError::Minute(minute.to_string()));
        }
        Ok(Self {
            hour,
            minute,
            meridiem,
        })
    }

    /// Parse the three string fields stored in the settings table
    pub fn parse_parts(hour: &str, minute: &str, meridiem: &str) -> Result<Self, ClockTimeError> {
        let h: u32 = hour
            .trim()
            .parse()
            .map_err(|_| ClockTimeError::Hour(hour.to_string()))?;
        let m: u32 = minute
            .trim()
            .parse()
            .map_err(|_| ClockTimeError::Minute(minute.to_string()))?;
        let meridiem = meridiem.parse()?;

        Self::new(h, m, meridiem).map_err(|e| match e {
            ClockTimeError::Hour(_) => ClockTimeError::Hour(hour.to_string()),
            ClockTimeError::Minute(_) => ClockTimeError::Minute(minute.to_string()),
            other => other,
        })
    }

    /// Build from a 24-hour `(hour, minute)`
    pub fn from_24h(hour: u32, minute: u32) -> Result<Self, ClockTimeError> {
        if hour > 23 {
            return Err(ClockTimeError::Hour(hour.to_string()));
        }
        let meridiem = if hour < 12 { Meridiem::Am } else { Meridiem::Pm };
        let h12 = match hour % 12 {
            0 => 12,
            h => h,
        };
        Self::new(h12, minute, meridiem)
    }

    /// `(hour, minute)` on a 24-hour clock: 12 AM is 0, 12 PM is 12
    pub fn to_24h(&self) -> (u32, u32) {
        let hour = match (self.meridiem, self.hour) {
            (Meridiem::Am, 12) => 0,
            (Meridiem::Am, h) => h,
            (Meridiem::Pm, 12) => 12,
            (Meridiem::Pm, h) => h + 12,
        };
        (hour, self.minute)
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn meridiem(&self) -> Meridiem {
        self.meridiem
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02} {}", self.hour, self.minute, self.meridiem)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Bedtime,
    Alarm,
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bedtime => write!(f, "bedtime"),
            Self::Alarm => write!(f, "alarm"),
        }
    }
}

/// A reminder that is due now
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub kind: ReminderKind,
    pub time: ClockTime,
}

impl Reminder {
    pub fn title(&self) -> &'static str {
        match self.kind {
            ReminderKind::Bedtime => "Bedtime",
            ReminderKind::Alarm => "Wake up!",
        }
    }

    pub fn message(&self) -> String {
        match self.kind {
            ReminderKind::Bedtime => format!("It's {}. Time to wind down and get some sleep.", self.time),
            ReminderKind::Alarm => format!("It's {}. Good morning!", self.time),
        }
    }
}

/// The enabled reminder times for one user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderSchedule {
    pub bedtime: Option<ClockTime>,
    pub alarm: Option<ClockTime>,
}

impl ReminderSchedule {
    /// Build from stored settings. A time that doesn't parse disables that reminder.
    pub fn from_settings(settings: &ReminderSettings) -> Self {
        let bedtime = settings.bedtime().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring invalid bedtime setting");
            None
        });
        let alarm = settings.alarm().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring invalid alarm setting");
            None
        });
        Self { bedtime, alarm }
    }

    fn targets(&self) -> impl Iterator<Item = (ReminderKind, ClockTime)> {
        [
            self.bedtime.map(|t| (ReminderKind::Bedtime, t)),
            self.alarm.map(|t| (ReminderKind::Alarm, t)),
        ]
        .into_iter()
        .flatten()
    }
}

/// Calendar minute used to suppress repeat firings
type MinuteKey = (NaiveDate, u32, u32);

fn minute_key(now: NaiveDateTime) -> MinuteKey {
    (now.date(), now.hour(), now.minute())
}

/// Pure clock comparison with per-minute dedup
#[derive(Debug, Default)]
pub struct ReminderChecker {
    last_fired: HashMap<ReminderKind, MinuteKey>,
}

impl ReminderChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reminders due at `now` that haven't already fired in this calendar minute
    pub fn check(&mut self, schedule: &ReminderSchedule, now: NaiveDateTime) -> Vec<Reminder> {
        let key = minute_key(now);
        let current = (now.hour(), now.minute());

        let mut due = Vec::new();
        for (kind, time) in schedule.targets() {
            if time.to_24h() != current {
                continue;
            }
            if self.last_fired.get(&kind) == Some(&key) {
                continue;
            }
            self.last_fired.insert(kind, key);
            due.push(Reminder { kind, time });
        }
        due
    }
}

/// Watches one user's settings and delivers their reminders
pub struct ReminderMonitor {
    db: DbPool,
    user_id: i64,
    checker: ReminderChecker,
    schedule: ReminderSchedule,
    toast: Arc<dyn Notifier>,
    alarm: Arc<dyn Notifier>,
}

impl ReminderMonitor {
    pub fn new(
        db: DbPool,
        user_id: i64,
        toast: Arc<dyn Notifier>,
        alarm: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            user_id,
            checker: ReminderChecker::new(),
            schedule: ReminderSchedule::default(),
            toast,
            alarm,
        }
    }

    /// Reload settings, compare against `now` and deliver anything due
    pub async fn tick(&mut self, now: NaiveDateTime) -> Vec<Reminder> {
        match UserSettings::get_or_default(&self.db, self.user_id).await {
            Ok(settings) => self.schedule = ReminderSchedule::from_settings(&settings),
            Err(e) => {
                tracing::warn!(user_id = self.user_id, error = %e, "Failed to reload reminder settings, keeping previous schedule");
            }
        }

        let due = self.checker.check(&self.schedule, now);
        for reminder in &due {
            self.deliver(reminder.clone()).await;
        }
        due
    }

    async fn deliver(&self, reminder: Reminder) {
        tracing::info!(
            user_id = self.user_id,
            kind = %reminder.kind,
            time = %reminder.time,
            "Reminder due"
        );

        match reminder.kind {
            ReminderKind::Bedtime => {
                let toast = Arc::clone(&self.toast);
                tokio::spawn(async move {
                    if let Err(e) = toast.notify(&reminder).await {
                        tracing::warn!(error = %e, "Failed to deliver bedtime toast");
                    }
                });
            }
            ReminderKind::Alarm => {
                if let Err(e) = self.alarm.notify(&reminder).await {
                    tracing::warn!(error = %e, "Failed to deliver alarm");
                }
            }
        }
    }
}

/// Spawn the background reminder task for a user
pub fn spawn_reminder_task(mut monitor: ReminderMonitor, config: &ReminderConfig) -> JoinHandle<()> {
    let interval_secs = config.check_interval_seconds.max(1);
    tracing::info!(
        user_id = monitor.user_id,
        interval_secs = interval_secs,
        "Starting reminder task"
    );

    tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(interval_secs));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick.tick().await;
            monitor.tick(Local::now().naive_local()).await;
        }
    })
}
