//! Per-user bedtime and alarm settings.
//!
//! Times are kept the way the user entered them: hour, minute and AM/PM as
//! separate strings. Use [`ReminderSettings::bedtime`] / [`ReminderSettings::alarm`]
//! to get a parsed [`ClockTime`].

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::engine::reminder::{ClockTime, ClockTimeError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ReminderSettings {
    pub bedtime_enabled: bool,
    pub bedtime_hour: String,
    pub bedtime_minute: String,
    pub bedtime_ampm: String,
    pub alarm_enabled: bool,
    pub alarm_hour: String,
    pub alarm_minute: String,
    pub alarm_ampm: String,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            bedtime_enabled: false,
            bedtime_hour: "10".to_string(),
            bedtime_minute: "00".to_string(),
            bedtime_ampm: "PM".to_string(),
            alarm_enabled: false,
            alarm_hour: "06".to_string(),
            alarm_minute: "30".to_string(),
            alarm_ampm: "AM".to_string(),
        }
    }
}

impl ReminderSettings {
    /// Configured bedtime, `Ok(None)` when the reminder is switched off
    pub fn bedtime(&self) -> Result<Option<ClockTime>, ClockTimeError> {
        if !self.bedtime_enabled {
            return Ok(None);
        }
        ClockTime::parse_parts(&self.bedtime_hour, &self.bedtime_minute, &self.bedtime_ampm)
            .map(Some)
    }

    /// Configured alarm, `Ok(None)` when the alarm is switched off
    pub fn alarm(&self) -> Result<Option<ClockTime>, ClockTimeError> {
        if !self.alarm_enabled {
            return Ok(None);
        }
        ClockTime::parse_parts(&self.alarm_hour, &self.alarm_minute, &self.alarm_ampm).map(Some)
    }

    /// Validate both times (enabled or not) and rewrite them as `HH`, `MM`, `AM|PM`
    pub fn normalized(&self) -> Result<Self, (&'static str, ClockTimeError)> {
        let bedtime =
            ClockTime::parse_parts(&self.bedtime_hour, &self.bedtime_minute, &self.bedtime_ampm)
                .map_err(|e| ("bedtime", e))?;
        let alarm = ClockTime::parse_parts(&self.alarm_hour, &self.alarm_minute, &self.alarm_ampm)
            .map_err(|e| ("alarm", e))?;

        Ok(Self {
            bedtime_enabled: self.bedtime_enabled,
            bedtime_hour: format!("{:02}", bedtime.hour()),
            bedtime_minute: format!("{:02}", bedtime.minute()),
            bedtime_ampm: bedtime.meridiem().to_string(),
            alarm_enabled: self.alarm_enabled,
            alarm_hour: format!("{:02}", alarm.hour()),
            alarm_minute: format!("{:02}", alarm.minute()),
            alarm_ampm: alarm.meridiem().to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSettings {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub reminders: ReminderSettings,
    pub created_at: String,
    pub updated_at: String,
}

impl UserSettings {
    pub async fn get(db: &SqlitePool, user_id: i64) -> Result<Option<UserSettings>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM user_settings WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    /// Stored reminder settings, or the defaults when the user never saved any
    pub async fn get_or_default(
        db: &SqlitePool,
        user_id: i64,
    ) -> Result<ReminderSettings, sqlx::Error> {
        Ok(Self::get(db, user_id)
            .await?
            .map(|s| s.reminders)
            .unwrap_or_default())
    }

    /// Insert or replace the single settings row for a user
    pub async fn upsert(
        db: &SqlitePool,
        user_id: i64,
        settings: &ReminderSettings,
    ) -> Result<UserSettings, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (
                user_id,
                bedtime_enabled, bedtime_hour, bedtime_minute, bedtime_ampm,
                alarm_enabled, alarm_hour, alarm_minute, alarm_ampm
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                bedtime_enabled = excluded.bedtime_enabled,
                bedtime_hour = excluded.bedtime_hour,
                bedtime_minute = excluded.bedtime_minute,
                bedtime_ampm = excluded.bedtime_ampm,
                alarm_enabled = excluded.alarm_enabled,
                alarm_hour = excluded.alarm_hour,
                alarm_minute = excluded.alarm_minute,
                alarm_ampm = excluded.alarm_ampm,
                updated_at = datetime('now')
            "#,
        )
        .bind(user_id)
        .bind(settings.bedtime_enabled)
        .bind(&settings.bedtime_hour)
        .bind(&settings.bedtime_minute)
        .bind(&settings.bedtime_ampm)
        .bind(settings.alarm_enabled)
        .bind(&settings.alarm_hour)
        .bind(&settings.alarm_minute)
        .bind(&settings.alarm_ampm)
        .execute(db)
        .await?;

        sqlx::query_as("SELECT * FROM user_settings WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(db)
            .await
    }
}
