//! Live sleep tracking: start a sleep now, end it later and record the session.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;

use crate::db::{SleepSession, TIMESTAMP_FORMAT};

#[derive(Debug, Error)]
pub enum SleepTrackingError {
    #[error("a sleep is already being tracked since {0}")]
    AlreadySleeping(String),
    #[error("no sleep is being tracked")]
    NotSleeping,
    #[error("stored start time is invalid: {0}")]
    InvalidStart(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SleepInProgress {
    pub user_id: i64,
    /// Local wall-clock time the sleep started
    pub started_at: String,
}

/// Hours between two instants, rounded to two decimals, never negative
pub fn hours_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let seconds = (end - start).num_seconds().max(0) as f64;
    (seconds / 3600.0 * 100.0).round() / 100.0
}

impl SleepInProgress {
    pub async fn get(
        db: &SqlitePool,
        user_id: i64,
    ) -> Result<Option<SleepInProgress>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM sleep_in_progress WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    pub async fn start(
        db: &SqlitePool,
        user_id: i64,
        started_at: NaiveDateTime,
    ) -> Result<SleepInProgress, SleepTrackingError> {
        if let Some(current) = Self::get(db, user_id).await? {
            return Err(SleepTrackingError::AlreadySleeping(current.started_at));
        }

        let started_at = started_at.format(TIMESTAMP_FORMAT).to_string();
        sqlx::query("INSERT INTO sleep_in_progress (user_id, started_at) VALUES (?, ?)")
            .bind(user_id)
            .bind(&started_at)
            .execute(db)
            .await?;

        tracing::info!(user_id, started_at = %started_at, "Sleep tracking started");
        Ok(SleepInProgress {
            user_id,
            started_at,
        })
    }

    /// Stop tracking and store the session on the date the sleep started
    pub async fn finish(
        db: &SqlitePool,
        user_id: i64,
        ended_at: NaiveDateTime,
    ) -> Result<SleepSession, SleepTrackingError> {
        let current = Self::get(db, user_id)
            .await?
            .ok_or(SleepTrackingError::NotSleeping)?;

        let started_at = NaiveDateTime::parse_from_str(&current.started_at, TIMESTAMP_FORMAT)
            .map_err(|_| SleepTrackingError::InvalidStart(current.started_at.clone()))?;
        let hours = hours_between(started_at, ended_at);

        let session = SleepSession::create(db, user_id, started_at.date(), hours).await?;

        sqlx::query("DELETE FROM sleep_in_progress WHERE user_id = ?")
            .bind(user_id)
            .execute(db)
            .await?;

        tracing::info!(user_id, hours, "Sleep tracking finished");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_in_memory, User};
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_hours_between_rounds_to_two_decimals() {
        assert_eq!(hours_between(at(1, 22, 0), at(2, 6, 0)), 8.0);
        assert_eq!(hours_between(at(1, 22, 0), at(1, 22, 20)), 0.33);
        assert_eq!(hours_between(at(1, 22, 0), at(1, 21, 0)), 0.0);
    }

    #[tokio::test]
    async fn test_start_then_finish_records_session_on_start_date() {
        let db = init_in_memory().await.unwrap();
        let user = User::create(&db, "luna", "hash", "luna@example.com")
            .await
            .unwrap();

        SleepInProgress::start(&db, user.id, at(1, 23, 30))
            .await
            .unwrap();
        assert!(SleepInProgress::get(&db, user.id).await.unwrap().is_some());

        let session = SleepInProgress::finish(&db, user.id, at(2, 7, 0))
            .await
            .unwrap();
        assert_eq!(session.hours, 7.5);
        assert_eq!(session.date(), NaiveDate::from_ymd_opt(2024, 6, 1));

        assert!(SleepInProgress::get(&db, user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_double_start_and_finish_without_start() {
        let db = init_in_memory().await.unwrap();
        let user = User::create(&db, "luna", "hash", "luna@example.com")
            .await
            .unwrap();

        assert!(matches!(
            SleepInProgress::finish(&db, user.id, at(2, 7, 0)).await,
            Err(SleepTrackingError::NotSleeping)
        ));

        SleepInProgress::start(&db, user.id, at(1, 23, 0))
            .await
            .unwrap();
        assert!(matches!(
            SleepInProgress::start(&db, user.id, at(1, 23, 5)).await,
            Err(SleepTrackingError::AlreadySleeping(_))
        ));
    }
}
