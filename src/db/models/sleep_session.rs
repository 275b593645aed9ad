//! Recorded sleep sessions.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SleepSession {
    pub id: i64,
    pub user_id: i64,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hours: f64,
    pub created_at: String,
}

impl SleepSession {
    /// Calendar date of the session, `None` if the stored parts don't form a real date
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    pub async fn create(
        db: &SqlitePool,
        user_id: i64,
        date: NaiveDate,
        hours: f64,
    ) -> Result<SleepSession, sqlx::Error> {
        let id = sqlx::query(
            "INSERT INTO sleep_sessions (user_id, year, month, day, hours) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(date.year())
        .bind(date.month())
        .bind(date.day())
        .bind(hours)
        .execute(db)
        .await?
        .last_insert_rowid();

        sqlx::query_as("SELECT * FROM sleep_sessions WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await
    }

    /// All sessions for a user, newest first
    pub async fn list_for_user(
        db: &SqlitePool,
        user_id: i64,
    ) -> Result<Vec<SleepSession>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM sleep_sessions WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    pub async fn delete(db: &SqlitePool, user_id: i64, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sleep_sessions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSleepSessionRequest {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hours: f64,
}
