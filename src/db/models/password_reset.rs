//! One-time password reset codes.

use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use subtle::ConstantTimeEq;

use crate::db::TIMESTAMP_FORMAT;

/// How long a reset code stays valid
pub const RESET_CODE_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PasswordReset {
    pub id: i64,
    pub email: String,
    pub code: String,
    pub expires_at: String,
    pub used: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
    pub confirm_password: String,
}

impl PasswordReset {
    /// Generate a random 6-digit numeric code
    pub fn generate_code() -> String {
        let n: u32 = rand::rng().random_range(0..1_000_000);
        format!("{:06}", n)
    }

    /// Store a fresh code for `email`, superseding any earlier ones
    pub async fn issue(
        db: &SqlitePool,
        email: &str,
        code: &str,
        now: NaiveDateTime,
    ) -> Result<(), sqlx::Error> {
        Self::delete_for_email(db, email).await?;

        let expires_at = (now + chrono::Duration::minutes(RESET_CODE_TTL_MINUTES))
            .format(TIMESTAMP_FORMAT)
            .to_string();

        sqlx::query("INSERT INTO password_resets (email, code, expires_at) VALUES (?, ?, ?)")
            .bind(email)
            .bind(code)
            .bind(&expires_at)
            .execute(db)
            .await?;

        tracing::info!(email = %email, expires_at = %expires_at, "Password reset code issued");
        Ok(())
    }

    /// True if `code` is an unused, unexpired code for `email`
    pub async fn verify(
        db: &SqlitePool,
        email: &str,
        code: &str,
        now: NaiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        let now = now.format(TIMESTAMP_FORMAT).to_string();
        let candidates: Vec<PasswordReset> = sqlx::query_as(
            "SELECT * FROM password_resets WHERE email = ? AND used = 0 AND expires_at > ?",
        )
        .bind(email)
        .bind(&now)
        .fetch_all(db)
        .await?;

        Ok(candidates
            .iter()
            .any(|reset| bool::from(reset.code.as_bytes().ct_eq(code.as_bytes()))))
    }

    /// Flag a code as spent. Returns false if it was already used or never existed.
    pub async fn mark_used(db: &SqlitePool, email: &str, code: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE password_resets SET used = 1 WHERE email = ? AND code = ? AND used = 0",
        )
        .bind(email)
        .bind(code)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_for_email(db: &SqlitePool, email: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM password_resets WHERE email = ?")
            .bind(email)
            .execute(db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..50 {
            let code = PasswordReset::generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_code_expires_after_fifteen_minutes() {
        let db = init_in_memory().await.unwrap();
        PasswordReset::issue(&db, "luna@example.com", "123456", at(10, 0))
            .await
            .unwrap();

        assert!(PasswordReset::verify(&db, "luna@example.com", "123456", at(10, 14))
            .await
            .unwrap());
        assert!(!PasswordReset::verify(&db, "luna@example.com", "123456", at(10, 15))
            .await
            .unwrap());
        assert!(!PasswordReset::verify(
            &db,
            "luna@example.com",
            "123456",
            at(10, 0) + Duration::hours(1)
        )
        .await
        .unwrap());
    }

    #[tokio::test]
    async fn test_wrong_code_or_email_rejected() {
        let db = init_in_memory().await.unwrap();
        PasswordReset::issue(&db, "luna@example.com", "123456", at(10, 0))
            .await
            .unwrap();

        assert!(!PasswordReset::verify(&db, "luna@example.com", "654321", at(10, 1))
            .await
            .unwrap());
        assert!(!PasswordReset::verify(&db, "sol@example.com", "123456", at(10, 1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_new_code_supersedes_old() {
        let db = init_in_memory().await.unwrap();
        PasswordReset::issue(&db, "luna@example.com", "111111", at(10, 0))
            .await
            .unwrap();
        PasswordReset::issue(&db, "luna@example.com", "222222", at(10, 1))
            .await
            .unwrap();

        assert!(!PasswordReset::verify(&db, "luna@example.com", "111111", at(10, 2))
            .await
            .unwrap());
        assert!(PasswordReset::verify(&db, "luna@example.com", "222222", at(10, 2))
            .await
            .unwrap());

        PasswordReset::delete_for_email(&db, "luna@example.com")
            .await
            .unwrap();
        assert!(!PasswordReset::verify(&db, "luna@example.com", "222222", at(10, 2))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_used_code_no_longer_verifies() {
        let db = init_in_memory().await.unwrap();
        PasswordReset::issue(&db, "luna@example.com", "123456", at(10, 0))
            .await
            .unwrap();

        assert!(!PasswordReset::mark_used(&db, "luna@example.com", "654321")
            .await
            .unwrap());
        assert!(PasswordReset::mark_used(&db, "luna@example.com", "123456")
            .await
            .unwrap());
        assert!(!PasswordReset::verify(&db, "luna@example.com", "123456", at(10, 1))
            .await
            .unwrap());
        assert!(!PasswordReset::mark_used(&db, "luna@example.com", "123456")
            .await
            .unwrap());
    }
}
