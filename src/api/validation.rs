//! Input validation for API requests.
//!
//! Each function returns `Err(message)` describing the first problem found.
//! Combine them with `ValidationErrorBuilder` from the `error` module.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// Characters accepted as "special" by the reset password policy
const SPECIAL_CHARS: &str = r#"!@#$%^&*(),.?":{}|<>"#;

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MIN_RESET_PASSWORD_LENGTH: usize = 8;

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("Username is required".to_string());
    }
    if username.chars().count() < MIN_USERNAME_LENGTH {
        return Err(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Password rule applied at registration
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

/// Stricter rule applied when resetting a password
pub fn validate_reset_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_RESET_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_RESET_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain a lowercase letter".to_string());
    }
    if password.chars().filter(|c| c.is_ascii_digit()).count() < 3 {
        return Err("Password must contain at least 3 digits".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        return Err(format!(
            "Password must contain a special character ({})",
            SPECIAL_CHARS
        ));
    }
    Ok(())
}

pub fn validate_passwords_match(password: &str, confirm: &str) -> Result<(), String> {
    if password != confirm {
        return Err("Passwords do not match".to_string());
    }
    Ok(())
}

pub fn validate_hours(hours: f64) -> Result<(), String> {
    if !hours.is_finite() || hours < 0.0 {
        return Err("Hours must be a non-negative number".to_string());
    }
    Ok(())
}

pub fn validate_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, String> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("{:04}-{:02}-{:02} is not a valid date", year, month, day))
}
