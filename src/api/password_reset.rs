//! Forgot-password flow: mail a 6-digit code, verify it, then set a new password.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use super::auth::hash_new_password;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_passwords_match, validate_reset_password};
use crate::db::{
    ForgotPasswordRequest, PasswordReset, ResetPasswordRequest, User, VerifyCodeRequest,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub valid: bool,
}

pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let email = req.email.trim();
    validate_email(email).map_err(|e| ApiError::validation_field("email", e))?;

    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or_else(|| ApiError::not_found("No account uses that email"))?;

    let code = PasswordReset::generate_code();
    PasswordReset::issue(&state.db, email, &code, Utc::now().naive_utc()).await?;

    if let Err(e) = state
        .mailer
        .send_reset_code(email, &user.username, &code)
        .await
    {
        tracing::warn!(user_id = user.id, error = %e, "Failed to send password reset email");
        return Err(ApiError::external("Failed to send the reset email"));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "A reset code has been sent to your email".to_string(),
        }),
    ))
}

async fn check_code(state: &AppState, email: &str, code: &str) -> Result<(), ApiError> {
    let valid = PasswordReset::verify(&state.db, email, code.trim(), Utc::now().naive_utc()).await?;
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid or expired code"))
    }
}

pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<Json<VerifyCodeResponse>, ApiError> {
    check_code(&state, req.email.trim(), &req.code).await?;
    Ok(Json(VerifyCodeResponse { valid: true }))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let email = req.email.trim();
    check_code(&state, email, &req.code).await?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("password", validate_reset_password(&req.password));
    errors.check(
        "confirm_password",
        validate_passwords_match(&req.password, &req.confirm_password),
    );
    errors.finish()?;

    let user = User::find_by_email(&state.db, email)
        .await?
        .ok_or_else(|| ApiError::not_found("No account uses that email"))?;

    let password_hash = hash_new_password(&req.password)?;
    if !PasswordReset::mark_used(&state.db, email, req.code.trim()).await? {
        return Err(ApiError::bad_request("Invalid or expired code"));
    }
    User::update_password(&state.db, user.id, &password_hash).await?;
    PasswordReset::delete_for_email(&state.db, email).await?;

    tracing::info!(user_id = user.id, "Password reset");
    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}
