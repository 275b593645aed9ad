use axum::{extract::State, Extension, Json};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::ApiError;
use crate::db::{ReminderSettings, UserSettings};
use crate::AppState;

/// The caller's reminder settings, defaults if never saved
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<ReminderSettings>, ApiError> {
    let settings = UserSettings::get_or_default(&state.db, current.user.id).await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ReminderSettings>,
) -> Result<Json<ReminderSettings>, ApiError> {
    let settings = req
        .normalized()
        .map_err(|(field, e)| ApiError::validation_field(field, e.to_string()))?;

    let saved = UserSettings::upsert(&state.db, current.user.id, &settings).await?;

    tracing::info!(
        user_id = current.user.id,
        bedtime_enabled = saved.reminders.bedtime_enabled,
        alarm_enabled = saved.reminders.alarm_enabled,
        "Reminder settings updated"
    );
    Ok(Json(saved.reminders))
}
