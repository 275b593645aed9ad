use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_date, validate_hours};
use crate::db::{CreateSleepSessionRequest, SleepInProgress, SleepSession};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CurrentSleepResponse {
    pub sleeping: bool,
    pub started_at: Option<String>,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<SleepSession>>, ApiError> {
    let sessions = SleepSession::list_for_user(&state.db, current.user.id).await?;
    Ok(Json(sessions))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateSleepSessionRequest>,
) -> Result<(StatusCode, Json<SleepSession>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    let date = match validate_date(req.year, req.month, req.day) {
        Ok(date) => Some(date),
        Err(message) => {
            errors.add("date", message);
            None
        }
    };
    errors.check("hours", validate_hours(req.hours));
    errors.finish()?;

    let date = date.ok_or_else(|| ApiError::bad_request("Invalid date"))?;
    let session = SleepSession::create(&state.db, current.user.id, date, req.hours).await?;

    tracing::info!(
        user_id = current.user.id,
        session_id = session.id,
        hours = session.hours,
        "Sleep session recorded"
    );
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if SleepSession::delete(&state.db, current.user.id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("Sleep session not found"))
    }
}

pub async fn current_sleep(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<CurrentSleepResponse>, ApiError> {
    let in_progress = SleepInProgress::get(&state.db, current.user.id).await?;
    Ok(Json(CurrentSleepResponse {
        sleeping: in_progress.is_some(),
        started_at: in_progress.map(|s| s.started_at),
    }))
}

pub async fn start_sleep(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<(StatusCode, Json<SleepInProgress>), ApiError> {
    let started =
        SleepInProgress::start(&state.db, current.user.id, Local::now().naive_local()).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

pub async fn end_sleep(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<SleepSession>, ApiError> {
    let session =
        SleepInProgress::finish(&state.db, current.user.id, Local::now().naive_local()).await?;
    Ok(Json(session))
}
