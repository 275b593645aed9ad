use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::error::ApiError;
use crate::db::SleepSession;
use crate::stats::{self, DailyTrend, MonthAverage, SleepSummary, WeekSplit, WeekdayAverage};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub summary: SleepSummary,
    pub recent: Vec<SleepSession>,
}

#[derive(Debug, Deserialize)]
pub struct WeeksQuery {
    pub weeks: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub limit: Option<usize>,
}

async fn load_sessions(state: &AppState, user_id: i64) -> Result<Vec<SleepSession>, ApiError> {
    Ok(SleepSession::list_for_user(&state.db, user_id).await?)
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let sessions = load_sessions(&state, current.user.id).await?;
    let summary = stats::summarize(&sessions, Local::now().date_naive());
    let recent = stats::recent(&sessions, stats::DEFAULT_RECENT).to_vec();
    Ok(Json(DashboardResponse { summary, recent }))
}

pub async fn weekdays(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<WeekdayAverage>>, ApiError> {
    let sessions = load_sessions(&state, current.user.id).await?;
    Ok(Json(stats::by_weekday(&sessions)))
}

pub async fn weeks(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<WeeksQuery>,
) -> Result<Json<Vec<WeekSplit>>, ApiError> {
    let weeks = query.weeks.unwrap_or(stats::DEFAULT_WEEKS);
    if weeks == 0 {
        return Err(ApiError::validation_field("weeks", "weeks must be at least 1"));
    }
    let sessions = load_sessions(&state, current.user.id).await?;
    Ok(Json(stats::weekday_vs_weekend(&sessions, weeks)))
}

pub async fn months(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<MonthAverage>>, ApiError> {
    let sessions = load_sessions(&state, current.user.id).await?;
    Ok(Json(stats::by_month(&sessions)))
}

pub async fn trend(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<DailyTrend>, ApiError> {
    let limit = query.limit.unwrap_or(stats::DEFAULT_TREND_LIMIT);
    if limit == 0 {
        return Err(ApiError::validation_field("limit", "limit must be at least 1"));
    }
    let sessions = load_sessions(&state, current.user.id).await?;
    Ok(Json(stats::daily_trend(&sessions, limit)))
}
