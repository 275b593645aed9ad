//! Sleep statistics module
//!
//! Pure aggregations over a user's recorded sessions. Callers load every
//! session with [`SleepSession::list_for_user`](crate::db::SleepSession::list_for_user)
//! and pass the newest-first list in; nothing here touches the database.
//!
//! Sessions whose stored date isn't a real calendar date still count towards
//! [`summarize`] but are skipped by the date-based groupings.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::SleepSession;

/// Number of weeks shown by the weekday/weekend breakdown
pub const DEFAULT_WEEKS: usize = 8;

/// Number of sessions shown on the dashboard
pub const DEFAULT_RECENT: usize = 10;

/// Number of sessions used for the daily trend
pub const DEFAULT_TREND_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepSummary {
    /// Mean hours per session, `None` when there is no data
    pub average_hours: Option<f64>,
    pub session_count: usize,
    pub total_hours: f64,
    /// Hours recorded in the current calendar month
    pub month_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayAverage {
    pub weekday: String,
    pub average_hours: f64,
    pub session_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSplit {
    /// `%Y-W%U` week key
    pub week: String,
    pub weekday_average: f64,
    pub weekend_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthAverage {
    pub year: i32,
    pub month: u32,
    pub average_hours: f64,
    pub session_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearTrend {
    /// Change in hours per day
    pub slope: f64,
    /// Fitted hours on the first day of the window
    pub intercept: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTrend {
    pub points: Vec<TrendPoint>,
    pub average_hours: Option<f64>,
    pub trend: Option<LinearTrend>,
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn dated(sessions: &[SleepSession]) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
    sessions.iter().filter_map(|s| s.date().map(|d| (d, s.hours)))
}

pub fn summarize(sessions: &[SleepSession], today: NaiveDate) -> SleepSummary {
    let hours: Vec<f64> = sessions.iter().map(|s| s.hours).collect();
    let month_hours = sessions
        .iter()
        .filter(|s| s.year == today.year() && s.month == today.month())
        .map(|s| s.hours)
        .sum();

    SleepSummary {
        average_hours: mean(&hours),
        session_count: sessions.len(),
        total_hours: hours.iter().sum(),
        month_hours,
    }
}

/// Average hours per day of the week, Monday first, only days with data
pub fn by_weekday(sessions: &[SleepSession]) -> Vec<WeekdayAverage> {
    let mut buckets: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (date, hours) in dated(sessions) {
        buckets
            .entry(date.weekday().num_days_from_monday())
            .or_default()
            .push(hours);
    }

    buckets
        .into_iter()
        .filter_map(|(day, hours)| {
            let weekday = Weekday::try_from(day as u8).ok()?;
            Some(WeekdayAverage {
                weekday: format!("{:?}", weekday),
                average_hours: mean(&hours)?,
                session_count: hours.len(),
            })
        })
        .collect()
}

/// Weekday vs weekend averages for the latest `weeks` weeks, oldest first
pub fn weekday_vs_weekend(sessions: &[SleepSession], weeks: usize) -> Vec<WeekSplit> {
    let mut buckets: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for (date, hours) in dated(sessions) {
        let entry = buckets.entry(date.format("%Y-W%U").to_string()).or_default();
        if is_weekend(date) {
            entry.1.push(hours);
        } else {
            entry.0.push(hours);
        }
    }

    let skip = buckets.len().saturating_sub(weeks);
    buckets
        .into_iter()
        .skip(skip)
        .map(|(week, (weekday, weekend))| WeekSplit {
            week,
            weekday_average: mean(&weekday).unwrap_or(0.0),
            weekend_average: mean(&weekend).unwrap_or(0.0),
        })
        .collect()
}

pub fn by_month(sessions: &[SleepSession]) -> Vec<MonthAverage> {
    let mut buckets: BTreeMap<(i32, u32), Vec<f64>> = BTreeMap::new();
    for (date, hours) in dated(sessions) {
        buckets
            .entry((date.year(), date.month()))
            .or_default()
            .push(hours);
    }

    buckets
        .into_iter()
        .filter_map(|((year, month), hours)| {
            Some(MonthAverage {
                year,
                month,
                average_hours: mean(&hours)?,
                session_count: hours.len(),
            })
        })
        .collect()
}

/// The latest `limit` sessions in date order, with a least-squares fit
/// of hours against days since the first point.
pub fn daily_trend(sessions: &[SleepSession], limit: usize) -> DailyTrend {
    let mut points: Vec<TrendPoint> = dated(sessions)
        .take(limit)
        .map(|(date, hours)| TrendPoint { date, hours })
        .collect();
    points.sort_by_key(|p| p.date);

    let hours: Vec<f64> = points.iter().map(|p| p.hours).collect();
    let average_hours = mean(&hours);
    let trend = fit_line(&points);

    DailyTrend {
        points,
        average_hours,
        trend,
    }
}

fn fit_line(points: &[TrendPoint]) -> Option<LinearTrend> {
    let first = points.first()?.date;
    let xs: Vec<f64> = points
        .iter()
        .map(|p| (p.date - first).num_days() as f64)
        .collect();

    // A vertical line has no slope
    if xs.iter().all(|x| *x == xs[0]) {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.hours).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, p) in xs.iter().zip(points) {
        sxy += (x - mean_x) * (p.hours - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }

    let slope = sxy / sxx;
    Some(LinearTrend {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// First `n` sessions of a newest-first list
pub fn recent(sessions: &[SleepSession], n: usize) -> &[SleepSession] {
    &sessions[..n.min(sessions.len())]
}
