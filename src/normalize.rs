//! Reshape raw report results into the dashboard payload.

use serde::Serialize;

use crate::error::ApiError;
use crate::reports::{ReportResult, ReportRow};

/// Maximum number of countries in the breakdown.
pub const TOP_COUNTRIES_LIMIT: usize = 10;

/// Aggregate totals, all rendered as strings for the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub active_users: String,
    pub sessions: String,
    pub screen_page_views: String,
    pub engagement_rate: String,
}

impl Default for Overview {
    fn default() -> Self {
        Self {
            active_users: "0".to_string(),
            sessions: "0".to_string(),
            screen_page_views: "0".to_string(),
            engagement_rate: format_engagement_rate(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyUsers {
    pub date: String,
    pub users: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryUsers {
    pub country: String,
    pub users: i64,
}

/// The normalized response body under `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsPayload {
    pub overview: Overview,
    pub daily_users: Vec<DailyUsers>,
    pub top_countries: Vec<CountryUsers>,
}

/// Render a fraction (0.663) as a percentage with one decimal ("66.3%").
pub fn format_engagement_rate(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// Parse an integer metric. Absent or empty values count as zero.
fn int_metric(row: &ReportRow, index: usize) -> Result<i64, ApiError> {
    match row.metric(index).map(str::trim) {
        None | Some("") => Ok(0),
        Some(raw) => raw.parse::<i64>().or_else(|_| {
            // Totals occasionally come back as "12.0".
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && v.fract() == 0.0)
                .map(|v| v as i64)
                .ok_or_else(|| {
                    ApiError::MalformedReport(format!(
                        "metric {} is not an integer: '{}'",
                        index, raw
                    ))
                })
        }),
    }
}

fn float_metric(row: &ReportRow, index: usize) -> Result<f64, ApiError> {
    match row.metric(index).map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                ApiError::MalformedReport(format!("metric {} is not a number: '{}'", index, raw))
            }),
    }
}

/// Totals from the first overview row, in request order:
/// activeUsers, sessions, screenPageViews, engagementRate.
pub fn normalize_overview(report: &ReportResult) -> Result<Overview, ApiError> {
    let Some(row) = report.rows.first() else {
        return Ok(Overview::default());
    };

    Ok(Overview {
        active_users: int_metric(row, 0)?.to_string(),
        sessions: int_metric(row, 1)?.to_string(),
        screen_page_views: int_metric(row, 2)?.to_string(),
        engagement_rate: format_engagement_rate(float_metric(row, 3)?),
    })
}

/// Daily active users sorted ascending by the `YYYYMMDD` date string.
pub fn normalize_daily(report: &ReportResult) -> Result<Vec<DailyUsers>, ApiError> {
    let mut daily = report
        .rows
        .iter()
        .map(|row| {
            Ok(DailyUsers {
                date: row.dimension(0)?.to_string(),
                users: int_metric(row, 0)?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    daily.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(daily)
}

/// Top countries by active users, descending. Ties keep provider order.
pub fn normalize_countries(report: &ReportResult) -> Result<Vec<CountryUsers>, ApiError> {
    let mut countries = report
        .rows
        .iter()
        .map(|row| {
            Ok(CountryUsers {
                country: row.dimension(0)?.to_string(),
                users: int_metric(row, 0)?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    // sort_by is stable
    countries.sort_by(|a, b| b.users.cmp(&a.users));
    countries.truncate(TOP_COUNTRIES_LIMIT);
    Ok(countries)
}

/// Merge the three report results into one payload.
pub fn normalize(
    overview: &ReportResult,
    daily: &ReportResult,
    country: &ReportResult,
) -> Result<AnalyticsPayload, ApiError> {
    Ok(AnalyticsPayload {
        overview: normalize_overview(overview)?,
        daily_users: normalize_daily(daily)?,
        top_countries: normalize_countries(country)?,
    })
}
