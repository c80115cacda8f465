//! Dashboard analytics client: the three fixed reports and their normalization.

use std::time::Instant;

use reqwest::Client;

use crate::auth::{AccessToken, OAuth2Client};
use crate::config::Config;
use crate::credentials::ServiceAccountCredential;
use crate::error::{ApiError, AppError};
use crate::normalize::{self, AnalyticsPayload};
use crate::reports::{DateRange, Dimension, Metric, ReportQuery, ReportResult, ReportsClient};

/// Window covered by every dashboard report.
pub const DASHBOARD_WINDOW_DAYS: u32 = 30;

/// Totals without a dimension. Metric order is relied on by the normalizer.
pub fn overview_query() -> ReportQuery {
    ReportQuery::new(DateRange::trailing_days(DASHBOARD_WINDOW_DAYS))
        .metric(Metric::ActiveUsers)
        .metric(Metric::Sessions)
        .metric(Metric::ScreenPageViews)
        .metric(Metric::EngagementRate)
}

pub fn daily_query() -> ReportQuery {
    ReportQuery::new(DateRange::trailing_days(DASHBOARD_WINDOW_DAYS))
        .dimension(Dimension::Date)
        .metric(Metric::ActiveUsers)
}

pub fn country_query() -> ReportQuery {
    ReportQuery::new(DateRange::trailing_days(DASHBOARD_WINDOW_DAYS))
        .dimension(Dimension::Country)
        .metric(Metric::ActiveUsers)
}

/// Raw results of the three dashboard reports.
#[derive(Debug, Clone, Default)]
pub struct DashboardReports {
    pub overview: ReportResult,
    pub daily: ReportResult,
    pub country: ReportResult,
}

/// Analytics client.
#[derive(Clone)]
pub struct AnalyticsClient {
    auth_client: OAuth2Client,
    reports_client: ReportsClient,
}

impl AnalyticsClient {
    pub fn new(config: &Config, http_client: Client) -> Self {
        Self {
            auth_client: OAuth2Client::new(http_client.clone()),
            reports_client: ReportsClient::new(config.api_base_url.clone(), http_client),
        }
    }

    /// Resolve credentials, authenticate and fetch the normalized payload.
    ///
    /// Nothing is reused between calls; each call resolves a fresh credential
    /// and token.
    pub async fn fetch_dashboard(&self, config: &Config) -> Result<AnalyticsPayload, AppError> {
        let credential = ServiceAccountCredential::resolve(config)?;
        let property_id = config.property_id()?;

        let started = Instant::now();
        let token = self
            .auth_client
            .fetch_token(&credential)
            .await
            .map_err(ApiError::from)?;

        let reports = self.fetch_reports(&token, property_id).await?;
        let payload = normalize::normalize(&reports.overview, &reports.daily, &reports.country)?;

        tracing::info!(
            property_id,
            overview_rows = reports.overview.rows.len(),
            daily_rows = reports.daily.rows.len(),
            country_rows = reports.country.rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched dashboard analytics"
        );

        Ok(payload)
    }

    /// Issue the three reports concurrently; the first failure fails them all.
    pub async fn fetch_reports(
        &self,
        token: &AccessToken,
        property_id: &str,
    ) -> Result<DashboardReports, ApiError> {
        let (overview_q, daily_q, country_q) = (overview_query(), daily_query(), country_query());

        let (overview, daily, country) = tokio::try_join!(
            self.reports_client.run_report(token, property_id, &overview_q),
            self.reports_client.run_report(token, property_id, &daily_q),
            self.reports_client.run_report(token, property_id, &country_q),
        )?;

        Ok(DashboardReports {
            overview,
            daily,
            country,
        })
    }

    /// Run an arbitrary report, used by the diagnostics command.
    pub async fn run_report(
        &self,
        credential: &ServiceAccountCredential,
        property_id: &str,
        query: &ReportQuery,
    ) -> Result<ReportResult, ApiError> {
        let token = self.auth_client.fetch_token(credential).await?;
        self.reports_client.run_report(&token, property_id, query).await
    }
}

impl std::fmt::Debug for AnalyticsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsClient")
            .field("reports_client", &self.reports_client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overview_query_metric_order() {
        let body = serde_json::to_value(overview_query().to_request_body()).unwrap();
        assert_eq!(
            body,
            json!({
                "dateRanges": [{"startDate": "30daysAgo", "endDate": "today"}],
                "metrics": [
                    {"name": "activeUsers"},
                    {"name": "sessions"},
                    {"name": "screenPageViews"},
                    {"name": "engagementRate"}
                ]
            })
        );
    }

    #[test]
    fn test_grouped_queries() {
        assert_eq!(daily_query().grouping(), Some(Dimension::Date));
        assert_eq!(daily_query().metrics(), &[Metric::ActiveUsers]);
        assert_eq!(country_query().grouping(), Some(Dimension::Country));
        assert_eq!(country_query().metrics(), &[Metric::ActiveUsers]);
        assert_eq!(
            country_query().date_range(),
            &DateRange::trailing_days(DASHBOARD_WINDOW_DAYS)
        );
    }

    #[tokio::test]
    async fn test_fetch_dashboard_reports_missing_configuration() {
        let config = Config::default();
        let client = AnalyticsClient::new(&config, Client::new());
        let err = client.fetch_dashboard(&config).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
