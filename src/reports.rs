//! Analytics Data API `runReport` client with a typed query builder.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::auth::AccessToken;
use crate::error::ApiError;

/// Grouping dimension for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Date,
    Country,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Date => "date",
            Dimension::Country => "country",
        }
    }
}

/// Requested metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ActiveUsers,
    Sessions,
    ScreenPageViews,
    EngagementRate,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ActiveUsers => "activeUsers",
            Metric::Sessions => "sessions",
            Metric::ScreenPageViews => "screenPageViews",
            Metric::EngagementRate => "engagementRate",
        }
    }
}

/// Date range in the provider's relative date syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: String,
    pub end_date: String,
}

impl DateRange {
    /// The trailing `days` days through today.
    pub fn trailing_days(days: u32) -> Self {
        Self {
            start_date: format!("{}daysAgo", days),
            end_date: "today".to_string(),
        }
    }
}

/// Immutable description of one report request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    date_range: DateRange,
    dimension: Option<Dimension>,
    metrics: Vec<Metric>,
}

impl ReportQuery {
    /// Create a query over a date range with no dimension or metrics.
    pub fn new(date_range: DateRange) -> Self {
        Self {
            date_range,
            dimension: None,
            metrics: Vec::new(),
        }
    }

    /// Group rows by a dimension.
    pub fn dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Add a metric.
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn date_range(&self) -> &DateRange {
        &self.date_range
    }

    pub fn grouping(&self) -> Option<Dimension> {
        self.dimension
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Build the JSON request body.
    pub fn to_request_body(&self) -> RunReportRequest {
        RunReportRequest {
            date_ranges: vec![self.date_range.clone()],
            dimensions: self
                .dimension
                .iter()
                .map(|d| NamedField {
                    name: d.as_str().to_string(),
                })
                .collect(),
            metrics: self
                .metrics
                .iter()
                .map(|m| NamedField {
                    name: m.as_str().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedField {
    pub name: String,
}

/// `runReport` request body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub date_ranges: Vec<DateRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<NamedField>,
    pub metrics: Vec<NamedField>,
}

/// A single dimension or metric cell. Values always arrive as strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportValue {
    #[serde(default)]
    pub value: Option<String>,
}

/// One report row.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<ReportValue>,
    #[serde(default)]
    pub metric_values: Vec<ReportValue>,
}

impl ReportRow {
    /// Dimension value at `index`; a grouped row without it is malformed.
    pub fn dimension(&self, index: usize) -> Result<&str, ApiError> {
        self.dimension_values
            .get(index)
            .and_then(|v| v.value.as_deref())
            .ok_or_else(|| {
                ApiError::MalformedReport(format!("row is missing dimension value {}", index))
            })
    }

    /// Raw metric value at `index`, if present.
    pub fn metric(&self, index: usize) -> Option<&str> {
        self.metric_values
            .get(index)
            .and_then(|v| v.value.as_deref())
    }
}

/// `runReport` response. The provider omits `rows` when there is no data.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResult {
    #[serde(default)]
    pub rows: Vec<ReportRow>,
    #[serde(default)]
    pub row_count: Option<i64>,
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ProviderErrorResponse {
    pub error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ProviderErrorDetail {
    #[serde(default)]
    pub code: Option<i64>,
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Client for the `runReport` operation.
#[derive(Clone)]
pub struct ReportsClient {
    base_url: String,
    http_client: Client,
}

impl ReportsClient {
    pub fn new(base_url: String, http_client: Client) -> Self {
        Self {
            base_url,
            http_client,
        }
    }

    fn run_report_url(&self, property_id: &str) -> String {
        format!(
            "{}/properties/{}:runReport",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(property_id)
        )
    }

    /// Run one report against a property.
    pub async fn run_report(
        &self,
        token: &AccessToken,
        property_id: &str,
        query: &ReportQuery,
    ) -> Result<ReportResult, ApiError> {
        let url = self.run_report_url(property_id);
        tracing::debug!(%url, dimension = ?query.grouping(), "POST runReport");

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", token.bearer())
            .header("Accept", "application/json")
            .json(&query.to_request_body())
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle HTTP response and parse JSON.
    async fn handle_response(&self, response: reqwest::Response) -> Result<ReportResult, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            parse_report(&body)
        } else {
            tracing::debug!(%status, body = %body, "runReport error response");
            Err(parse_error_response(status, &body))
        }
    }
}

impl std::fmt::Debug for ReportsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportsClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Parse a successful `runReport` body.
pub fn parse_report(body: &str) -> Result<ReportResult, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        ApiError::MalformedReport(format!(
            "{} - Body: {}",
            e,
            body.chars().take(200).collect::<String>()
        ))
    })
}

/// Parse an error response.
fn parse_error_response(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ProviderErrorResponse>(body) {
        Ok(error) => ApiError::ProviderError {
            status,
            code: error
                .error
                .status
                .or_else(|| error.error.code.map(|c| c.to_string()))
                .unwrap_or_else(|| status.as_u16().to_string()),
            message: error.error.message,
        },
        Err(_) => ApiError::HttpError {
            status,
            body: body.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_body_without_dimension_omits_dimensions() {
        let query = ReportQuery::new(DateRange::trailing_days(30))
            .metric(Metric::ActiveUsers)
            .metric(Metric::EngagementRate);
        let body = serde_json::to_value(query.to_request_body()).unwrap();
        assert_eq!(
            body,
            json!({
                "dateRanges": [{"startDate": "30daysAgo", "endDate": "today"}],
                "metrics": [{"name": "activeUsers"}, {"name": "engagementRate"}]
            })
        );
    }

    #[test]
    fn test_query_body_with_dimension() {
        let query = ReportQuery::new(DateRange::trailing_days(7))
            .dimension(Dimension::Country)
            .metric(Metric::ActiveUsers);
        let body = serde_json::to_value(query.to_request_body()).unwrap();
        assert_eq!(body["dimensions"], json!([{"name": "country"}]));
        assert_eq!(body["dateRanges"][0]["startDate"], "7daysAgo");
    }

    #[test]
    fn test_parse_report_without_rows() {
        let result = parse_report(r#"{"rowCount": 0, "kind": "analyticsData#runReport"}"#).unwrap();
        assert!(result.rows.is_empty());
        assert_eq!(result.row_count, Some(0));
    }

    #[test]
    fn test_parse_report_rows() {
        let body = json!({
            "rows": [
                {"dimensionValues": [{"value": "20240102"}], "metricValues": [{"value": "12"}]},
                {"dimensionValues": [{"value": "20240101"}], "metricValues": [{}]}
            ]
        })
        .to_string();
        let result = parse_report(&body).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].dimension(0).unwrap(), "20240102");
        assert_eq!(result.rows[0].metric(0), Some("12"));
        assert_eq!(result.rows[1].metric(0), None);
        assert_eq!(result.rows[1].metric(5), None);
    }

    #[test]
    fn test_missing_dimension_is_malformed() {
        let row = ReportRow::default();
        assert!(matches!(row.dimension(0), Err(ApiError::MalformedReport(_))));
    }

    #[test]
    fn test_parse_report_rejects_wrong_shape() {
        let err = parse_report(r#"{"rows": {"not": "a list"}}"#).unwrap_err();
        assert!(matches!(err, ApiError::MalformedReport(_)));

        let err = parse_report("<html>bad gateway</html>").unwrap_err();
        assert!(err.to_string().contains("bad gateway"));
    }

    #[test]
    fn test_parse_google_error_response() {
        let body = json!({
            "error": {
                "code": 403,
                "message": "User does not have sufficient permissions for this property.",
                "status": "PERMISSION_DENIED"
            }
        })
        .to_string();
        match parse_error_response(StatusCode::FORBIDDEN, &body) {
            ApiError::ProviderError { status, code, .. } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(code, "PERMISSION_DENIED");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_plain_error_response() {
        let err = parse_error_response(StatusCode::SERVICE_UNAVAILABLE, "upstream down");
        assert!(matches!(err, ApiError::HttpError { .. }));
    }

    #[test]
    fn test_run_report_url_encodes_property() {
        let client = ReportsClient::new("http://localhost/v1beta/".into(), Client::new());
        assert_eq!(
            client.run_report_url("123"),
            "http://localhost/v1beta/properties/123:runReport"
        );
    }
}
