//! HTTP server exposing `GET /api/analytics`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use reqwest::Client;
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::AnalyticsClient;
use crate::config::Config;
use crate::error::{ApiError, AppError};
use crate::normalize::AnalyticsPayload;

/// Shared, read-only request context.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub analytics: AnalyticsClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        // No idle pooling: every request opens its own upstream connections.
        let http_client = Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            analytics: AnalyticsClient::new(&config, http_client),
            config: Arc::new(config),
        })
    }
}

/// Success envelope: `{"success": true, "data": {...}}`.
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Construct the router with CORS and request tracing attached.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/analytics", get(get_analytics))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .with_state(state)
}

/// `GET /api/analytics` - overview, daily users and top countries for the last 30 days.
#[tracing::instrument(skip(state))]
pub async fn get_analytics(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let payload: AnalyticsPayload = state.analytics.fetch_dashboard(&state.config).await?;
    Ok(Json(SuccessResponse::new(payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Overview;
    use serde_json::json;

    #[test]
    fn test_success_envelope_shape() {
        let payload = AnalyticsPayload {
            overview: Overview::default(),
            daily_users: vec![],
            top_countries: vec![],
        };
        let value = serde_json::to_value(SuccessResponse::new(payload)).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["data"]["overview"]["engagementRate"], "0.0%");
        assert_eq!(value["data"]["dailyUsers"], json!([]));
        assert_eq!(value["data"]["topCountries"], json!([]));
    }

    #[test]
    fn test_app_state_builds_with_defaults() {
        let state = AppState::new(Config::default()).unwrap();
        assert_eq!(state.config.port, 3000);
    }
}
