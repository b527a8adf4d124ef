//! HTTP surface: `/rates`, `/convert`, `/history` and `/health`.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Query, State},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::core::error::FxError;
use crate::core::rates::{ConversionRequest, ConversionResult, RateSnapshot, parse_date};
use crate::providers::caching::RateService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub rates: Arc<RateService>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/rates", get(get_rates))
        .route("/convert", get(convert_currency))
        .route("/history", get(get_historical))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for FxError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `Query` whose rejection renders as the `{"error": ...}` body with a 400.
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = FxError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection| FxError::validation(rejection.body_text()))
    }
}

#[derive(Debug, Deserialize)]
pub struct RatesQuery {
    pub base: Option<String>,
    pub symbols: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub date: Option<String>,
    pub base: Option<String>,
    pub symbols: Option<String>,
}

fn base_or_default<'a>(base: &'a Option<String>, state: &'a AppState) -> &'a str {
    base.as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| state.rates.default_base())
}

/// GET `/rates?base=USD&symbols=EUR,GBP`
async fn get_rates(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RatesQuery>,
) -> Result<Json<RateSnapshot>, FxError> {
    let base = base_or_default(&query.base, &state);
    let snapshot = state.rates.latest(base, query.symbols.as_deref()).await?;
    Ok(Json(snapshot))
}

/// GET `/convert?from=USD&to=EUR&amount=10[&date=YYYY-MM-DD]`
async fn convert_currency(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ConvertQuery>,
) -> Result<Json<ConversionResult>, FxError> {
    let request = ConversionRequest::parse(
        query.from.as_deref(),
        query.to.as_deref(),
        query.amount.as_deref(),
        query.date.as_deref(),
    )?;
    let result = state.rates.convert(&request).await?;
    Ok(Json(result))
}

/// GET `/history?date=YYYY-MM-DD&base=USD&symbols=EUR`
async fn get_historical(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Result<Json<RateSnapshot>, FxError> {
    let date = query
        .date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| FxError::validation("Parameter 'date' is required"))?;
    let date = parse_date(date)?;

    let base = base_or_default(&query.base, &state);
    let snapshot = state
        .rates
        .historical(date, base, query.symbols.as_deref())
        .await?;
    Ok(Json(snapshot))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let response = FxError::validation("Parameters 'from' and 'to' are required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Parameters 'from' and 'to' are required"})
        );
    }

    #[tokio::test]
    async fn test_gateway_error_responses() {
        let response = FxError::UnknownCurrency("XYZ".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_json(response).await,
            json!({"error": "Currency XYZ not found in rates"})
        );

        let response = FxError::upstream("HTTP error: 503").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
