use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument, warn};

use crate::core::config::ProviderConfig;
use crate::core::error::{FxError, Result};
use crate::core::rates::{RateProvider, RateSnapshot};

/// Client for exchangerate.host style APIs serving `/latest` and `/{date}`.
pub struct ExchangeRateHostProvider {
    base_url: String,
    access_key: Option<String>,
    client: reqwest::Client,
}

impl ExchangeRateHostProvider {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fxgate/1.0")
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(ExchangeRateHostProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_key: config.access_key.clone(),
            client,
        })
    }

    /// Builds `<base_url>/<endpoint>` with the query parameters upstream
    /// understands.
    fn endpoint_url(&self, endpoint: &str, base: &str, symbols: Option<&str>) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, endpoint);
        let mut url = Url::parse(&raw)
            .map_err(|e| FxError::upstream(format!("Invalid provider URL {raw}: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("base", base);
            if let Some(symbols) = symbols {
                query.append_pair("symbols", symbols);
            }
            if let Some(key) = &self.access_key {
                query.append_pair("access_key", key);
            }
        }
        Ok(url)
    }

    async fn fetch(&self, endpoint: &str, base: &str, symbols: Option<&str>) -> Result<RateSnapshot> {
        let url = self.endpoint_url(endpoint, base, symbols)?;
        debug!(endpoint, base, ?symbols, "Requesting rates from {}", self.base_url);

        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() { "timed out" } else { "failed" };
            warn!(error = %e, endpoint, "Upstream request {reason}");
            FxError::upstream(format!("Request to rate provider {reason} for /{endpoint}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, endpoint, "Upstream returned error status");
            return Err(FxError::upstream(format!(
                "HTTP error: {status} from rate provider for /{endpoint}"
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FxError::upstream(format!("Failed to read provider response: {e}")))?;

        parse_snapshot(&text, base)
    }
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    success: Option<bool>,
    base: Option<String>,
    date: Option<NaiveDate>,
    timestamp: Option<i64>,
    rates: Option<BTreeMap<String, f64>>,
    error: Option<serde_json::Value>,
}

/// Validates an upstream body into a snapshot. A missing `base` falls back
/// to the one requested.
fn parse_snapshot(body: &str, requested_base: &str) -> Result<RateSnapshot> {
    let data: ProviderResponse = serde_json::from_str(body)
        .map_err(|e| FxError::upstream(format!("Failed to parse provider response: {e}")))?;

    if data.success == Some(false) {
        let detail = data
            .error
            .as_ref()
            .and_then(|err| {
                err.get("info")
                    .or_else(|| err.get("type"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| err.as_str().map(str::to_string))
            })
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(FxError::upstream(format!("Rate provider error: {detail}")));
    }

    let rates = data
        .rates
        .ok_or_else(|| FxError::upstream("Rate provider response has no rates"))?;

    // Codes arrive sorted, so an exact upper-case key precedes its
    // mixed-case duplicates and wins.
    let mut normalized = BTreeMap::new();
    for (code, rate) in rates {
        normalized.entry(code.to_uppercase()).or_insert(rate);
    }

    Ok(RateSnapshot {
        base: data
            .base
            .unwrap_or_else(|| requested_base.to_string())
            .to_uppercase(),
        date: data.date,
        timestamp: data.timestamp,
        rates: normalized,
    })
}

#[async_trait]
impl RateProvider for ExchangeRateHostProvider {
    #[instrument(name = "FetchLatest", skip(self))]
    async fn fetch_latest(&self, base: &str, symbols: Option<&str>) -> Result<RateSnapshot> {
        self.fetch("latest", base, symbols).await
    }

    #[instrument(name = "FetchHistorical", skip(self), fields(date = %date))]
    async fn fetch_historical(
        &self,
        date: NaiveDate,
        base: &str,
        symbols: Option<&str>,
    ) -> Result<RateSnapshot> {
        let endpoint = date.format("%Y-%m-%d").to_string();
        self.fetch(&endpoint, base, symbols).await
    }
}
