//! Caching front for rate lookups and conversions.

use crate::core::cache::Cache;
use crate::core::convert;
use crate::core::error::{FxError, Result};
use crate::core::rates::{ConversionRequest, ConversionResult, RateProvider, RateSnapshot};
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const ALL_SYMBOLS: &str = "all";
const LATEST: &str = "latest";

/// Payload stored in the shared cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedPayload {
    Rates(RateSnapshot),
    Conversion(ConversionResult),
}

impl From<RateSnapshot> for CachedPayload {
    fn from(snapshot: RateSnapshot) -> Self {
        CachedPayload::Rates(snapshot)
    }
}

impl From<ConversionResult> for CachedPayload {
    fn from(result: ConversionResult) -> Self {
        CachedPayload::Conversion(result)
    }
}

impl TryFrom<CachedPayload> for RateSnapshot {
    type Error = CachedPayload;

    fn try_from(payload: CachedPayload) -> std::result::Result<Self, Self::Error> {
        match payload {
            CachedPayload::Rates(snapshot) => Ok(snapshot),
            other => Err(other),
        }
    }
}

impl TryFrom<CachedPayload> for ConversionResult {
    type Error = CachedPayload;

    fn try_from(payload: CachedPayload) -> std::result::Result<Self, Self::Error> {
        match payload {
            CachedPayload::Conversion(result) => Ok(result),
            other => Err(other),
        }
    }
}

/// Normalizes a comma separated symbol list: trimmed, uppercased, sorted and
/// deduplicated. Empty input means no filter.
pub fn normalize_symbols(symbols: Option<&str>) -> Option<String> {
    let mut codes: Vec<String> = symbols?
        .split(',')
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect();
    codes.sort();
    codes.dedup();
    (!codes.is_empty()).then(|| codes.join(","))
}

/// Deterministic cache keys. Every parameter that changes the result is part
/// of the key and absent optionals get an explicit placeholder.
pub mod keys {
    use super::{ALL_SYMBOLS, LATEST, normalize_symbols};
    use crate::core::rates::ConversionRequest;
    use chrono::NaiveDate;

    pub fn rates(base: &str, symbols: Option<&str>) -> String {
        let symbols = normalize_symbols(symbols);
        format!(
            "rates:{}:{}",
            base.trim().to_uppercase(),
            symbols.as_deref().unwrap_or(ALL_SYMBOLS)
        )
    }

    pub fn history(date: NaiveDate, base: &str, symbols: Option<&str>) -> String {
        let symbols = normalize_symbols(symbols);
        format!(
            "history:{}:{}:{}",
            date.format("%Y-%m-%d"),
            base.trim().to_uppercase(),
            symbols.as_deref().unwrap_or(ALL_SYMBOLS)
        )
    }

    pub fn convert(request: &ConversionRequest) -> String {
        let date = request
            .date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| LATEST.to_string());
        format!(
            "convert:{}:{}:{}:{}",
            request.from.to_uppercase(),
            request.to.to_uppercase(),
            request.amount,
            date
        )
    }
}

/// Serves rates and conversions, consulting the cache before the provider.
/// Only successful results are stored.
pub struct RateService {
    provider: Arc<dyn RateProvider>,
    cache: Arc<dyn Cache<String, CachedPayload>>,
    ttl: Duration,
    default_base: String,
}

impl RateService {
    pub fn new(
        provider: Arc<dyn RateProvider>,
        cache: Arc<dyn Cache<String, CachedPayload>>,
        ttl: Duration,
        default_base: &str,
    ) -> Self {
        RateService {
            provider,
            cache,
            ttl,
            default_base: default_base.to_uppercase(),
        }
    }

    pub fn default_base(&self) -> &str {
        &self.default_base
    }

    async fn cached<T, F, Fut>(&self, key: String, compute: F) -> Result<T>
    where
        T: Clone + Into<CachedPayload> + TryFrom<CachedPayload>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.cache.get(&key).await {
            match T::try_from(hit) {
                Ok(value) => return Ok(value),
                Err(_) => debug!(%key, "Cached payload has unexpected kind, refetching"),
            }
        }

        let value = compute().await?;
        debug!(%key, ttl_secs = self.ttl.as_secs(), "Caching result");
        self.cache
            .put(key, value.clone().into(), Some(self.ttl))
            .await;
        Ok(value)
    }

    /// Latest rates for `base`, optionally filtered to `symbols`.
    pub async fn latest(&self, base: &str, symbols: Option<&str>) -> Result<RateSnapshot> {
        let base = base.trim().to_uppercase();
        let symbols = normalize_symbols(symbols);
        let key = keys::rates(&base, symbols.as_deref());

        let (base, symbols) = (base.as_str(), symbols.as_deref());
        self.cached(key, || async move {
            self.provider.fetch_latest(base, symbols).await
        })
        .await
    }

    /// Rates for `base` as of `date`.
    pub async fn historical(
        &self,
        date: NaiveDate,
        base: &str,
        symbols: Option<&str>,
    ) -> Result<RateSnapshot> {
        let base = base.trim().to_uppercase();
        let symbols = normalize_symbols(symbols);
        let key = keys::history(date, &base, symbols.as_deref());

        let (base, symbols) = (base.as_str(), symbols.as_deref());
        self.cached(key, || async move {
            self.provider.fetch_historical(date, base, symbols).await
        })
        .await
    }

    /// Converts using the full snapshot for the default base, historical when
    /// the request carries a date.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<ConversionResult> {
        let key = keys::convert(request);

        self.cached(key, || async move {
            let base = self.default_base.as_str();
            let snapshot = match request.date {
                Some(date) => self.provider.fetch_historical(date, base, None).await?,
                None => self.provider.fetch_latest(base, None).await?,
            };
            let mut result =
                convert::convert(&snapshot, &request.from, &request.to, request.amount)?;
            result.historical = request.date.is_some();
            Ok::<_, FxError>(result)
        })
        .await
    }
}
