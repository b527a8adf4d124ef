//! Rate snapshots, conversion requests and the upstream provider abstraction

use crate::core::error::{FxError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rates for one point in time, all expressed against `base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub base: String,
    pub date: Option<NaiveDate>,
    pub timestamp: Option<i64>,
    pub rates: BTreeMap<String, f64>,
}

impl RateSnapshot {
    /// Looks up a usable rate for `code`. Zero, negative and non-finite
    /// values count as absent; the base itself is always 1.
    pub fn rate(&self, code: &str) -> Option<f64> {
        let rate = self.rates.get(code).copied();
        if rate.is_none() && code.eq_ignore_ascii_case(&self.base) {
            return Some(1.0);
        }
        rate.filter(|rate| rate.is_finite() && *rate > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub date: Option<NaiveDate>,
}

impl ConversionRequest {
    /// Validates raw query values. Currency codes are uppercased and a
    /// missing amount defaults to 1; an empty one is not a number.
    pub fn parse(
        from: Option<&str>,
        to: Option<&str>,
        amount: Option<&str>,
        date: Option<&str>,
    ) -> Result<Self> {
        let from = non_empty(from).map(str::to_uppercase);
        let to = non_empty(to).map(str::to_uppercase);
        let (Some(from), Some(to)) = (from, to) else {
            return Err(FxError::validation(
                "Parameters 'from' and 'to' are required",
            ));
        };

        let amount = match amount {
            None => 1.0,
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map_err(|_| FxError::validation("Amount must be a number"))?,
        };
        if !amount.is_finite() || amount <= 0.0 {
            return Err(FxError::validation("Amount must be a positive number"));
        }

        let date = non_empty(date).map(parse_date).transpose()?;

        Ok(Self {
            from,
            to,
            amount,
            date,
        })
    }
}

/// Parses a `YYYY-MM-DD` query value.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        FxError::validation(format!(
            "Parameter 'date' must be formatted as YYYY-MM-DD, got '{raw}'"
        ))
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionQuery {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionInfo {
    pub timestamp: Option<i64>,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    pub query: ConversionQuery,
    pub info: ConversionInfo,
    pub historical: bool,
    pub date: Option<NaiveDate>,
    pub result: f64,
}

/// Source of rate snapshots, usually a remote exchange-rate service.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_latest(&self, base: &str, symbols: Option<&str>) -> Result<RateSnapshot>;

    async fn fetch_historical(
        &self,
        date: NaiveDate,
        base: &str,
        symbols: Option<&str>,
    ) -> Result<RateSnapshot>;
}
