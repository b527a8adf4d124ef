//! Converts amounts between currencies using a single rate snapshot

use crate::core::error::{FxError, Result};
use crate::core::rates::{ConversionInfo, ConversionQuery, ConversionResult, RateSnapshot};
use tracing::debug;

/// Converts `amount` between two currencies of `snapshot`.
///
/// The reported `info.rate` is the multiplier chosen by the same branch that
/// produced `result`, so `result / amount` always agrees with it.
pub fn convert(
    snapshot: &RateSnapshot,
    from: &str,
    to: &str,
    amount: f64,
) -> Result<ConversionResult> {
    let base = snapshot.base.to_uppercase();
    let from = from.to_uppercase();
    let to = to.to_uppercase();
    let lookup = |code: &str| {
        snapshot
            .rate(code)
            .ok_or_else(|| FxError::UnknownCurrency(code.to_string()))
    };

    let (rate, result) = if from == base {
        let rate = lookup(&to)?;
        (rate, amount * rate)
    } else if to == base {
        let rate_from = lookup(&from)?;
        (1.0 / rate_from, amount / rate_from)
    } else {
        let rate_from = lookup(&from)?;
        let rate_to = lookup(&to)?;
        let rate = rate_to / rate_from;
        (rate, amount * rate)
    };
    debug!(%from, %to, amount, rate, result, "Converted amount");

    Ok(ConversionResult {
        success: true,
        query: ConversionQuery { from, to, amount },
        info: ConversionInfo {
            timestamp: snapshot.timestamp,
            rate,
        },
        historical: false,
        date: snapshot.date,
        result,
    })
}
