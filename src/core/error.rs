//! Error kinds surfaced by the rate service

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FxError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FxError {
    /// Missing or malformed request parameters.
    #[error("{0}")]
    Validation(String),

    /// A currency code is absent from the fetched rate snapshot.
    #[error("Currency {0} not found in rates")]
    UnknownCurrency(String),

    /// Network failure, timeout, non-2xx status or an unusable provider body.
    #[error("{0}")]
    Upstream(String),
}

impl FxError {
    pub fn validation(msg: impl Into<String>) -> Self {
        FxError::Validation(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        FxError::Upstream(msg.into())
    }

    /// HTTP status the request boundary reports for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            FxError::Validation(_) => 400,
            FxError::UnknownCurrency(_) | FxError::Upstream(_) => 502,
        }
    }
}
