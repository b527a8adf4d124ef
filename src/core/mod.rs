//! Core abstractions: rate data, conversion, caching, errors and config

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use cache::{Cache, Clock};
pub use error::{FxError, Result};
pub use rates::{ConversionRequest, ConversionResult, RateProvider, RateSnapshot};
