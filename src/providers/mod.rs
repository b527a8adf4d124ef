pub mod caching;
pub mod exchangerate_host;

pub use caching::{CachedPayload, RateService};
pub use exchangerate_host::ExchangeRateHostProvider;
