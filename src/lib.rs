pub mod api;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::cache::{Clock, SystemClock};
use crate::core::config::AppConfig;
use crate::providers::{CachedPayload, ExchangeRateHostProvider, RateService};
use crate::store::MemoryCache;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Wires the provider client, cache store and rate service from `config`.
pub fn build_state(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<api::AppState> {
    let provider = ExchangeRateHostProvider::new(&config.provider)?;
    let cache = MemoryCache::<String, CachedPayload>::with_clock(clock);
    let service = RateService::new(
        Arc::new(provider),
        Arc::new(cache),
        config.cache.ttl(),
        &config.default_base,
    );
    Ok(api::AppState {
        rates: Arc::new(service),
    })
}

pub async fn run(config_path: Option<&str>, listen: Option<&str>) -> Result<()> {
    info!("fxgate starting...");

    let config = AppConfig::load(config_path)?;
    debug!(
        base_url = %config.provider.base_url,
        has_access_key = config.provider.access_key.is_some(),
        cache_timeout_secs = config.cache.timeout_secs,
        "Loaded config"
    );

    let state = build_state(&config, Arc::new(SystemClock))?;
    let router = api::create_router(state);

    let addr = listen.unwrap_or(&config.server.listen_addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}
