//! Caching decorator for any [`MarketDataGateway`]

use super::MarketDataGateway;
use crate::error::Result;
use crate::model::{HistoryRange, Instrument, PriceHistory, normalize_symbol};
use async_trait::async_trait;
use cached::{Cached, TimedCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Cache key for history requests
type HistoryKey = (String, u32);

/// Gateway decorator that keeps successful responses for a fixed lifespan.
///
/// Errors are never cached, so a failed lookup is retried on the next call.
pub struct CachedGateway<G> {
    inner: G,
    instruments: Arc<RwLock<TimedCache<String, Instrument>>>,
    histories: Arc<RwLock<TimedCache<HistoryKey, PriceHistory>>>,
}

impl<G: MarketDataGateway> CachedGateway<G> {
    /// Wrap `inner` with separate TTLs for snapshots and histories
    pub fn new(inner: G, instrument_ttl: Duration, history_ttl: Duration) -> Self {
        Self {
            inner,
            instruments: Arc::new(RwLock::new(TimedCache::with_lifespan(instrument_ttl))),
            histories: Arc::new(RwLock::new(TimedCache::with_lifespan(history_ttl))),
        }
    }

    /// Drop every cached entry
    pub async fn clear(&self) {
        self.instruments.write().await.cache_clear();
        self.histories.write().await.cache_clear();
    }

    /// Number of cached snapshots and histories
    pub async fn len(&self) -> (usize, usize) {
        (
            self.instruments.read().await.cache_size(),
            self.histories.read().await.cache_size(),
        )
    }

    /// Access the wrapped gateway
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: MarketDataGateway> MarketDataGateway for CachedGateway<G> {
    async fn fetch_instrument(&self, symbol: &str) -> Result<Instrument> {
        let key = normalize_symbol(symbol)?;

        if let Some(hit) = self.instruments.write().await.cache_get(&key).cloned() {
            debug!(symbol = %key, "Instrument cache hit");
            return Ok(hit);
        }
        debug!(symbol = %key, "Instrument cache miss");

        let instrument = self.inner.fetch_instrument(&key).await?;
        self.instruments
            .write()
            .await
            .cache_set(key, instrument.clone());
        Ok(instrument)
    }

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<PriceHistory> {
        let key = (normalize_symbol(symbol)?, range.as_days());

        if let Some(hit) = self.histories.write().await.cache_get(&key).cloned() {
            debug!(symbol = %key.0, days = key.1, "History cache hit");
            return Ok(hit);
        }
        debug!(symbol = %key.0, days = key.1, "History cache miss");

        let history = self.inner.fetch_history(&key.0, range).await?;
        self.histories.write().await.cache_set(key, history.clone());
        Ok(history)
    }
}
