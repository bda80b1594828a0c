//! Market data gateway
//!
//! [`MarketDataGateway`] is the only interface the engine consumes from its
//! environment. The Yahoo adapter talks to the network; [`CachedGateway`]
//! and [`RetryingGateway`] are decorators callers may stack on top of any
//! gateway. Adapters themselves never cache.

pub mod alpha_vantage;
pub mod cached;
pub mod retry;
pub mod yahoo;

use crate::error::Result;
use crate::model::{HistoryRange, Instrument, PriceHistory};
use async_trait::async_trait;
use std::sync::Arc;

pub use alpha_vantage::{AlphaVantageClient, CompanyOverview};
pub use cached::CachedGateway;
pub use retry::{RetryPolicy, RetryingGateway};
pub use yahoo::YahooGateway;

/// Source of instrument snapshots and price histories
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Current snapshot for `symbol`.
    ///
    /// Fails with `DataUnavailable` for unknown symbols or provider errors and
    /// with `RateLimited` when the provider throttles.
    async fn fetch_instrument(&self, symbol: &str) -> Result<Instrument>;

    /// Daily price history for `symbol` covering `range`
    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<PriceHistory>;
}

/// Shared, dynamically dispatched gateway
pub type SharedGateway = Arc<dyn MarketDataGateway>;

#[async_trait]
impl<G: MarketDataGateway + ?Sized> MarketDataGateway for Arc<G> {
    async fn fetch_instrument(&self, symbol: &str) -> Result<Instrument> {
        (**self).fetch_instrument(symbol).await
    }

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<PriceHistory> {
        (**self).fetch_history(symbol, range).await
    }
}
