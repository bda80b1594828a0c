//! Yahoo Finance gateway adapter

use super::MarketDataGateway;
use super::alpha_vantage::AlphaVantageClient;
use crate::config::EngineConfig;
use crate::error::{AdvisorError, Result};
use crate::model::{HistoryRange, Instrument, PriceHistory, PricePoint, normalize_symbol};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

const PROVIDER: &str = "Yahoo Finance";

/// Alpha Vantage free tier allows five calls per minute
const ALPHA_VANTAGE_RATE_LIMIT: u32 = 5;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Gateway backed by Yahoo Finance quotes and histories.
///
/// Company metadata (sector, market cap, P/E) is looked up through Alpha
/// Vantage when a key is configured; without one the sector is `"Unknown"`.
pub struct YahooGateway {
    connector: yahoo::YahooConnector,
    rate_limiter: SharedRateLimiter,
    request_timeout: Duration,
    metadata: Option<AlphaVantageClient>,
}

impl YahooGateway {
    /// Create a gateway from engine configuration
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| AdvisorError::ConfigError(format!("{PROVIDER} connector: {e}")))?;

        let quota =
            Quota::per_minute(NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN));

        let metadata = config
            .alpha_vantage_api_key
            .as_ref()
            .map(|key| {
                AlphaVantageClient::new(key.clone(), ALPHA_VANTAGE_RATE_LIMIT, config.request_timeout)
            })
            .transpose()?;

        Ok(Self {
            connector,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            request_timeout: config.request_timeout,
            metadata,
        })
    }

    /// Run a provider call behind the rate limiter and the request timeout
    async fn call<T, F>(&self, symbol: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, yahoo::YahooError>>,
    {
        self.rate_limiter.until_ready().await;

        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_yahoo_error(symbol, &e)),
            Err(_) => Err(AdvisorError::unavailable(
                symbol,
                format!("{PROVIDER} request timed out after {:?}", self.request_timeout),
            )),
        }
    }

    /// Merge company metadata into `instrument`; metadata failures are logged, not fatal
    async fn enrich(&self, instrument: Instrument) -> Instrument {
        let Some(client) = &self.metadata else {
            return instrument;
        };

        match client.get_company_overview(&instrument.symbol).await {
            Ok(overview) => {
                let mut instrument = instrument;
                if let Some(sector) = overview.sector_label() {
                    instrument.sector = sector;
                }
                instrument.name = overview.name.clone().or(instrument.name);
                instrument.market_cap = overview.market_cap_value();
                instrument.pe_ratio = overview.pe_ratio_value();
                instrument
            }
            Err(e) => {
                warn!(symbol = %instrument.symbol, error = %e, "Company metadata unavailable");
                instrument
            }
        }
    }
}

#[async_trait]
impl MarketDataGateway for YahooGateway {
    async fn fetch_instrument(&self, symbol: &str) -> Result<Instrument> {
        let symbol = normalize_symbol(symbol)?;
        debug!(%symbol, "Fetching latest quote");

        let response = self
            .call(&symbol, self.connector.get_latest_quotes(&symbol, "1d"))
            .await?;
        let quote = response
            .last_quote()
            .map_err(|e| map_yahoo_error(&symbol, &e))?;

        if !(quote.close.is_finite() && quote.close >= 0.0) {
            return Err(AdvisorError::unavailable(&symbol, "provider returned an invalid price"));
        }

        let mut instrument = Instrument::new(symbol.clone(), quote.close).with_open(quote.open);
        if let Some(as_of) = to_datetime(quote.timestamp) {
            instrument = instrument.with_as_of(as_of);
        }

        Ok(self.enrich(instrument).await)
    }

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<PriceHistory> {
        let symbol = normalize_symbol(symbol)?;
        let end = Utc::now();
        let start = end - chrono::Duration::days(i64::from(range.as_days()));
        debug!(%symbol, days = range.as_days(), "Fetching price history");

        // Convert chrono DateTime to time OffsetDateTime
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| AdvisorError::InvalidInput(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| AdvisorError::InvalidInput(format!("Invalid end timestamp: {e}")))?;

        let response = self
            .call(
                &symbol,
                self.connector.get_quote_history(&symbol, start_odt, end_odt),
            )
            .await?;
        let quotes = response.quotes().map_err(|e| map_yahoo_error(&symbol, &e))?;

        let points: Vec<PricePoint> = quotes
            .iter()
            .filter(|q| q.close.is_finite())
            .filter_map(|q| {
                to_datetime(q.timestamp).map(|timestamp| PricePoint {
                    timestamp,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                })
            })
            .collect();

        if points.is_empty() {
            return Err(AdvisorError::unavailable(&symbol, "No historical data available"));
        }

        Ok(PriceHistory::from_unordered(symbol, points))
    }
}

fn to_datetime<T>(timestamp: T) -> Option<DateTime<Utc>>
where
    i64: TryFrom<T>,
{
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Throttling is reported as text; everything else means the data is unavailable
fn map_yahoo_error(symbol: &str, err: &yahoo::YahooError) -> AdvisorError {
    classify_provider_message(symbol, &err.to_string())
}

fn classify_provider_message(symbol: &str, message: &str) -> AdvisorError {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit")
    {
        AdvisorError::RateLimited {
            provider: PROVIDER.to_string(),
        }
    } else {
        AdvisorError::unavailable(symbol, format!("{PROVIDER}: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_provider_message() {
        assert!(matches!(
            classify_provider_message("AAPL", "fetching the data from yahoo! finance failed: 429 Too Many Requests"),
            AdvisorError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_provider_message("NOPE", "No data found, symbol may be delisted"),
            AdvisorError::DataUnavailable { symbol, .. } if symbol == "NOPE"
        ));
    }

    #[test]
    fn test_to_datetime() {
        assert_eq!(to_datetime(0_i64).map(|d| d.timestamp()), Some(0));
        assert_eq!(to_datetime(1_700_000_000_u64).map(|d| d.timestamp()), Some(1_700_000_000));
        assert!(to_datetime(u64::MAX).is_none());
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_instrument() {
        let gateway = YahooGateway::new(&EngineConfig::default()).unwrap();
        let instrument = gateway.fetch_instrument("aapl").await.unwrap();
        assert_eq!(instrument.symbol, "AAPL");
        assert!(instrument.price > 0.0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_history() {
        let gateway = YahooGateway::new(&EngineConfig::default()).unwrap();
        let history = gateway
            .fetch_history("AAPL", HistoryRange::days(30).unwrap())
            .await
            .unwrap();
        assert!(!history.is_empty());
        assert_eq!(history.symbol(), "AAPL");
    }

    #[tokio::test]
    async fn test_empty_symbol_rejected() {
        let gateway = YahooGateway::new(&EngineConfig::default()).unwrap();
        let err = gateway.fetch_instrument("  ").await.unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidInput(_)));
    }
}
