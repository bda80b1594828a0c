//! Facade over the gateway, the analytics and the monitor manager

use crate::analysis::{
    MarketOverview, PortfolioAnalyzer, PortfolioReport, TechnicalAnalyzer, TechnicalSignal,
    default_indices,
};
use crate::config::EngineConfig;
use crate::error::{AdvisorError, Result};
use crate::gateway::{CachedGateway, RetryPolicy, RetryingGateway, SharedGateway, YahooGateway};
use crate::model::{HistoryRange, Instrument, Position, normalize_symbol};
use crate::monitor::{MonitorManager, MonitorRequest, MonitorSnapshot, TaskId};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot plus technical indicators for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAnalysis {
    pub instrument: Instrument,
    pub technical_signal: TechnicalSignal,
    pub analyzed_at: DateTime<Utc>,
}

/// Entry point for front ends and tool adapters
pub struct AdvisorService {
    config: EngineConfig,
    gateway: SharedGateway,
    technical: TechnicalAnalyzer,
    portfolio: PortfolioAnalyzer,
    monitors: MonitorManager,
}

impl AdvisorService {
    /// One gateway for both the analytics and the monitor tasks
    pub fn new(config: EngineConfig, gateway: SharedGateway) -> Self {
        Self::with_gateways(config, gateway.clone(), gateway)
    }

    /// Separate gateways: `analysis` for one-shot operations, `monitor` for
    /// polling loops, which should see uncached prices
    pub fn with_gateways(config: EngineConfig, analysis: SharedGateway, monitor: SharedGateway) -> Self {
        Self {
            technical: TechnicalAnalyzer::new(&config),
            portfolio: PortfolioAnalyzer::new(config.concentration_threshold_pct),
            monitors: MonitorManager::new(&config, monitor),
            gateway: analysis,
            config,
        }
    }

    /// Yahoo behind retries; analysis calls additionally go through the cache
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let live = Arc::new(RetryingGateway::new(
            YahooGateway::new(&config)?,
            RetryPolicy::from_config(&config),
        ));
        let cached = CachedGateway::new(
            live.clone(),
            config.cache_ttl_realtime,
            config.cache_ttl_history,
        );
        info!(
            requests_per_minute = config.requests_per_minute,
            metadata = config.alpha_vantage_api_key.is_some(),
            "Advisor service initialized"
        );
        Ok(Self::with_gateways(config, Arc::new(cached), live))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current snapshot and technical signal for `symbol`
    pub async fn analyze_stock(&self, symbol: &str) -> Result<StockAnalysis> {
        let symbol = normalize_symbol(symbol)?;
        let range = HistoryRange::days(self.config.analysis_history_days)?;
        debug!(%symbol, days = range.as_days(), "Analyzing stock");

        let (instrument, history) = tokio::try_join!(
            self.gateway.fetch_instrument(&symbol),
            self.gateway.fetch_history(&symbol, range)
        )?;
        let technical_signal = self.technical.analyze(&history)?;

        Ok(StockAnalysis {
            instrument,
            technical_signal,
            analyzed_at: Utc::now(),
        })
    }

    /// Value `positions` at current prices.
    ///
    /// Instruments for the distinct symbols are fetched concurrently; a
    /// symbol that cannot be fetched yields `MissingPriceData`.
    pub async fn analyze_portfolio(&self, positions: &[Position]) -> Result<PortfolioReport> {
        if positions.is_empty() {
            return Err(AdvisorError::InvalidInput(
                "portfolio must contain at least one position".to_string(),
            ));
        }

        let mut symbols: Vec<&str> = Vec::new();
        for position in positions {
            if !symbols.contains(&position.symbol()) {
                symbols.push(position.symbol());
            }
        }

        let results = join_all(symbols.iter().map(|s| self.gateway.fetch_instrument(s))).await;

        let mut instruments = HashMap::with_capacity(symbols.len());
        for (symbol, result) in symbols.into_iter().zip(results) {
            match result {
                Ok(instrument) => {
                    instruments.insert(symbol.to_string(), instrument);
                }
                Err(e) => warn!(%symbol, error = %e, "No price for portfolio position"),
            }
        }

        self.portfolio.analyze(positions, &instruments)
    }

    /// Snapshot of `symbols`, or of [`default_indices`] when empty.
    ///
    /// Failed symbols are reported in the overview instead of failing the call.
    pub async fn market_overview(&self, symbols: &[String]) -> MarketOverview {
        let symbols = if symbols.is_empty() {
            default_indices()
        } else {
            symbols.to_vec()
        };

        let fetches = symbols.iter().map(|raw| async move {
            let result = match normalize_symbol(raw) {
                Ok(symbol) => self.gateway.fetch_instrument(&symbol).await,
                Err(e) => Err(e),
            };
            (raw.clone(), result)
        });
        let results = join_all(fetches).await;

        for (symbol, result) in &results {
            if let Err(e) = result {
                warn!(%symbol, error = %e, "Market overview symbol unavailable");
            }
        }
        MarketOverview::from_results(results)
    }

    pub async fn start_monitor(&self, request: MonitorRequest) -> Result<TaskId> {
        self.monitors.start(request).await
    }

    pub async fn stop_monitor(&self, id: &TaskId) -> Result<bool> {
        self.monitors.stop(id).await
    }

    pub async fn get_monitor_status(&self, id: &TaskId) -> Result<MonitorSnapshot> {
        self.monitors.status(id).await
    }

    pub async fn list_monitors(&self) -> Vec<MonitorSnapshot> {
        self.monitors.list().await
    }

    pub async fn purge_monitor(&self, id: &TaskId) -> Result<MonitorSnapshot> {
        self.monitors.purge(id).await
    }

    /// Stop every running monitor task
    pub async fn shutdown(&self) -> usize {
        self.monitors.shutdown().await
    }
}
