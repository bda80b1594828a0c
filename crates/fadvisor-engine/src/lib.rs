//! Background monitoring and portfolio analytics engine
//!
//! This crate provides the analytical core behind fadvisor. It includes:
//!
//! - A market data gateway (Yahoo Finance quotes and histories, optional
//!   Alpha Vantage company metadata) with caching and retry decorators
//! - A technical analysis calculator (trend, RSI, MACD crossover,
//!   support/resistance, Bollinger bands, ATR, volatility)
//! - A portfolio analyzer (valuation, returns, sector allocation,
//!   concentration risk)
//! - A market overview over the major indices
//! - A monitor manager running background watch-list polls that record
//!   threshold alerts
//!
//! # Architecture
//!
//! [`AdvisorService`] is the facade front ends talk to. Everything it needs
//! from the outside world goes through the [`MarketDataGateway`] trait, so
//! tests substitute a mock. The [`tools`] module wraps each operation as a
//! JSON [`fadvisor_tools::Tool`] for an external dispatcher.
//!
//! # Example
//!
//! ```rust,no_run
//! use fadvisor_engine::{AdvisorService, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> fadvisor_engine::Result<()> {
//!     let service = AdvisorService::from_config(EngineConfig::from_env()?)?;
//!
//!     let analysis = service.analyze_stock("AAPL").await?;
//!     println!("{:?} RSI {:.1}", analysis.technical_signal.trend, analysis.technical_signal.rsi);
//!
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod monitor;
pub mod service;
pub mod tools;

// Re-export main types for convenience
pub use analysis::{
    MarketOverview, PortfolioAnalyzer, PortfolioReport, TechnicalAnalyzer, TechnicalSignal,
    default_indices,
};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{AdvisorError, Result};
pub use gateway::{MarketDataGateway, SharedGateway};
pub use model::{HistoryRange, Instrument, Position, PriceHistory, PricePoint};
pub use monitor::{Alert, AlertCondition, MonitorManager, MonitorRequest, MonitorSnapshot, TaskId, TaskState};
pub use service::{AdvisorService, StockAnalysis};
pub use tools::register_tools;
