//! Pure analytics over typed market data

pub mod market;
pub mod portfolio;
pub mod technical;

pub use market::{MarketOverview, SymbolError, VolatilityRegime, default_indices};
pub use portfolio::{PortfolioAnalyzer, PortfolioReport, PositionContribution};
pub use technical::{
    BollingerBandValues, MacdCrossover, Momentum, TechnicalAnalyzer, TechnicalSignal, Trend,
    VolumeTrend,
};
