//! Market overview over a list of index symbols

use crate::model::Instrument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CBOE volatility index
pub const VIX_SYMBOL: &str = "^VIX";

/// S&P 500, Dow Jones, Nasdaq Composite, VIX and the 10-year Treasury yield
pub fn default_indices() -> Vec<String> {
    ["^GSPC", "^DJI", "^IXIC", VIX_SYMBOL, "^TNX"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

impl VolatilityRegime {
    /// VIX below 15 is low, below 25 normal, anything above high
    pub fn from_vix(level: f64) -> Self {
        if level < 15.0 {
            Self::Low
        } else if level < 25.0 {
            Self::Normal
        } else {
            Self::High
        }
    }
}

/// A symbol that could not be fetched, with the error text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolError {
    pub symbol: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub instruments: Vec<Instrument>,
    pub errors: Vec<SymbolError>,
    /// Present only when the VIX was requested and fetched
    pub volatility_regime: Option<VolatilityRegime>,
    pub as_of: DateTime<Utc>,
}

impl MarketOverview {
    /// Assemble an overview from per-symbol outcomes, keeping their order
    pub fn from_results<E: std::fmt::Display>(
        results: impl IntoIterator<Item = (String, Result<Instrument, E>)>,
    ) -> Self {
        let mut instruments = Vec::new();
        let mut errors = Vec::new();
        for (symbol, result) in results {
            match result {
                Ok(instrument) => instruments.push(instrument),
                Err(e) => errors.push(SymbolError {
                    symbol,
                    error: e.to_string(),
                }),
            }
        }

        let volatility_regime = instruments
            .iter()
            .find(|i| i.symbol == VIX_SYMBOL)
            .map(|vix| VolatilityRegime::from_vix(vix.price));

        Self {
            instruments,
            errors,
            volatility_regime,
            as_of: Utc::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}
