//! Typed market data entities
//!
//! Provider payloads are converted into these types at the gateway boundary.
//! Constructors validate their invariants so the analytics never see
//! malformed input.

use crate::error::{AdvisorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sector label used when the provider has no classification
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Normalize a ticker symbol: trimmed, upper-cased, non-empty, no inner whitespace
pub fn normalize_symbol(raw: &str) -> Result<String> {
    let symbol = raw.trim();
    if symbol.is_empty() {
        return Err(AdvisorError::InvalidInput("symbol must not be empty".to_string()));
    }
    if symbol.chars().any(char::is_whitespace) {
        return Err(AdvisorError::InvalidInput(format!(
            "symbol must not contain whitespace: {symbol:?}"
        )));
    }
    Ok(symbol.to_uppercase())
}

/// Current market snapshot of a tradable asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: Option<String>,
    pub price: f64,
    /// Session open, when the provider reports it
    pub open: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub sector: String,
    pub as_of: DateTime<Utc>,
}

impl Instrument {
    /// Snapshot with only a price; metadata defaults to unknown
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            price,
            open: None,
            market_cap: None,
            pe_ratio: None,
            sector: UNKNOWN_SECTOR.to_string(),
            as_of: Utc::now(),
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = sector.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_open(mut self, open: f64) -> Self {
        self.open = Some(open);
        self
    }

    pub fn with_market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }

    pub fn with_pe_ratio(mut self, pe_ratio: f64) -> Self {
        self.pe_ratio = Some(pe_ratio);
        self
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = as_of;
        self
    }

    /// Percent change from the session open, if the open is known and non-zero
    pub fn change_pct(&self) -> Option<f64> {
        self.open
            .filter(|open| *open != 0.0)
            .map(|open| (self.price - open) / open * 100.0)
    }
}

/// One bar of a price series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PricePoint {
    /// A bar where open, high, low and close are all `close`
    pub fn flat(timestamp: DateTime<Utc>, close: f64, volume: u64) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }
}

/// Ordered price series for one symbol.
///
/// Timestamps are strictly increasing; there are no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PriceHistoryData")]
pub struct PriceHistory {
    symbol: String,
    points: Vec<PricePoint>,
}

#[derive(Deserialize)]
struct PriceHistoryData {
    symbol: String,
    points: Vec<PricePoint>,
}

impl TryFrom<PriceHistoryData> for PriceHistory {
    type Error = AdvisorError;

    fn try_from(data: PriceHistoryData) -> Result<Self> {
        Self::new(data.symbol, data.points)
    }
}

impl PriceHistory {
    /// Build a history, rejecting unordered or duplicated timestamps
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self> {
        let symbol = symbol.into();
        if let Some(pair) = points
            .windows(2)
            .find(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(AdvisorError::InvalidInput(format!(
                "price history for {symbol} is not strictly increasing at {}",
                pair[1].timestamp
            )));
        }
        Ok(Self { symbol, points })
    }

    /// Build a history from provider data in any order.
    ///
    /// Points are sorted by timestamp; for duplicated timestamps the last
    /// reported bar wins.
    pub fn from_unordered(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }
        Self {
            symbol: symbol.into(),
            points: deduped,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closing prices in time order
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

/// Look-back window for history requests, in calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct HistoryRange {
    days: u32,
}

impl HistoryRange {
    /// Longest range the provider serves
    pub const MAX_DAYS: u32 = 3650;

    pub fn days(days: u32) -> Result<Self> {
        if days == 0 || days > Self::MAX_DAYS {
            return Err(AdvisorError::InvalidInput(format!(
                "history range must be between 1 and {} days, got {days}",
                Self::MAX_DAYS
            )));
        }
        Ok(Self { days })
    }

    pub fn as_days(&self) -> u32 {
        self.days
    }
}

impl Default for HistoryRange {
    fn default() -> Self {
        Self { days: 90 }
    }
}

impl TryFrom<u32> for HistoryRange {
    type Error = AdvisorError;

    fn try_from(days: u32) -> Result<Self> {
        Self::days(days)
    }
}

impl From<HistoryRange> for u32 {
    fn from(range: HistoryRange) -> Self {
        range.days
    }
}

/// A holding supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PositionData")]
pub struct Position {
    symbol: String,
    quantity: f64,
    cost_basis: f64,
}

#[derive(Deserialize)]
struct PositionData {
    symbol: String,
    quantity: f64,
    #[serde(alias = "purchase_price")]
    cost_basis: f64,
}

impl TryFrom<PositionData> for Position {
    type Error = AdvisorError;

    fn try_from(data: PositionData) -> Result<Self> {
        Self::new(&data.symbol, data.quantity, data.cost_basis)
    }
}

impl Position {
    /// Quantity and per-unit cost basis must be finite and positive
    pub fn new(symbol: &str, quantity: f64, cost_basis: f64) -> Result<Self> {
        let symbol = normalize_symbol(symbol)?;
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(AdvisorError::InvalidInput(format!(
                "quantity for {symbol} must be positive, got {quantity}"
            )));
        }
        if !(cost_basis.is_finite() && cost_basis > 0.0) {
            return Err(AdvisorError::InvalidInput(format!(
                "cost basis for {symbol} must be positive, got {cost_basis}"
            )));
        }
        Ok(Self {
            symbol,
            quantity,
            cost_basis,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn cost_basis(&self) -> f64 {
        self.cost_basis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("^gspc").unwrap(), "^GSPC");
        assert!(normalize_symbol("   ").is_err());
        assert!(normalize_symbol("BR K").is_err());
    }

    #[test]
    fn test_history_rejects_unordered() {
        let points = vec![PricePoint::flat(ts(1), 10.0, 0), PricePoint::flat(ts(0), 11.0, 0)];
        assert!(PriceHistory::new("XYZ", points).is_err());

        let dupes = vec![PricePoint::flat(ts(0), 10.0, 0), PricePoint::flat(ts(0), 11.0, 0)];
        assert!(PriceHistory::new("XYZ", dupes).is_err());
    }

    #[test]
    fn test_history_from_unordered_sorts_and_dedups() {
        let points = vec![
            PricePoint::flat(ts(2), 12.0, 0),
            PricePoint::flat(ts(0), 10.0, 0),
            PricePoint::flat(ts(2), 13.0, 0),
            PricePoint::flat(ts(1), 11.0, 0),
        ];
        let history = PriceHistory::from_unordered("XYZ", points);
        assert_eq!(history.closes(), vec![10.0, 11.0, 13.0]);
    }

    #[test]
    fn test_history_deserialize_validates() {
        let json = serde_json::json!({
            "symbol": "XYZ",
            "points": [
                {"timestamp": ts(1), "open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 1},
                {"timestamp": ts(0), "open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 1}
            ]
        });
        assert!(serde_json::from_value::<PriceHistory>(json).is_err());
    }

    #[test]
    fn test_history_range_bounds() {
        assert!(HistoryRange::days(0).is_err());
        assert!(HistoryRange::days(HistoryRange::MAX_DAYS + 1).is_err());
        assert_eq!(HistoryRange::days(30).unwrap().as_days(), 30);
    }

    #[test]
    fn test_position_validation() {
        assert!(Position::new("AAPL", 10.0, 150.0).is_ok());
        assert!(Position::new("AAPL", 0.0, 150.0).is_err());
        assert!(Position::new("AAPL", 10.0, -1.0).is_err());
        assert!(Position::new("AAPL", f64::NAN, 1.0).is_err());
        assert!(Position::new("", 1.0, 1.0).is_err());
    }

    #[test]
    fn test_position_deserialize_accepts_purchase_price() {
        let position: Position = serde_json::from_value(serde_json::json!({
            "symbol": "msft",
            "quantity": 20,
            "purchase_price": 300.0
        }))
        .unwrap();
        assert_eq!(position.symbol(), "MSFT");
        assert_eq!(position.cost_basis(), 300.0);

        let bad = serde_json::from_value::<Position>(serde_json::json!({
            "symbol": "MSFT", "quantity": -1, "cost_basis": 300.0
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_instrument_change_pct() {
        let inst = Instrument::new("^GSPC", 110.0).with_open(100.0);
        assert!((inst.change_pct().unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(Instrument::new("X", 1.0).change_pct(), None);
    }
}
