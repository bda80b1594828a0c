//! Portfolio valuation, sector allocation and concentration risk

use crate::error::{AdvisorError, Result};
use crate::model::{Instrument, Position};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One position valued at the current price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionContribution {
    pub symbol: String,
    pub sector: String,
    pub quantity: f64,
    pub cost_basis: f64,
    pub current_price: f64,
    pub cost: f64,
    pub value: f64,
    pub gain: f64,
    pub return_pct: f64,
    /// Share of total portfolio value, in percent
    pub weight_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub total_value: f64,
    pub total_cost: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    /// Sector to percent of total value; sums to 100
    pub sector_allocation: BTreeMap<String, f64>,
    /// Contributions in the order the positions were given
    pub positions: Vec<PositionContribution>,
    pub concentrated: bool,
    pub concentrated_sectors: Vec<String>,
    pub concentration_threshold_pct: f64,
}

/// Stateless analyzer, parameterised by the concentration threshold
#[derive(Debug, Clone)]
pub struct PortfolioAnalyzer {
    concentration_threshold_pct: f64,
}

impl Default for PortfolioAnalyzer {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl PortfolioAnalyzer {
    pub fn new(concentration_threshold_pct: f64) -> Self {
        Self {
            concentration_threshold_pct,
        }
    }

    /// Value `positions` against `instruments`, keyed by upper-case symbol.
    ///
    /// Fails with `MissingPriceData` on the first position without an
    /// instrument.
    pub fn analyze(
        &self,
        positions: &[Position],
        instruments: &HashMap<String, Instrument>,
    ) -> Result<PortfolioReport> {
        if positions.is_empty() {
            return Err(AdvisorError::InvalidInput(
                "portfolio must contain at least one position".to_string(),
            ));
        }

        let mut contributions = Vec::with_capacity(positions.len());
        for position in positions {
            let instrument =
                instruments
                    .get(position.symbol())
                    .ok_or_else(|| AdvisorError::MissingPriceData {
                        symbol: position.symbol().to_string(),
                    })?;

            let cost = position.quantity() * position.cost_basis();
            let value = position.quantity() * instrument.price;
            contributions.push(PositionContribution {
                symbol: position.symbol().to_string(),
                sector: instrument.sector.clone(),
                quantity: position.quantity(),
                cost_basis: position.cost_basis(),
                current_price: instrument.price,
                cost,
                value,
                gain: value - cost,
                return_pct: (value - cost) / cost * 100.0,
                weight_pct: 0.0,
            });
        }

        let total_value: f64 = contributions.iter().map(|c| c.value).sum();
        let total_cost: f64 = contributions.iter().map(|c| c.cost).sum();

        let mut sector_values: BTreeMap<String, f64> = BTreeMap::new();
        for c in &contributions {
            *sector_values.entry(c.sector.clone()).or_default() += c.value;
        }

        let sector_allocation: BTreeMap<String, f64> = if total_value > 0.0 {
            for c in &mut contributions {
                c.weight_pct = c.value / total_value * 100.0;
            }
            sector_values
                .into_iter()
                .map(|(sector, value)| (sector, value / total_value * 100.0))
                .collect()
        } else {
            // Every price is zero; split evenly so the allocation still sums to 100
            let share = 100.0 / sector_values.len() as f64;
            let weight = 100.0 / contributions.len() as f64;
            for c in &mut contributions {
                c.weight_pct = weight;
            }
            sector_values.into_keys().map(|sector| (sector, share)).collect()
        };

        let concentrated_sectors: Vec<String> = sector_allocation
            .iter()
            .filter(|(_, pct)| **pct > self.concentration_threshold_pct)
            .map(|(sector, _)| sector.clone())
            .collect();

        Ok(PortfolioReport {
            total_value,
            total_cost,
            total_return: total_value - total_cost,
            total_return_pct: (total_value - total_cost) / total_cost * 100.0,
            sector_allocation,
            positions: contributions,
            concentrated: !concentrated_sectors.is_empty(),
            concentrated_sectors,
            concentration_threshold_pct: self.concentration_threshold_pct,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instruments(entries: &[(&str, f64, &str)]) -> HashMap<String, Instrument> {
        entries
            .iter()
            .map(|(symbol, price, sector)| {
                (
                    (*symbol).to_string(),
                    Instrument::new(*symbol, *price).with_sector(*sector),
                )
            })
            .collect()
    }

    fn sample() -> (Vec<Position>, HashMap<String, Instrument>) {
        let positions = vec![
            Position::new("AAPL", 10.0, 150.0).unwrap(),
            Position::new("MSFT", 20.0, 300.0).unwrap(),
        ];
        let prices = instruments(&[
            ("AAPL", 189.50, "Technology"),
            ("MSFT", 312.25, "Technology"),
        ]);
        (positions, prices)
    }

    #[test]
    fn test_two_position_portfolio() {
        let (positions, prices) = sample();
        let report = PortfolioAnalyzer::default().analyze(&positions, &prices).unwrap();

        assert!((report.total_cost - 7_500.0).abs() < 1e-9);
        assert!((report.total_value - 8_140.0).abs() < 1e-9);
        assert!((report.total_return - 640.0).abs() < 1e-9);
        assert!((report.total_return_pct - 8.533_333).abs() < 1e-4);

        assert_eq!(report.positions[0].symbol, "AAPL");
        assert!((report.positions[0].return_pct - 26.333_333).abs() < 1e-4);
        assert!((report.positions[1].value - 6_245.0).abs() < 1e-9);

        // Single sector holds everything
        assert!((report.sector_allocation["Technology"] - 100.0).abs() < 1e-9);
        assert!(report.concentrated);
        assert_eq!(report.concentrated_sectors, vec!["Technology".to_string()]);
    }

    #[test]
    fn test_allocation_sums_to_100() {
        let positions = vec![
            Position::new("AAPL", 3.0, 100.0).unwrap(),
            Position::new("XOM", 7.0, 90.0).unwrap(),
            Position::new("JNJ", 5.0, 150.0).unwrap(),
            Position::new("NEW", 5.0, 10.0).unwrap(),
        ];
        let prices = instruments(&[
            ("AAPL", 189.5, "Technology"),
            ("XOM", 104.3, "Energy"),
            ("JNJ", 157.1, "Healthcare"),
            ("NEW", 12.0, "Unknown"),
        ]);
        let report = PortfolioAnalyzer::default().analyze(&positions, &prices).unwrap();

        let total: f64 = report.sector_allocation.values().sum();
        assert!((total - 100.0).abs() < 0.01);
        let weights: f64 = report.positions.iter().map(|p| p.weight_pct).sum();
        assert!((weights - 100.0).abs() < 0.01);
        assert_eq!(report.sector_allocation.len(), 4);
        assert!(!report.concentrated);
    }

    #[test]
    fn test_missing_price_data_fails_fast() {
        let positions = vec![
            Position::new("AAPL", 1.0, 1.0).unwrap(),
            Position::new("GONE", 1.0, 1.0).unwrap(),
            Position::new("ALSO", 1.0, 1.0).unwrap(),
        ];
        let prices = instruments(&[("AAPL", 2.0, "Technology")]);

        let err = PortfolioAnalyzer::default()
            .analyze(&positions, &prices)
            .unwrap_err();
        assert!(matches!(err, AdvisorError::MissingPriceData { symbol } if symbol == "GONE"));
    }

    #[test]
    fn test_empty_portfolio_rejected() {
        let err = PortfolioAnalyzer::default()
            .analyze(&[], &HashMap::new())
            .unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidInput(_)));
    }

    #[test]
    fn test_concentration_threshold() {
        let positions = vec![
            Position::new("AAPL", 6.0, 100.0).unwrap(),
            Position::new("XOM", 4.0, 100.0).unwrap(),
        ];
        let prices = instruments(&[("AAPL", 100.0, "Technology"), ("XOM", 100.0, "Energy")]);

        let report = PortfolioAnalyzer::new(50.0).analyze(&positions, &prices).unwrap();
        assert!(report.concentrated);
        assert_eq!(report.concentrated_sectors, vec!["Technology".to_string()]);

        let relaxed = PortfolioAnalyzer::new(60.0).analyze(&positions, &prices).unwrap();
        assert!(!relaxed.concentrated);
        assert_eq!(relaxed.concentration_threshold_pct, 60.0);
    }

    #[test]
    fn test_zero_total_value_splits_evenly() {
        let positions = vec![
            Position::new("A", 1.0, 10.0).unwrap(),
            Position::new("B", 1.0, 10.0).unwrap(),
        ];
        let prices = instruments(&[("A", 0.0, "Energy"), ("B", 0.0, "Utilities")]);
        let report = PortfolioAnalyzer::default().analyze(&positions, &prices).unwrap();

        assert_eq!(report.sector_allocation["Energy"], 50.0);
        assert_eq!(report.sector_allocation["Utilities"], 50.0);
        assert!((report.total_return_pct + 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_symbols_reported_separately() {
        let positions = vec![
            Position::new("AAPL", 1.0, 100.0).unwrap(),
            Position::new("AAPL", 2.0, 200.0).unwrap(),
        ];
        let prices = instruments(&[("AAPL", 150.0, "Technology")]);
        let report = PortfolioAnalyzer::default().analyze(&positions, &prices).unwrap();

        assert_eq!(report.positions.len(), 2);
        assert!((report.total_value - 450.0).abs() < 1e-9);
        assert!((report.total_cost - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let (positions, prices) = sample();
        let analyzer = PortfolioAnalyzer::default();
        assert_eq!(
            analyzer.analyze(&positions, &prices).unwrap(),
            analyzer.analyze(&positions, &prices).unwrap()
        );
    }
}
