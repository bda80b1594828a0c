//! Technical indicators computed from a price history

use crate::config::EngineConfig;
use crate::error::{AdvisorError, Result};
use crate::model::{PriceHistory, PricePoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ta::indicators::{AverageTrueRange, BollingerBands, ExponentialMovingAverage};
use ta::{Close, High, Low, Next};

/// Trading days per year, used to annualise volatility
const TRADING_DAYS: f64 = 252.0;

const EMA_PERIOD: usize = 20;
const MACD_SIGNAL_PERIOD: usize = 9;
const BOLLINGER_PERIOD: usize = 20;
const BOLLINGER_STD_DEV: f64 = 2.0;
const ATR_PERIOD: usize = 14;

/// Volume windows: the last 5 bars against the 15 before them
const VOLUME_RECENT: usize = 5;
const VOLUME_BASELINE: usize = 15;
/// Relative change in mean volume below which volume is flat
const VOLUME_FLAT_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Uptrend,
    Downtrend,
    Sideways,
}

/// Sign change of the MACD line between the last two periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdCrossover {
    Bullish,
    Bearish,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Momentum {
    Overbought,
    Oversold,
    Bullish,
    Bearish,
    Neutral,
}

impl Momentum {
    /// Classify from RSI and the MACD line value
    pub fn classify(rsi: f64, macd: f64) -> Self {
        if rsi > 70.0 && macd > 0.0 {
            Self::Overbought
        } else if rsi < 30.0 && macd < 0.0 {
            Self::Oversold
        } else if rsi > 60.0 && macd > 0.0 {
            Self::Bullish
        } else if rsi < 40.0 && macd < 0.0 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBandValues {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Indicators derived from one price history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSignal {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    pub points: usize,
    pub last_close: f64,
    pub trend: Trend,
    pub rsi: f64,
    pub macd_crossover: MacdCrossover,
    pub macd: f64,
    pub macd_signal: f64,
    pub support: f64,
    pub resistance: f64,
    pub sma_short: f64,
    pub sma_long: f64,
    pub ema_20: f64,
    pub bollinger: BollingerBandValues,
    pub atr: f64,
    /// Annualised volatility of daily returns, in percent
    pub volatility_pct: f64,
    /// Change from first to last close, in percent
    pub price_change_pct: f64,
    pub volume_trend: VolumeTrend,
    pub momentum: Momentum,
}

/// Stateless calculator; every call is a pure function of its input
#[derive(Debug, Clone)]
pub struct TechnicalAnalyzer {
    min_points: usize,
    rsi_period: usize,
    short_window: usize,
    long_window: usize,
    noise_threshold: f64,
    macd_fast: usize,
    macd_slow: usize,
    sr_window: usize,
}

impl Default for TechnicalAnalyzer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl TechnicalAnalyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            min_points: config.min_history_points,
            rsi_period: config.rsi_period,
            short_window: config.trend_short_window,
            long_window: config.trend_long_window,
            noise_threshold: config.trend_noise_threshold,
            macd_fast: config.macd_fast_period,
            macd_slow: config.macd_slow_period,
            sr_window: config.support_resistance_window,
        }
    }

    /// Smallest history accepted by [`analyze`](Self::analyze)
    pub fn min_points(&self) -> usize {
        self.min_points
    }

    pub fn analyze(&self, history: &PriceHistory) -> Result<TechnicalSignal> {
        let required = self.min_points.max(self.rsi_period + 1);
        if history.len() < required {
            return Err(AdvisorError::InsufficientData {
                symbol: history.symbol().to_string(),
                required,
                actual: history.len(),
            });
        }

        let points = history.points();
        let closes = history.closes();
        let Some(last) = history.last() else {
            return Err(AdvisorError::unavailable(history.symbol(), "empty price history"));
        };

        let sma_short = trailing_mean(&closes, self.short_window);
        let sma_long = trailing_mean(&closes, self.long_window);
        let trend = classify_trend(sma_short, sma_long, self.noise_threshold);

        let rsi = rsi(&closes, self.rsi_period);

        let macd_line = self.macd_line(&closes)?;
        let macd = macd_line.last().copied().unwrap_or_default();
        let macd_signal = ema_series(&macd_line, MACD_SIGNAL_PERIOD)?
            .last()
            .copied()
            .unwrap_or_default();
        let macd_crossover = match macd_line.as_slice() {
            [.., prev, curr] if *prev <= 0.0 && *curr > 0.0 => MacdCrossover::Bullish,
            [.., prev, curr] if *prev >= 0.0 && *curr < 0.0 => MacdCrossover::Bearish,
            _ => MacdCrossover::None,
        };

        let window = &closes[closes.len().saturating_sub(self.sr_window)..];
        let support = window.iter().copied().fold(f64::INFINITY, f64::min);
        let resistance = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let ema_20 = ema_series(&closes, EMA_PERIOD)?
            .last()
            .copied()
            .unwrap_or_default();

        let mut bb = BollingerBands::new(BOLLINGER_PERIOD, BOLLINGER_STD_DEV)
            .map_err(|e| AdvisorError::ConfigError(format!("Bollinger bands: {e}")))?;
        let mut bollinger = BollingerBandValues {
            upper: last.close,
            middle: last.close,
            lower: last.close,
        };
        for &close in &closes {
            let out = bb.next(close);
            bollinger = BollingerBandValues {
                upper: out.upper,
                middle: out.average,
                lower: out.lower,
            };
        }

        let mut atr_indicator = AverageTrueRange::new(ATR_PERIOD)
            .map_err(|e| AdvisorError::ConfigError(format!("ATR: {e}")))?;
        let mut atr = 0.0;
        for point in points {
            atr = atr_indicator.next(point);
        }

        let first_close = closes[0];
        let price_change_pct = if first_close == 0.0 {
            0.0
        } else {
            (last.close - first_close) / first_close * 100.0
        };

        Ok(TechnicalSignal {
            symbol: history.symbol().to_string(),
            as_of: last.timestamp,
            points: history.len(),
            last_close: last.close,
            trend,
            rsi,
            macd_crossover,
            macd,
            macd_signal,
            support,
            resistance,
            sma_short,
            sma_long,
            ema_20,
            bollinger,
            atr,
            volatility_pct: annualised_volatility(&closes),
            price_change_pct,
            volume_trend: volume_trend(points),
            momentum: Momentum::classify(rsi, macd),
        })
    }

    /// RSI over the trailing window only, for callers holding raw closes
    pub fn rsi(&self, closes: &[f64]) -> Option<f64> {
        (closes.len() > self.rsi_period).then(|| rsi(closes, self.rsi_period))
    }

    /// Fast EMA minus slow EMA for every close
    fn macd_line(&self, closes: &[f64]) -> Result<Vec<f64>> {
        let fast = ema_series(closes, self.macd_fast)?;
        let slow = ema_series(closes, self.macd_slow)?;
        Ok(fast.iter().zip(&slow).map(|(f, s)| f - s).collect())
    }
}

impl High for PricePoint {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for PricePoint {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for PricePoint {
    fn close(&self) -> f64 {
        self.close
    }
}

fn ema_series(values: &[f64], period: usize) -> Result<Vec<f64>> {
    let mut ema = ExponentialMovingAverage::new(period)
        .map_err(|e| AdvisorError::ConfigError(format!("EMA({period}): {e}")))?;
    Ok(values.iter().map(|&v| ema.next(v)).collect())
}

/// Mean of the trailing `min(window, len)` values
fn trailing_mean(values: &[f64], window: usize) -> f64 {
    let tail = &values[values.len().saturating_sub(window.max(1))..];
    if tail.is_empty() {
        return 0.0;
    }
    tail.iter().sum::<f64>() / tail.len() as f64
}

fn classify_trend(short: f64, long: f64, threshold: f64) -> Trend {
    let band = long.abs() * threshold;
    if short - long > band {
        Trend::Uptrend
    } else if long - short > band {
        Trend::Downtrend
    } else {
        Trend::Sideways
    }
}

/// Simple-average RSI over the last `period` changes.
///
/// A window without losses reads 100.
fn rsi(closes: &[f64], period: usize) -> f64 {
    let start = closes.len().saturating_sub(period + 1);
    let (gains, losses) = closes[start..]
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), change| {
            if change > 0.0 {
                (g + change, l)
            } else {
                (g, l - change)
            }
        });

    let period = period.max(1) as f64;
    let avg_gain = gains / period;
    let avg_loss = losses / period;
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// Sample standard deviation of daily returns, annualised, in percent
fn annualised_volatility(closes: &[f64]) -> f64 {
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() * TRADING_DAYS.sqrt() * 100.0
}

fn volume_trend(points: &[PricePoint]) -> VolumeTrend {
    if points.len() <= VOLUME_RECENT {
        return VolumeTrend::Flat;
    }
    let split = points.len() - VOLUME_RECENT;
    let baseline = &points[split.saturating_sub(VOLUME_BASELINE)..split];
    let recent = &points[split..];

    let mean = |bars: &[PricePoint]| bars.iter().map(|p| p.volume as f64).sum::<f64>() / bars.len() as f64;
    let (recent, baseline) = (mean(recent), mean(baseline));

    if baseline == 0.0 {
        return if recent > 0.0 { VolumeTrend::Increasing } else { VolumeTrend::Flat };
    }
    let change = (recent - baseline) / baseline;
    if change > VOLUME_FLAT_TOLERANCE {
        VolumeTrend::Increasing
    } else if change < -VOLUME_FLAT_TOLERANCE {
        VolumeTrend::Decreasing
    } else {
        VolumeTrend::Flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn history(closes: &[f64]) -> PriceHistory {
        history_with_volume(closes, |_| 1_000)
    }

    fn history_with_volume(closes: &[f64], volume: impl Fn(usize) -> u64) -> PriceHistory {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::flat(start + Duration::days(i as i64), c, volume(i)))
            .collect();
        PriceHistory::new("XYZ", points).unwrap()
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_minimum_history_length() {
        let analyzer = TechnicalAnalyzer::default();
        let required = analyzer.min_points();

        assert!(analyzer.analyze(&history(&rising(required))).is_ok());

        let err = analyzer.analyze(&history(&rising(required - 1))).unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::InsufficientData { required: r, actual: a, .. } if r == required && a == required - 1
        ));
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let signal = TechnicalAnalyzer::default().analyze(&history(&rising(20))).unwrap();
        assert_eq!(signal.rsi, 100.0);
    }

    #[test]
    fn test_rsi_all_losses_is_0() {
        let closes: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
        let signal = TechnicalAnalyzer::default().analyze(&history(&closes)).unwrap();
        assert_eq!(signal.rsi, 0.0);
    }

    #[test]
    fn test_rsi_in_range() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0)
            .collect();
        let signal = TechnicalAnalyzer::default().analyze(&history(&closes)).unwrap();
        assert!((0.0..=100.0).contains(&signal.rsi));
    }

    #[test]
    fn test_rsi_balanced_changes() {
        // Seven gains of 1 and seven losses of 1 over the window
        let mut closes = vec![100.0];
        for i in 0..14 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last + 1.0 } else { last - 1.0 });
        }
        let signal = TechnicalAnalyzer::default().analyze(&history(&closes)).unwrap();
        assert!((signal.rsi - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_detection() {
        let analyzer = TechnicalAnalyzer::default();

        let up = analyzer.analyze(&history(&rising(40))).unwrap();
        assert_eq!(up.trend, Trend::Uptrend);
        assert!(up.sma_short > up.sma_long);

        let falling: Vec<f64> = (0..40).map(|i| 200.0 - i as f64).collect();
        assert_eq!(analyzer.analyze(&history(&falling)).unwrap().trend, Trend::Downtrend);

        let flat = vec![100.0; 40];
        assert_eq!(analyzer.analyze(&history(&flat)).unwrap().trend, Trend::Sideways);
    }

    #[test]
    fn test_trend_within_noise_is_sideways() {
        // Short average sits 0.1% above the long one
        let mut closes = vec![100.0; 30];
        for close in closes.iter_mut().skip(20) {
            *close = 100.15;
        }
        let signal = TechnicalAnalyzer::default().analyze(&history(&closes)).unwrap();
        assert_eq!(signal.trend, Trend::Sideways);
    }

    #[test]
    fn test_macd_bullish_crossover() {
        let mut closes: Vec<f64> = (0..30).map(|i| 130.0 - i as f64).collect();
        closes.push(300.0);
        let signal = TechnicalAnalyzer::default().analyze(&history(&closes)).unwrap();
        assert_eq!(signal.macd_crossover, MacdCrossover::Bullish);
        assert!(signal.macd > 0.0);
    }

    #[test]
    fn test_macd_bearish_crossover() {
        let mut closes = rising(30);
        closes.push(1.0);
        let signal = TechnicalAnalyzer::default().analyze(&history(&closes)).unwrap();
        assert_eq!(signal.macd_crossover, MacdCrossover::Bearish);
        assert!(signal.macd < 0.0);
    }

    #[test]
    fn test_macd_no_crossover() {
        let signal = TechnicalAnalyzer::default().analyze(&history(&rising(15))).unwrap();
        assert_eq!(signal.macd_crossover, MacdCrossover::None);

        let flat = TechnicalAnalyzer::default().analyze(&history(&[100.0; 20])).unwrap();
        assert_eq!(flat.macd_crossover, MacdCrossover::None);
        assert_eq!(flat.macd, 0.0);
    }

    #[test]
    fn test_support_resistance_use_trailing_window() {
        // The 1.0 and 500.0 closes fall outside the last 20 points
        let mut closes = vec![1.0, 500.0];
        closes.extend(rising(20));
        let signal = TechnicalAnalyzer::default().analyze(&history(&closes)).unwrap();
        assert_eq!(signal.support, 100.0);
        assert_eq!(signal.resistance, 119.0);
        assert_eq!(signal.last_close, 119.0);
    }

    #[test]
    fn test_supplementary_indicators() {
        let closes = rising(30);
        let signal = TechnicalAnalyzer::default().analyze(&history(&closes)).unwrap();

        assert!((signal.price_change_pct - 29.0).abs() < 1e-9);
        assert!(signal.volatility_pct > 0.0);
        assert!(signal.bollinger.upper >= signal.bollinger.middle);
        assert!(signal.bollinger.middle >= signal.bollinger.lower);
        assert!(signal.atr > 0.0);
        assert_eq!(signal.points, 30);
        assert_eq!(signal.momentum, Momentum::Overbought);
        assert_eq!(signal.volume_trend, VolumeTrend::Flat);
    }

    #[test]
    fn test_volume_trend() {
        let closes = rising(20);
        let analyzer = TechnicalAnalyzer::default();

        let increasing = history_with_volume(&closes, |i| if i >= 15 { 2_000 } else { 1_000 });
        assert_eq!(
            analyzer.analyze(&increasing).unwrap().volume_trend,
            VolumeTrend::Increasing
        );

        let decreasing = history_with_volume(&closes, |i| if i >= 15 { 500 } else { 1_000 });
        assert_eq!(
            analyzer.analyze(&decreasing).unwrap().volume_trend,
            VolumeTrend::Decreasing
        );
    }

    #[test]
    fn test_momentum_classification() {
        assert_eq!(Momentum::classify(75.0, 1.0), Momentum::Overbought);
        assert_eq!(Momentum::classify(25.0, -1.0), Momentum::Oversold);
        assert_eq!(Momentum::classify(65.0, 1.0), Momentum::Bullish);
        assert_eq!(Momentum::classify(35.0, -1.0), Momentum::Bearish);
        assert_eq!(Momentum::classify(75.0, -1.0), Momentum::Neutral);
        assert_eq!(Momentum::classify(50.0, 0.0), Momentum::Neutral);
    }

    #[test]
    fn test_analyze_is_pure() {
        let h = history(&rising(25));
        let analyzer = TechnicalAnalyzer::default();
        assert_eq!(analyzer.analyze(&h).unwrap(), analyzer.analyze(&h).unwrap());
    }

    #[test]
    fn test_rsi_helper_requires_window() {
        let analyzer = TechnicalAnalyzer::default();
        assert_eq!(analyzer.rsi(&rising(14)), None);
        assert_eq!(analyzer.rsi(&rising(15)), Some(100.0));
    }
}
