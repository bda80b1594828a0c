//! Monitor task types: identifiers, lifecycle, alert conditions and alerts

use crate::error::{AdvisorError, Result};
use crate::model::normalize_symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

const TASK_ID_PREFIX: &str = "monitor_";

/// Default price move, in percent, that raises an alert
pub const DEFAULT_PERCENT_CHANGE: f64 = 5.0;

/// Opaque monitor task identifier, rendered as `monitor_<uuid>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TASK_ID_PREFIX}{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = AdvisorError;

    /// Accepts the `monitor_` form or a bare UUID
    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let raw = raw.strip_prefix(TASK_ID_PREFIX).unwrap_or(raw);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| AdvisorError::InvalidInput(format!("invalid monitor task id: {s:?}")))
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for TaskId {
    type Error = AdvisorError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Lifecycle of a monitor task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Running,
    Stopped,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Predicate evaluated against each poll of a symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AlertCondition {
    PriceAbove(f64),
    PriceBelow(f64),
    /// Absolute change since the previous tick, in percent
    PercentChangeExceeds(f64),
    RsiAbove(f64),
    RsiBelow(f64),
}

impl AlertCondition {
    pub fn validate(&self) -> Result<()> {
        let (value, valid) = match *self {
            Self::PriceAbove(v) | Self::PriceBelow(v) | Self::PercentChangeExceeds(v) => {
                (v, v.is_finite() && v > 0.0)
            }
            Self::RsiAbove(v) | Self::RsiBelow(v) => (v, v.is_finite() && v > 0.0 && v < 100.0),
        };
        if valid {
            Ok(())
        } else {
            Err(AdvisorError::InvalidInput(format!(
                "invalid threshold {value} for {}",
                self.kind()
            )))
        }
    }

    /// RSI conditions need a price history on every tick
    pub fn needs_history(&self) -> bool {
        matches!(self, Self::RsiAbove(_) | Self::RsiBelow(_))
    }

    /// Level conditions alert once per crossing; percent change alerts every tick
    pub fn is_level(&self) -> bool {
        !matches!(self, Self::PercentChangeExceeds(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PriceAbove(_) => "price_above",
            Self::PriceBelow(_) => "price_below",
            Self::PercentChangeExceeds(_) => "percent_change_exceeds",
            Self::RsiAbove(_) => "rsi_above",
            Self::RsiBelow(_) => "rsi_below",
        }
    }

    pub fn describe(&self, symbol: &str) -> String {
        match self {
            Self::PriceAbove(v) => format!("{symbol} price above {v:.2}"),
            Self::PriceBelow(v) => format!("{symbol} price below {v:.2}"),
            Self::PercentChangeExceeds(v) => format!("{symbol} moved more than {v:.2}%"),
            Self::RsiAbove(v) => format!("{symbol} RSI above {v:.1}"),
            Self::RsiBelow(v) => format!("{symbol} RSI below {v:.1}"),
        }
    }
}

/// A triggered condition; immutable once recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub symbol: String,
    pub condition: AlertCondition,
    pub description: String,
    pub observed: f64,
    pub triggered_at: DateTime<Utc>,
}

/// Parameters for a new monitor task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorRequest {
    pub watchlist: Vec<String>,
    /// Conditions per symbol; symbols absent here use `default_conditions`
    #[serde(default)]
    pub thresholds: HashMap<String, Vec<AlertCondition>>,
    #[serde(default = "default_conditions")]
    pub default_conditions: Vec<AlertCondition>,
    pub interval: Duration,
}

fn default_conditions() -> Vec<AlertCondition> {
    vec![AlertCondition::PercentChangeExceeds(DEFAULT_PERCENT_CHANGE)]
}

impl MonitorRequest {
    pub fn new<S: Into<String>>(watchlist: impl IntoIterator<Item = S>, interval: Duration) -> Self {
        Self {
            watchlist: watchlist.into_iter().map(Into::into).collect(),
            thresholds: HashMap::new(),
            default_conditions: default_conditions(),
            interval,
        }
    }

    pub fn with_thresholds(
        mut self,
        symbol: impl Into<String>,
        conditions: impl IntoIterator<Item = AlertCondition>,
    ) -> Self {
        self.thresholds
            .entry(symbol.into())
            .or_default()
            .extend(conditions);
        self
    }

    pub fn with_default_conditions(
        mut self,
        conditions: impl IntoIterator<Item = AlertCondition>,
    ) -> Self {
        self.default_conditions = conditions.into_iter().collect();
        self
    }

    /// Normalize symbols and resolve the conditions that apply to each one
    pub(crate) fn resolve(&self, min_interval: Duration) -> Result<Vec<(String, Vec<AlertCondition>)>> {
        if self.watchlist.is_empty() {
            return Err(AdvisorError::InvalidInput(
                "watch-list must contain at least one symbol".to_string(),
            ));
        }
        if self.interval < min_interval {
            return Err(AdvisorError::InvalidInput(format!(
                "polling interval {:?} is below the minimum of {min_interval:?}",
                self.interval
            )));
        }

        let mut explicit: HashMap<String, Vec<AlertCondition>> = HashMap::new();
        for (symbol, conditions) in &self.thresholds {
            explicit
                .entry(normalize_symbol(symbol)?)
                .or_default()
                .extend(conditions.iter().copied());
        }

        let mut resolved: Vec<(String, Vec<AlertCondition>)> = Vec::new();
        for raw in &self.watchlist {
            let symbol = normalize_symbol(raw)?;
            if resolved.iter().any(|(s, _)| *s == symbol) {
                continue;
            }
            let conditions = explicit
                .remove(&symbol)
                .unwrap_or_else(|| self.default_conditions.clone());
            for condition in &conditions {
                condition.validate()?;
            }
            resolved.push((symbol, conditions));
        }

        if let Some(symbol) = explicit.keys().next() {
            return Err(AdvisorError::InvalidInput(format!(
                "thresholds given for {symbol}, which is not on the watch-list"
            )));
        }

        Ok(resolved)
    }
}

/// Bounded alert log; the oldest alerts are evicted first
#[derive(Debug, Clone)]
pub(crate) struct AlertLog {
    alerts: VecDeque<Alert>,
    capacity: usize,
    evicted: u64,
}

impl AlertLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            alerts: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            evicted: 0,
        }
    }

    pub(crate) fn push(&mut self, alert: Alert) {
        if self.alerts.len() == self.capacity {
            self.alerts.pop_front();
            self.evicted += 1;
        }
        self.alerts.push_back(alert);
    }

    pub(crate) fn evicted(&self) -> u64 {
        self.evicted
    }

    pub(crate) fn to_vec(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }
}

/// Point-in-time view of a monitor task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub id: TaskId,
    pub state: TaskState,
    pub watchlist: Vec<String>,
    pub interval: Duration,
    pub ticks: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub alerts: Vec<Alert>,
    pub evicted_alerts: u64,
    pub created_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}
