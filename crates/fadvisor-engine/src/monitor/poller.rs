//! Polling loop executed by each running monitor task

use super::manager::TaskEntry;
use super::task::{Alert, AlertCondition, TaskState};
use crate::analysis::TechnicalAnalyzer;
use crate::error::{AdvisorError, Result};
use crate::gateway::SharedGateway;
use crate::model::HistoryRange;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// Everything the loop needs besides its task entry
#[derive(Clone)]
pub(crate) struct PollContext {
    pub(crate) gateway: SharedGateway,
    pub(crate) analyzer: TechnicalAnalyzer,
    pub(crate) history_range: HistoryRange,
    pub(crate) max_consecutive_failures: u32,
}

/// One symbol's reading for a tick
#[derive(Debug, Clone, Copy)]
struct Observation {
    price: f64,
    rsi: Option<f64>,
}

/// Per-symbol evaluation state carried between ticks
#[derive(Debug, Default)]
struct SymbolTracker {
    previous_price: Option<f64>,
    /// Whether each level condition was true on its last evaluation
    active: Vec<bool>,
}

/// Run until cancelled or until the task fails
pub(crate) async fn run(entry: Arc<TaskEntry>, ctx: PollContext, mut cancel: watch::Receiver<bool>) {
    let mut trackers: Vec<SymbolTracker> = entry
        .symbols
        .iter()
        .map(|(_, conditions)| SymbolTracker {
            previous_price: None,
            active: vec![false; conditions.len()],
        })
        .collect();

    let mut ticker = interval(entry.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *cancel.borrow() {
            break;
        }

        tokio::select! {
            _ = cancel.changed() => break,
            _ = ticker.tick() => {}
        }

        let observations = tokio::select! {
            _ = cancel.changed() => break,
            observations = poll_symbols(&entry, &ctx) => observations,
        };

        let keep_running = record_tick(&entry, &ctx, &mut trackers, observations).await;
        if !keep_running {
            break;
        }
    }

    debug!(task = %entry.id, "Polling loop finished");
}

/// Fetch every watch-list symbol concurrently
async fn poll_symbols(entry: &TaskEntry, ctx: &PollContext) -> Vec<Result<Observation>> {
    let fetches = entry.symbols.iter().map(|(symbol, conditions)| {
        let wants_rsi = conditions.iter().any(AlertCondition::needs_history);
        observe(ctx, symbol, wants_rsi)
    });
    join_all(fetches).await
}

async fn observe(ctx: &PollContext, symbol: &str, wants_rsi: bool) -> Result<Observation> {
    let instrument = ctx.gateway.fetch_instrument(symbol).await?;

    let rsi = if wants_rsi {
        match ctx.gateway.fetch_history(symbol, ctx.history_range).await {
            Ok(history) => {
                let rsi = ctx.analyzer.rsi(&history.closes());
                if rsi.is_none() {
                    warn!(%symbol, points = history.len(), "Not enough history for RSI");
                }
                rsi
            }
            Err(e) => {
                warn!(%symbol, error = %e, "History unavailable, skipping RSI conditions");
                None
            }
        }
    } else {
        None
    };

    Ok(Observation {
        price: instrument.price,
        rsi,
    })
}

/// Evaluate the tick and record its outcome.
///
/// Returns `false` once the loop must end.
async fn record_tick(
    entry: &TaskEntry,
    ctx: &PollContext,
    trackers: &mut [SymbolTracker],
    observations: Vec<Result<Observation>>,
) -> bool {
    let now = Utc::now();
    let mut alerts = Vec::new();
    let mut failures = 0;
    let mut last_error: Option<AdvisorError> = None;

    for (((symbol, conditions), tracker), observation) in
        entry.symbols.iter().zip(trackers.iter_mut()).zip(observations)
    {
        let observation = match observation {
            Ok(observation) => observation,
            Err(e) => {
                warn!(task = %entry.id, %symbol, error = %e, "Symbol poll failed");
                failures += 1;
                last_error = Some(e);
                continue;
            }
        };

        for (index, condition) in conditions.iter().enumerate() {
            if let Some(observed) = evaluate(condition, observation, tracker, index) {
                alerts.push(Alert {
                    symbol: symbol.clone(),
                    condition: *condition,
                    description: condition.describe(symbol),
                    observed,
                    triggered_at: now,
                });
            }
        }
        tracker.previous_price = Some(observation.price);
    }

    let mut state = entry.state.lock().await;
    if state.state != TaskState::Running {
        return false;
    }

    state.ticks += 1;
    if let Some(e) = &last_error {
        state.last_error = Some(e.to_string());
    }

    if failures == entry.symbols.len() {
        state.consecutive_failures += 1;
        if state.consecutive_failures >= ctx.max_consecutive_failures {
            state.state = TaskState::Failed;
            state.stopped_at = Some(now);
            error!(
                task = %entry.id,
                failures = state.consecutive_failures,
                error = state.last_error.as_deref().unwrap_or_default(),
                "Monitor task failed"
            );
            return false;
        }
        return true;
    }
    state.consecutive_failures = 0;

    for alert in alerts {
        info!(task = %entry.id, symbol = %alert.symbol, observed = alert.observed, "{}", alert.description);
        state.alerts.push(alert);
    }
    debug!(task = %entry.id, tick = state.ticks, "Tick recorded");
    true
}

/// Observed value when `condition` should alert on this tick
fn evaluate(
    condition: &AlertCondition,
    observation: Observation,
    tracker: &mut SymbolTracker,
    index: usize,
) -> Option<f64> {
    let (holds, observed) = match *condition {
        AlertCondition::PriceAbove(limit) => (observation.price > limit, observation.price),
        AlertCondition::PriceBelow(limit) => (observation.price < limit, observation.price),
        AlertCondition::RsiAbove(limit) => {
            let rsi = observation.rsi?;
            (rsi > limit, rsi)
        }
        AlertCondition::RsiBelow(limit) => {
            let rsi = observation.rsi?;
            (rsi < limit, rsi)
        }
        AlertCondition::PercentChangeExceeds(limit) => {
            let previous = tracker.previous_price.filter(|p| *p != 0.0)?;
            let change = (observation.price - previous) / previous * 100.0;
            (change.abs() > limit, change)
        }
    };

    if !condition.is_level() {
        return holds.then_some(observed);
    }

    // Fire on the rising edge, re-arm once false
    let was_active = std::mem::replace(&mut tracker.active[index], holds);
    (holds && !was_active).then_some(observed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(conditions: usize) -> SymbolTracker {
        SymbolTracker {
            previous_price: None,
            active: vec![false; conditions],
        }
    }

    fn at(price: f64) -> Observation {
        Observation { price, rsi: None }
    }

    #[test]
    fn test_level_condition_is_edge_triggered() {
        let condition = AlertCondition::PriceAbove(100.0);
        let mut t = tracker(1);

        assert_eq!(evaluate(&condition, at(105.0), &mut t, 0), Some(105.0));
        assert_eq!(evaluate(&condition, at(106.0), &mut t, 0), None);
        assert_eq!(evaluate(&condition, at(99.0), &mut t, 0), None);
        assert_eq!(evaluate(&condition, at(101.0), &mut t, 0), Some(101.0));
    }

    #[test]
    fn test_percent_change_fires_every_tick() {
        let condition = AlertCondition::PercentChangeExceeds(5.0);
        let mut t = tracker(1);

        assert_eq!(evaluate(&condition, at(100.0), &mut t, 0), None);
        t.previous_price = Some(100.0);
        let change = evaluate(&condition, at(110.0), &mut t, 0).unwrap();
        assert!((change - 10.0).abs() < 1e-9);
        t.previous_price = Some(110.0);
        assert!(evaluate(&condition, at(99.0), &mut t, 0).unwrap() < 0.0);
        t.previous_price = Some(99.0);
        assert_eq!(evaluate(&condition, at(100.0), &mut t, 0), None);
    }

    #[test]
    fn test_rsi_condition_skipped_without_rsi() {
        let condition = AlertCondition::RsiAbove(70.0);
        let mut t = tracker(1);

        assert_eq!(evaluate(&condition, at(100.0), &mut t, 0), None);
        let reading = Observation {
            price: 100.0,
            rsi: Some(80.0),
        };
        assert_eq!(evaluate(&condition, reading, &mut t, 0), Some(80.0));
    }
}
