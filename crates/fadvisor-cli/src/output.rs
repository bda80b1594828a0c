//! Table and JSON rendering of engine results

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Table};
use fadvisor_engine::{MarketOverview, MonitorSnapshot, PortfolioReport, StockAnalysis};
use serde::Serialize;

fn json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

pub fn stock(analysis: &StockAnalysis, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(analysis);
    }

    let instrument = &analysis.instrument;
    let signal = &analysis.technical_signal;
    let mut t = table(&["Metric", "Value"]);
    t.add_row(vec![Cell::new("Symbol"), Cell::new(&instrument.symbol)]);
    if let Some(name) = &instrument.name {
        t.add_row(vec![Cell::new("Name"), Cell::new(name)]);
    }
    t.add_row(vec![Cell::new("Sector"), Cell::new(&instrument.sector)]);
    t.add_row(vec!["Price".to_string(), format!("{:.2}", instrument.price)]);
    t.add_row(vec!["Change %".to_string(), optional(instrument.change_pct())]);
    t.add_row(vec!["Market cap".to_string(), optional(instrument.market_cap)]);
    t.add_row(vec!["P/E".to_string(), optional(instrument.pe_ratio)]);
    t.add_row(vec!["Trend".to_string(), format!("{:?}", signal.trend)]);
    t.add_row(vec!["RSI".to_string(), format!("{:.1}", signal.rsi)]);
    t.add_row(vec![
        "MACD".to_string(),
        format!(
            "{:.3} (signal {:.3}, crossover {:?})",
            signal.macd, signal.macd_signal, signal.macd_crossover
        ),
    ]);
    t.add_row(vec![
        "Support / resistance".to_string(),
        format!("{:.2} / {:.2}", signal.support, signal.resistance),
    ]);
    t.add_row(vec![
        "Bollinger".to_string(),
        format!(
            "{:.2} / {:.2} / {:.2}",
            signal.bollinger.lower, signal.bollinger.middle, signal.bollinger.upper
        ),
    ]);
    t.add_row(vec!["ATR".to_string(), format!("{:.2}", signal.atr)]);
    t.add_row(vec!["Volatility %".to_string(), format!("{:.1}", signal.volatility_pct)]);
    t.add_row(vec![
        "Window change %".to_string(),
        format!("{:.2} over {} points", signal.price_change_pct, signal.points),
    ]);
    t.add_row(vec!["Volume trend".to_string(), format!("{:?}", signal.volume_trend)]);
    t.add_row(vec!["Momentum".to_string(), format!("{:?}", signal.momentum)]);
    println!("{t}");
    Ok(())
}

pub fn portfolio(report: &PortfolioReport, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(report);
    }

    let mut positions = table(&[
        "Symbol", "Sector", "Qty", "Cost basis", "Price", "Value", "Gain", "Return %", "Weight %",
    ]);
    for p in &report.positions {
        positions.add_row(vec![
            p.symbol.clone(),
            p.sector.clone(),
            format!("{}", p.quantity),
            format!("{:.2}", p.cost_basis),
            format!("{:.2}", p.current_price),
            format!("{:.2}", p.value),
            format!("{:.2}", p.gain),
            format!("{:.2}", p.return_pct),
            format!("{:.1}", p.weight_pct),
        ]);
    }
    println!("{positions}");

    let mut sectors = table(&["Sector", "Allocation %"]);
    for (sector, pct) in &report.sector_allocation {
        sectors.add_row(vec![sector.clone(), format!("{pct:.1}")]);
    }
    println!("{sectors}");

    println!(
        "Total value {:.2}  cost {:.2}  return {:.2} ({:.2}%)",
        report.total_value, report.total_cost, report.total_return, report.total_return_pct
    );
    if report.concentrated {
        println!(
            "Concentration risk: {} above {:.0}% of the portfolio",
            report.concentrated_sectors.join(", "),
            report.concentration_threshold_pct
        );
    }
    Ok(())
}

pub fn market(overview: &MarketOverview, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(overview);
    }

    let mut t = table(&["Symbol", "Price", "Change %"]);
    for instrument in &overview.instruments {
        t.add_row(vec![
            instrument.symbol.clone(),
            format!("{:.2}", instrument.price),
            optional(instrument.change_pct()),
        ]);
    }
    println!("{t}");

    if let Some(regime) = overview.volatility_regime {
        println!("Volatility regime: {regime:?}");
    }
    for error in &overview.errors {
        println!("Unavailable {}: {}", error.symbol, error.error);
    }
    Ok(())
}

pub fn monitor(snapshot: &MonitorSnapshot, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        return json(snapshot);
    }

    println!(
        "Monitor {} {} after {} polls of {}",
        snapshot.id,
        snapshot.state,
        snapshot.ticks,
        snapshot.watchlist.join(", ")
    );
    if let Some(error) = &snapshot.last_error {
        println!("Last error: {error}");
    }

    let mut t = table(&["Time", "Symbol", "Alert", "Observed"]);
    for alert in &snapshot.alerts {
        t.add_row(vec![
            alert.triggered_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            alert.symbol.clone(),
            alert.description.clone(),
            format!("{:.2}", alert.observed),
        ]);
    }
    println!("{t}");
    if snapshot.evicted_alerts > 0 {
        println!("{} older alerts were dropped", snapshot.evicted_alerts);
    }
    Ok(())
}
