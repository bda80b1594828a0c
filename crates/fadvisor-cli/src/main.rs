//! Command-line interface for fadvisor

mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fadvisor_engine::{
    AdvisorService, AlertCondition, EngineConfig, MonitorRequest, Position, register_tools,
};
use fadvisor_tools::ToolRegistry;
use fadvisor_utils::{Config, init_tracing_with};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fadvisor")]
#[command(about = "Stock analysis, portfolio analytics and market monitoring", long_about = None)]
struct Args {
    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Technical analysis of one symbol
    Stock { symbol: String },

    /// Value a portfolio at current prices
    Portfolio {
        /// Position as SYMBOL:QUANTITY:COST_BASIS, repeatable
        #[arg(short, long = "position", value_parser = parse_position, required = true)]
        positions: Vec<Position>,
    },

    /// Snapshot of market indices (defaults to the major US indices)
    Market { symbols: Vec<String> },

    /// Watch symbols for a while and print the alerts raised
    Monitor {
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Seconds between polls
        #[arg(short, long, default_value_t = 30)]
        interval: u64,

        /// Seconds to keep monitoring before stopping
        #[arg(short, long, default_value_t = 120)]
        duration: u64,

        /// Alert when SYMBOL trades above PRICE (SYMBOL=PRICE), repeatable
        #[arg(long, value_parser = parse_level)]
        above: Vec<(String, f64)>,

        /// Alert when SYMBOL trades below PRICE (SYMBOL=PRICE), repeatable
        #[arg(long, value_parser = parse_level)]
        below: Vec<(String, f64)>,

        /// Percent move between polls that raises an alert
        #[arg(long, default_value_t = 5.0)]
        change: f64,
    },

    /// List the tool definitions exposed to an LLM dispatcher
    Tools,
}

fn parse_position(raw: &str) -> Result<Position, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [symbol, quantity, cost] = parts.as_slice() else {
        return Err(format!("expected SYMBOL:QUANTITY:COST_BASIS, got {raw:?}"));
    };
    let quantity: f64 = quantity
        .parse()
        .map_err(|_| format!("invalid quantity {quantity:?}"))?;
    let cost: f64 = cost.parse().map_err(|_| format!("invalid cost basis {cost:?}"))?;
    Position::new(symbol, quantity, cost).map_err(|e| e.to_string())
}

fn parse_level(raw: &str) -> Result<(String, f64), String> {
    let (symbol, price) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=PRICE, got {raw:?}"))?;
    let price: f64 = price.parse().map_err(|_| format!("invalid price {price:?}"))?;
    Ok((symbol.trim().to_uppercase(), price))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = Config::from_env()?;
    init_tracing_with(&app_config).context("failed to initialize logging")?;

    let args = Args::parse();
    info!(app = %app_config.app_name, environment = %app_config.environment, "Starting");

    let service = Arc::new(AdvisorService::from_config(EngineConfig::from_env()?)?);

    match args.command {
        Command::Stock { symbol } => {
            let analysis = service.analyze_stock(&symbol).await?;
            output::stock(&analysis, args.json)?;
        }
        Command::Portfolio { positions } => {
            let report = service.analyze_portfolio(&positions).await?;
            output::portfolio(&report, args.json)?;
        }
        Command::Market { symbols } => {
            let overview = service.market_overview(&symbols).await;
            output::market(&overview, args.json)?;
        }
        Command::Monitor {
            symbols,
            interval,
            duration,
            above,
            below,
            change,
        } => {
            let mut request = MonitorRequest::new(symbols, Duration::from_secs(interval))
                .with_default_conditions([AlertCondition::PercentChangeExceeds(change)]);
            for (symbol, price) in above {
                request = request.with_thresholds(symbol, [AlertCondition::PriceAbove(price)]);
            }
            for (symbol, price) in below {
                request = request.with_thresholds(symbol, [AlertCondition::PriceBelow(price)]);
            }
            // Symbols with explicit levels still report large moves
            let explicit: Vec<String> = request.thresholds.keys().cloned().collect();
            for symbol in explicit {
                request = request
                    .with_thresholds(symbol, [AlertCondition::PercentChangeExceeds(change)]);
            }

            let id = service.start_monitor(request).await?;
            info!(task = %id, duration_secs = duration, "Monitoring");

            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(duration)) => {}
                result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl-C")?,
            }

            service.stop_monitor(&id).await?;
            let snapshot = service.get_monitor_status(&id).await?;
            output::monitor(&snapshot, args.json)?;
        }
        Command::Tools => {
            let registry = ToolRegistry::new();
            register_tools(&registry, &service);
            println!("{}", serde_json::to_string_pretty(&registry.definitions())?);
        }
    }

    Ok(())
}
