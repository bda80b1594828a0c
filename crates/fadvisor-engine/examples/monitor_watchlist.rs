//! Watch-list monitoring example
//!
//! Starts a background monitor over a few symbols, waits for a number of
//! polls and prints the alerts it recorded.
//!
//! To run this example:
//! ```bash
//! export ALPHA_VANTAGE_API_KEY=your_key_here  # Optional, adds sector metadata
//!
//! cargo run -p fadvisor-engine --example monitor_watchlist AAPL MSFT NVDA
//! ```

use fadvisor_engine::{AdvisorService, AlertCondition, EngineConfig, MonitorRequest};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fadvisor_utils::init_tracing();

    let mut symbols: Vec<String> = env::args().skip(1).collect();
    if symbols.is_empty() {
        symbols = vec!["AAPL".to_string(), "MSFT".to_string()];
    }

    println!("=== Watch-list Monitor ===\n");
    println!("Watching: {}\n", symbols.join(", "));

    let config = EngineConfig::builder().with_env_api_key().build()?;
    let service = AdvisorService::from_config(config)?;

    // Alert on any 0.5% move between polls, and when the first symbol's RSI runs hot
    let request = MonitorRequest::new(symbols.clone(), Duration::from_secs(15))
        .with_default_conditions([AlertCondition::PercentChangeExceeds(0.5)])
        .with_thresholds(
            symbols[0].clone(),
            [
                AlertCondition::PercentChangeExceeds(0.5),
                AlertCondition::RsiAbove(70.0),
                AlertCondition::RsiBelow(30.0),
            ],
        );

    let id = service.start_monitor(request).await?;
    println!("Started monitor {id}");

    tokio::time::sleep(Duration::from_secs(60)).await;

    service.stop_monitor(&id).await?;
    let status = service.get_monitor_status(&id).await?;

    println!("\nState: {}", status.state);
    println!("Polls: {}", status.ticks);
    if let Some(error) = &status.last_error {
        println!("Last error: {error}");
    }
    println!("Alerts ({}):", status.alerts.len());
    for alert in &status.alerts {
        println!(
            "  [{}] {} (observed {:.2})",
            alert.triggered_at.format("%H:%M:%S"),
            alert.description,
            alert.observed
        );
    }

    Ok(())
}
