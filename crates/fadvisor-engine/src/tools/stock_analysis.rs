//! Tool for single-stock technical analysis

use crate::service::AdvisorService;
use async_trait::async_trait;
use fadvisor_tools::{Result, Tool};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Snapshot and technical signal for one symbol
pub struct StockAnalysisTool {
    service: Arc<AdvisorService>,
}

#[derive(Debug, Deserialize)]
struct StockAnalysisParams {
    symbol: String,
}

impl StockAnalysisTool {
    pub fn new(service: Arc<AdvisorService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for StockAnalysisTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: StockAnalysisParams = serde_json::from_value(params)?;
        let analysis = self.service.analyze_stock(&params.symbol).await?;
        Ok(serde_json::to_value(analysis)?)
    }

    fn name(&self) -> &str {
        "stock_analysis"
    }

    fn description(&self) -> &str {
        "Analyze a stock: current price and metadata plus trend, RSI, MACD crossover, \
         support/resistance, Bollinger bands, ATR, volatility and volume trend."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Stock ticker symbol (e.g. AAPL)"
                }
            },
            "required": ["symbol"]
        })
    }
}
