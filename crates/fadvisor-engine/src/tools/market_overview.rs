//! Tool for a snapshot of the major indices

use crate::service::AdvisorService;
use async_trait::async_trait;
use fadvisor_tools::{Result, Tool};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub struct MarketOverviewTool {
    service: Arc<AdvisorService>,
}

#[derive(Debug, Default, Deserialize)]
struct MarketOverviewParams {
    #[serde(default)]
    symbols: Vec<String>,
}

impl MarketOverviewTool {
    pub fn new(service: Arc<AdvisorService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for MarketOverviewTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: MarketOverviewParams = if params.is_null() {
            MarketOverviewParams::default()
        } else {
            serde_json::from_value(params)?
        };
        let overview = self.service.market_overview(&params.symbols).await;
        Ok(serde_json::to_value(overview)?)
    }

    fn name(&self) -> &str {
        "market_overview"
    }

    fn description(&self) -> &str {
        "Current levels of market indices (S&P 500, Dow, Nasdaq, VIX, 10Y yield by default) \
         with the volatility regime implied by the VIX."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbols": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Index symbols; defaults to ^GSPC, ^DJI, ^IXIC, ^VIX, ^TNX"
                }
            }
        })
    }
}
