//! Tool for portfolio valuation and allocation

use crate::model::Position;
use crate::service::AdvisorService;
use async_trait::async_trait;
use fadvisor_tools::{Result, Tool};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub struct PortfolioAnalysisTool {
    service: Arc<AdvisorService>,
}

#[derive(Debug, Deserialize)]
struct PortfolioParams {
    positions: Vec<Position>,
}

impl PortfolioAnalysisTool {
    pub fn new(service: Arc<AdvisorService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for PortfolioAnalysisTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: PortfolioParams = serde_json::from_value(params)?;
        let report = self.service.analyze_portfolio(&params.positions).await?;
        Ok(serde_json::to_value(report)?)
    }

    fn name(&self) -> &str {
        "portfolio_analysis"
    }

    fn description(&self) -> &str {
        "Value a portfolio at current prices: total value, cost and return, \
         per-position contributions, sector allocation and concentration risk."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "positions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "symbol": { "type": "string" },
                            "quantity": { "type": "number", "exclusiveMinimum": 0 },
                            "cost_basis": {
                                "type": "number",
                                "exclusiveMinimum": 0,
                                "description": "Purchase price per unit"
                            }
                        },
                        "required": ["symbol", "quantity", "cost_basis"]
                    },
                    "minItems": 1
                }
            },
            "required": ["positions"]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::gateway::MockMarketDataGateway;
    use crate::model::Instrument;

    fn tool(mock: MockMarketDataGateway) -> PortfolioAnalysisTool {
        let service = AdvisorService::new(EngineConfig::default(), Arc::new(mock));
        PortfolioAnalysisTool::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_portfolio_report() {
        let mut mock = MockMarketDataGateway::new();
        mock.expect_fetch_instrument().returning(|symbol| {
            let price = if symbol == "AAPL" { 189.50 } else { 312.25 };
            Ok(Instrument::new(symbol, price).with_sector("Technology"))
        });

        let result = tool(mock)
            .execute(json!({
                "positions": [
                    {"symbol": "AAPL", "quantity": 10, "cost_basis": 150.0},
                    {"symbol": "MSFT", "quantity": 20, "purchase_price": 300.0}
                ]
            }))
            .await
            .unwrap();

        assert!((result["total_value"].as_f64().unwrap() - 8_140.0).abs() < 1e-9);
        assert!((result["total_cost"].as_f64().unwrap() - 7_500.0).abs() < 1e-9);
        assert_eq!(result["positions"].as_array().unwrap().len(), 2);
        assert_eq!(result["concentrated"], true);
    }

    #[tokio::test]
    async fn test_invalid_position_rejected() {
        let err = tool(MockMarketDataGateway::new())
            .execute(json!({
                "positions": [{"symbol": "AAPL", "quantity": -5, "cost_basis": 150.0}]
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, fadvisor_tools::Error::InvalidParameters(_)));

        let err = tool(MockMarketDataGateway::new())
            .execute(json!({"positions": []}))
            .await
            .unwrap_err();
        assert!(matches!(err, fadvisor_tools::Error::InvalidParameters(_)));
    }
}
