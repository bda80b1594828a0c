//! JSON tool adapters over [`AdvisorService`]

pub mod market_monitor;
pub mod market_overview;
pub mod portfolio_analysis;
pub mod stock_analysis;

pub use market_monitor::MarketMonitorTool;
pub use market_overview::MarketOverviewTool;
pub use portfolio_analysis::PortfolioAnalysisTool;
pub use stock_analysis::StockAnalysisTool;

use crate::service::AdvisorService;
use fadvisor_tools::ToolRegistry;
use std::sync::Arc;

/// Register every engine tool with `registry`
pub fn register_tools(registry: &ToolRegistry, service: &Arc<AdvisorService>) {
    registry.register(Arc::new(StockAnalysisTool::new(service.clone())));
    registry.register(Arc::new(PortfolioAnalysisTool::new(service.clone())));
    registry.register(Arc::new(MarketOverviewTool::new(service.clone())));
    registry.register(Arc::new(MarketMonitorTool::new(service.clone())));
}
