//! Tool for starting, stopping and inspecting background monitors

use crate::monitor::{AlertCondition, MonitorRequest, TaskId};
use crate::service::AdvisorService;
use async_trait::async_trait;
use fadvisor_tools::{Result, Tool};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_INTERVAL_SECS: u64 = 60;

pub struct MarketMonitorTool {
    service: Arc<AdvisorService>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum MonitorAction {
    Start {
        watchlist: Vec<String>,
        #[serde(default)]
        thresholds: HashMap<String, Vec<AlertCondition>>,
        #[serde(default)]
        default_conditions: Option<Vec<AlertCondition>>,
        #[serde(default = "default_interval_secs")]
        interval_seconds: u64,
    },
    Stop {
        task_id: TaskId,
    },
    Status {
        task_id: TaskId,
    },
    List,
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl MarketMonitorTool {
    pub fn new(service: Arc<AdvisorService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for MarketMonitorTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let action: MonitorAction = serde_json::from_value(params)?;

        match action {
            MonitorAction::Start {
                watchlist,
                thresholds,
                default_conditions,
                interval_seconds,
            } => {
                let mut request =
                    MonitorRequest::new(watchlist, Duration::from_secs(interval_seconds));
                request.thresholds = thresholds;
                if let Some(conditions) = default_conditions {
                    request = request.with_default_conditions(conditions);
                }
                let task_id = self.service.start_monitor(request).await?;
                Ok(json!({ "task_id": task_id, "state": "RUNNING" }))
            }
            MonitorAction::Stop { task_id } => {
                let stopped = self.service.stop_monitor(&task_id).await?;
                Ok(json!({ "task_id": task_id, "stopped": stopped }))
            }
            MonitorAction::Status { task_id } => {
                let snapshot = self.service.get_monitor_status(&task_id).await?;
                Ok(serde_json::to_value(snapshot)?)
            }
            MonitorAction::List => {
                let snapshots = self.service.list_monitors().await;
                Ok(json!({ "tasks": snapshots }))
            }
        }
    }

    fn name(&self) -> &str {
        "market_monitor"
    }

    fn description(&self) -> &str {
        "Manage background market monitors. `start` polls a watch-list and records \
         price/RSI alerts, `stop` cancels a monitor, `status` returns its state and \
         alerts, `list` shows every monitor."
    }

    fn input_schema(&self) -> Value {
        let condition = json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["price_above", "price_below", "percent_change_exceeds", "rsi_above", "rsi_below"]
                },
                "value": { "type": "number" }
            },
            "required": ["type", "value"]
        });

        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["start", "stop", "status", "list"]
                },
                "watchlist": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Symbols to watch (start)"
                },
                "thresholds": {
                    "type": "object",
                    "additionalProperties": { "type": "array", "items": condition },
                    "description": "Alert conditions per symbol (start)"
                },
                "default_conditions": {
                    "type": "array",
                    "items": condition,
                    "description": "Conditions for symbols without thresholds; defaults to a 5% move"
                },
                "interval_seconds": {
                    "type": "integer",
                    "minimum": 1,
                    "default": DEFAULT_INTERVAL_SECS
                },
                "task_id": {
                    "type": "string",
                    "description": "Monitor identifier (stop, status)"
                }
            },
            "required": ["action"]
        })
    }
}
