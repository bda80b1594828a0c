//! Background market monitoring
//!
//! A [`MonitorManager`] owns a registry of tasks. Each running task polls
//! its watch-list on a fixed interval, evaluates [`AlertCondition`]s and
//! records [`Alert`]s until it is stopped or the gateway keeps failing.

mod manager;
mod poller;
mod task;

pub use manager::MonitorManager;
pub use task::{
    Alert, AlertCondition, DEFAULT_PERCENT_CHANGE, MonitorRequest, MonitorSnapshot, TaskId,
    TaskState,
};
