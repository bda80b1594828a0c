//! Registry of monitor tasks and their lifecycle

use super::poller::{self, PollContext};
use super::task::{AlertCondition, AlertLog, MonitorRequest, MonitorSnapshot, TaskId, TaskState};
use crate::analysis::TechnicalAnalyzer;
use crate::config::EngineConfig;
use crate::error::{AdvisorError, Result};
use crate::gateway::SharedGateway;
use crate::model::HistoryRange;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::AbortHandle;
use tracing::{info, warn};

/// Mutable part of a task, guarded by the entry lock
pub(crate) struct TaskRuntime {
    pub(crate) state: TaskState,
    pub(crate) alerts: AlertLog,
    pub(crate) ticks: u64,
    pub(crate) consecutive_failures: u32,
    pub(crate) last_error: Option<String>,
    pub(crate) stopped_at: Option<DateTime<Utc>>,
    abort: Option<AbortHandle>,
}

/// One registered task.
///
/// State changes and alert appends only happen while holding `state` and
/// only while the task is `Running`.
pub(crate) struct TaskEntry {
    pub(crate) id: TaskId,
    /// Watch-list in request order, with the conditions for each symbol
    pub(crate) symbols: Vec<(String, Vec<AlertCondition>)>,
    pub(crate) interval: Duration,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) state: Mutex<TaskRuntime>,
    cancel: watch::Sender<bool>,
}

impl TaskEntry {
    async fn snapshot(&self) -> MonitorSnapshot {
        let runtime = self.state.lock().await;
        MonitorSnapshot {
            id: self.id,
            state: runtime.state,
            watchlist: self.symbols.iter().map(|(s, _)| s.clone()).collect(),
            interval: self.interval,
            ticks: runtime.ticks,
            consecutive_failures: runtime.consecutive_failures,
            last_error: runtime.last_error.clone(),
            alerts: runtime.alerts.to_vec(),
            evicted_alerts: runtime.alerts.evicted(),
            created_at: self.created_at,
            stopped_at: runtime.stopped_at,
        }
    }

    /// Move a live task to `Stopped`; `false` if it had already ended
    async fn stop(&self) -> bool {
        let mut runtime = self.state.lock().await;
        if runtime.state.is_terminal() {
            return false;
        }
        runtime.state = TaskState::Stopped;
        runtime.stopped_at = Some(Utc::now());
        let _ = self.cancel.send(true);
        if let Some(handle) = runtime.abort.take() {
            handle.abort();
        }
        true
    }
}

/// Owns every monitor task and spawns their polling loops.
///
/// Each running task is an independent tokio task; at most one loop exists
/// per identifier. Stopped and failed records stay queryable until purged.
pub struct MonitorManager {
    tasks: Arc<RwLock<HashMap<TaskId, Arc<TaskEntry>>>>,
    context: PollContext,
    max_alerts_per_task: usize,
    min_poll_interval: Duration,
}

impl MonitorManager {
    pub fn new(config: &EngineConfig, gateway: SharedGateway) -> Self {
        let history_range = HistoryRange::days(config.analysis_history_days).unwrap_or_default();
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            context: PollContext {
                gateway,
                analyzer: TechnicalAnalyzer::new(config),
                history_range,
                max_consecutive_failures: config.max_consecutive_failures.max(1),
            },
            max_alerts_per_task: config.max_alerts_per_task,
            min_poll_interval: config.min_poll_interval,
        }
    }

    /// Validate `request`, register the task and spawn its loop.
    ///
    /// Returns as soon as the loop is spawned; the first poll happens in
    /// the background.
    pub async fn start(&self, request: MonitorRequest) -> Result<TaskId> {
        let symbols = request.resolve(self.min_poll_interval)?;

        let mut id = TaskId::new();
        let mut tasks = self.tasks.write().await;
        while tasks.contains_key(&id) {
            id = TaskId::new();
        }

        let (cancel, cancel_rx) = watch::channel(false);
        let entry = Arc::new(TaskEntry {
            id,
            symbols,
            interval: request.interval,
            created_at: Utc::now(),
            state: Mutex::new(TaskRuntime {
                state: TaskState::Pending,
                alerts: AlertLog::new(self.max_alerts_per_task),
                ticks: 0,
                consecutive_failures: 0,
                last_error: None,
                stopped_at: None,
                abort: None,
            }),
            cancel,
        });

        // Registered only once running, so stop and shutdown never see a pending task
        {
            let mut runtime = entry.state.lock().await;
            runtime.state = TaskState::Running;
            let handle = tokio::spawn(poller::run(entry.clone(), self.context.clone(), cancel_rx));
            runtime.abort = Some(handle.abort_handle());
        }
        tasks.insert(id, entry.clone());
        drop(tasks);

        info!(
            task = %id,
            symbols = entry.symbols.len(),
            interval = ?entry.interval,
            "Monitor task started"
        );
        Ok(id)
    }

    /// Stop a running task.
    ///
    /// `Ok(true)` when this call performed the transition, `Ok(false)` when
    /// the task had already stopped or failed.
    pub async fn stop(&self, id: &TaskId) -> Result<bool> {
        let entry = self.entry(id).await?;
        let stopped = entry.stop().await;
        if stopped {
            info!(task = %id, "Monitor task stopped");
        }
        Ok(stopped)
    }

    pub async fn status(&self, id: &TaskId) -> Result<MonitorSnapshot> {
        Ok(self.entry(id).await?.snapshot().await)
    }

    /// Snapshots of every task, oldest first
    pub async fn list(&self) -> Vec<MonitorSnapshot> {
        let entries: Vec<Arc<TaskEntry>> = self.tasks.read().await.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(entries.len());
        for entry in entries {
            snapshots.push(entry.snapshot().await);
        }
        snapshots.sort_by_key(|s| s.created_at);
        snapshots
    }

    /// Remove a stopped or failed task's record
    pub async fn purge(&self, id: &TaskId) -> Result<MonitorSnapshot> {
        let mut tasks = self.tasks.write().await;
        let entry = tasks.get(id).ok_or(AdvisorError::UnknownTask(*id))?;
        let snapshot = entry.snapshot().await;
        if !snapshot.state.is_terminal() {
            return Err(AdvisorError::TaskStillRunning(*id));
        }
        tasks.remove(id);
        info!(task = %id, "Monitor task purged");
        Ok(snapshot)
    }

    /// Stop every live task; returns how many were stopped
    pub async fn shutdown(&self) -> usize {
        let entries: Vec<Arc<TaskEntry>> = self.tasks.read().await.values().cloned().collect();
        let mut stopped = 0;
        for entry in entries {
            if entry.stop().await {
                stopped += 1;
            }
        }
        if stopped > 0 {
            warn!(stopped, "Monitor manager shut down with running tasks");
        }
        stopped
    }

    /// Number of registered tasks, in any state
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    async fn entry(&self, id: &TaskId) -> Result<Arc<TaskEntry>> {
        self.tasks
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(AdvisorError::UnknownTask(*id))
    }
}

impl Drop for MonitorManager {
    /// Cancel every loop so dropped managers leave no pollers behind
    fn drop(&mut self) {
        let Ok(tasks) = self.tasks.try_read() else {
            return;
        };
        for entry in tasks.values() {
            let _ = entry.cancel.send(true);
            if let Ok(mut runtime) = entry.state.try_lock() {
                if let Some(handle) = runtime.abort.take() {
                    handle.abort();
                }
            }
        }
    }
}
