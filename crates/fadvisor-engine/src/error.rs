//! Error types for market analysis and monitoring operations

use crate::monitor::TaskId;
use thiserror::Error;

/// Errors produced by the gateway, the analytics and the monitor manager
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Symbol unknown, or the provider call failed or timed out
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Upstream provider is throttling requests
    #[error("Rate limit exceeded for {provider}")]
    RateLimited { provider: String },

    /// Price history shorter than the calculator's minimum window
    #[error("Insufficient data for {symbol}: need {required} points, got {actual}")]
    InsufficientData {
        symbol: String,
        required: usize,
        actual: usize,
    },

    /// A position has no matching instrument
    #[error("Missing price data for {symbol}")]
    MissingPriceData { symbol: String },

    /// No monitor task with this identifier
    #[error("Unknown monitor task: {0}")]
    UnknownTask(TaskId),

    /// Operation requires a task that is no longer running
    #[error("Monitor task {0} is still running")]
    TaskStillRunning(TaskId),

    /// Caller supplied an invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdvisorError {
    /// Build a [`AdvisorError::DataUnavailable`]
    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Whether a caller may retry the operation after backing off
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

/// Convert AdvisorError to the tool-layer error
impl From<AdvisorError> for fadvisor_tools::Error {
    fn from(err: AdvisorError) -> Self {
        match err {
            AdvisorError::InvalidInput(msg) => fadvisor_tools::Error::InvalidParameters(msg),
            other => fadvisor_tools::Error::ProcessingFailed(other.to_string()),
        }
    }
}
