use thiserror::Error;
use worldbus_core::AdapterError;

/// Errors raised while loading or configuring time-series playback.
#[derive(Debug, Error)]
pub enum TimeSeriesError {
    #[error("dataset load failed: {0}")]
    DatasetLoad(String),
    #[error("invalid configuration: {0}")]
    Configuration(&'static str),
    #[error("invalid configuration file: {0}")]
    ConfigFile(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl TimeSeriesError {
    pub(crate) fn load(message: impl Into<String>) -> Self {
        Self::DatasetLoad(message.into())
    }
}
