use thiserror::Error;

/// Errors raised by channel registration and buffer access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel name `{name}` is already registered")]
    DuplicateName { name: String },
    #[error("unknown channel `{name}`")]
    UnknownChannel { name: String },
    #[error("unknown channel group `{name}`")]
    UnknownGroup { name: String },
    #[error("group `{name}` holds {expected} values but {actual} were supplied")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("buffer holds {expected} values but {actual} were supplied")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("group `{name}` has invalid shape {shape:?}; every dimension must be positive")]
    InvalidShape { name: String, shape: Vec<usize> },
    #[error("cannot register `{name}`: channel registry is sealed")]
    RegistrySealed { name: String },
}

/// Errors raised when reading resolved adapter configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration option `{name}` is not declared")]
    UnknownOption { name: String },
    #[error("configuration option `{name}` expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: String,
    },
}

/// Failure surfaced by a world adapter hook.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("environment error: {0}")]
    Environment(String),
}

impl AdapterError {
    /// Wrap an environment-side failure message.
    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment(message.into())
    }
}
