//! Error types and utilities for dotconf configuration management.

/// Result type alias for dotconf operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Comprehensive error types for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source file could not be read. Fatal for Required sources,
    /// tolerated (as an empty contribution) for Optional sources.
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A source file was read but could not be parsed. Always fatal,
    /// even for Optional sources.
    #[error("Parse error in {source_name} at line {line}, column {column}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// A `$(name)` reference could not be substituted.
    #[error("Interpolation error: {0}")]
    Interpolation(String),

    /// Requested configuration key was not found (or failed conversion).
    /// Only returned by `require`.
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// The caller supplied invalid arguments. Raised before any I/O.
    #[error("Usage error: {0}")]
    Usage(String),
}

impl ConfigError {
    /// Creates a new io error carrying the offending path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a new parse error with source context and position.
    pub fn parse_error(
        source_name: impl Into<String>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Creates a new interpolation error.
    pub fn interpolation(message: impl Into<String>) -> Self {
        Self::Interpolation(message.into())
    }

    /// Creates a new key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a new usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Returns true if this error is related to IO operations.
    pub fn is_io_error(&self) -> bool {
        matches!(self, ConfigError::Io { .. })
    }

    /// Returns true if this error is related to parsing.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, ConfigError::Parse { .. })
    }

    /// Returns true if this error is related to interpolation.
    pub fn is_interpolation_error(&self) -> bool {
        matches!(self, ConfigError::Interpolation(_))
    }

    /// Returns true if this error is related to a missing key.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, ConfigError::KeyNotFound { .. })
    }

    /// Returns true if this error is related to invalid arguments.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, ConfigError::Usage(_))
    }
}
