/// Errors raised while building the shared data model from configuration.
///
/// # Examples
///
/// ```rust
/// use adwatch_common::error::ConfigError;
///
/// let err = ConfigError::InvalidAccountId("12a-34".to_string());
/// assert!(err.to_string().contains("12a-34"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required key is missing or empty.
    #[error("Config: missing or empty value for '{0}'")]
    MissingValue(&'static str),

    /// An account id could not be parsed as a number once dashes were removed.
    #[error("Config: invalid account id '{0}'")]
    InvalidAccountId(String),

    /// The alert-definition document is not valid JSON for the expected shape.
    #[error("Config: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a configuration file failed.
    #[error("Config: I/O error on '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Violations of the [`crate::ReportData`] shape invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    /// Two header cells resolved to the same machine field name.
    #[error("Report: duplicate field '{0}' in header")]
    DuplicateField(String),

    /// A row's width differs from the header width.
    #[error("Report: row {row} has {actual} cells, header has {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// The field-to-index table no longer matches the header.
    #[error("Report: field mapping has {mapping} entries, header has {header}")]
    MappingOutOfSync { mapping: usize, header: usize },
}

/// Convenience `Result` alias for configuration parsing.
pub type Result<T> = std::result::Result<T, ConfigError>;
