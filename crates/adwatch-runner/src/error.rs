use adwatch_alert::error::{RuleError, TemplateError};
use adwatch_common::error::ConfigError;
use adwatch_common::AccountId;
use adwatch_report::error::{FieldMappingError, ParseError};
use std::time::Duration;

/// Errors of the alert pipeline, split by how far they reach.
///
/// `Configuration`, `TransientFetch`, `Template`, `Rule` and `Timeout` abort
/// one alert definition; `RowProcessing` and `Aborted` only drop one
/// account's report.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad runner settings or alert definition, detected before any download.
    #[error("Configuration: {0}")]
    Configuration(String),

    /// The report type's field catalog could not be fetched.
    #[error(transparent)]
    TransientFetch(#[from] FieldMappingError),

    /// The alert message template does not fit the processed report.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A rule broke the report shape while being applied.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// One account's report could not be parsed.
    #[error("RowProcessing: account {account_id}: {source}")]
    RowProcessing {
        account_id: AccountId,
        #[source]
        source: ParseError,
    },

    /// The processing task of one account panicked or was cancelled.
    #[error("Processing of account {account_id} aborted: {reason}")]
    Aborted { account_id: AccountId, reason: String },

    #[error("Alert timed out after {0:?}")]
    Timeout(Duration),
}

impl PipelineError {
    pub fn configuration(reason: impl std::fmt::Display) -> Self {
        Self::Configuration(reason.to_string())
    }

    /// Whether the error stops the whole alert definition.
    pub fn aborts_alert(&self) -> bool {
        !matches!(self, Self::RowProcessing { .. } | Self::Aborted { .. })
    }
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        Self::configuration(e)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
