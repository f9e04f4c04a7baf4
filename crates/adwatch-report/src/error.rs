use adwatch_common::error::ReportError;
use adwatch_common::AccountId;

/// Failure reported by a [`crate::ReportFetcher`] or
/// [`crate::FieldDefinitionSource`], classified by the collaborator.
///
/// # Examples
///
/// ```rust
/// use adwatch_report::error::FetchError;
///
/// assert!(FetchError::Retryable("rate limited".into()).is_retryable());
/// assert!(!FetchError::NonRetryable("bad report definition".into()).is_retryable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network timeout, rate limiting, expired token. Worth another attempt.
    #[error("transient failure: {0}")]
    Retryable(String),

    /// Malformed report definition or permanent rejection.
    #[error("permanent failure: {0}")]
    NonRetryable(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// The last error of a retry loop together with how many attempts were made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed after {attempts} attempt(s): {source}")]
pub struct RetryError {
    pub attempts: u32,
    #[source]
    pub source: FetchError,
}

impl RetryError {
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// The field catalog of a report type could not be obtained.
#[derive(Debug, Clone, thiserror::Error)]
#[error("FieldMapping: no field definitions for report type '{report_type}': {source}")]
pub struct FieldMappingError {
    pub report_type: String,
    #[source]
    pub source: RetryError,
}

/// Terminal outcome of one account's download task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadFailure {
    /// The fetcher gave up, either immediately or after exhausting retries.
    #[error("Download: {0}")]
    Fetch(#[from] RetryError),

    /// The downloader was shut down before the task got a worker slot.
    #[error("Download: worker pool closed")]
    PoolClosed,

    /// The task ended abnormally (panic or runtime shutdown).
    #[error("Download: task for account {account_id} aborted: {reason}")]
    Aborted { account_id: AccountId, reason: String },
}

/// A downloaded payload could not be turned into a report table.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// A header cell has no machine field name in the report type's catalog.
    #[error("Parse: header column '{display_name}' is not a field of {report_type}")]
    MissingMapping {
        display_name: String,
        report_type: String,
    },

    /// The payload has no header row.
    #[error("Parse: report has no header row")]
    EmptyReport,

    /// A data row's width differs from the header width.
    #[error("Parse: row {row} has {actual} cells, header has {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Parse: CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse: {0}")]
    Report(#[from] ReportError),
}
