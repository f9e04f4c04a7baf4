//! Report acquisition: field catalogs, concurrent per-account downloads and
//! parsing of downloaded payloads into [`ReportData`](adwatch_common::ReportData).
//!
//! The remote reporting API is reached only through the [`ReportFetcher`] and
//! [`FieldDefinitionSource`] traits. Both classify their failures as
//! retryable or not, and the retry loops in this crate honor that split.

pub mod downloader;
pub mod error;
pub mod field_mapping;
pub mod parser;
pub mod retry;
pub mod source;


use adwatch_common::{AccountId, FieldDefinition, ReportQuery};
use async_trait::async_trait;
use error::FetchError;

/// Downloads one account's report for a query.
///
/// Implementations must be shareable across the download pool's tasks.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    /// Returns the raw report payload (CSV with a display-name header row).
    ///
    /// # Errors
    ///
    /// [`FetchError::Retryable`] for transient failures such as timeouts or
    /// rate limiting, [`FetchError::NonRetryable`] for permanent rejections.
    async fn fetch_report(
        &self,
        account_id: AccountId,
        query: &ReportQuery,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Supplies the field catalog of a report type.
#[async_trait]
pub trait FieldDefinitionSource: Send + Sync {
    async fn fetch_field_definitions(
        &self,
        report_type: &str,
    ) -> Result<Vec<FieldDefinition>, FetchError>;
}

/// A successfully downloaded report payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedReport {
    pub account_id: AccountId,
    pub payload: Vec<u8>,
}
