use crate::error::FetchError;
use crate::{FieldDefinitionSource, ReportFetcher};
use adwatch_common::error::ConfigError;
use adwatch_common::types::parse_account_id;
use adwatch_common::{AccountId, FieldDefinition, ReportQuery};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Report source backed by a local directory.
///
/// Reports live at `<reports_dir>/<account_id>.csv`; field catalogs come from
/// a JSON document `{"<ReportType>": [{"DisplayName": .., "FieldName": ..}]}`.
/// Useful for replaying exported reports and for offline runs.
pub struct FileReportSource {
    reports_dir: PathBuf,
    definitions: HashMap<String, Vec<FieldDefinition>>,
}

impl FileReportSource {
    pub fn new(reports_dir: impl Into<PathBuf>, definitions_file: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(definitions_file).map_err(|source| ConfigError::Io {
                path: definitions_file.display().to_string(),
                source,
            })?;
        let definitions = serde_json::from_str(&content)?;
        Ok(Self::with_definitions(reports_dir, definitions))
    }

    pub fn with_definitions(
        reports_dir: impl Into<PathBuf>,
        definitions: HashMap<String, Vec<FieldDefinition>>,
    ) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            definitions,
        }
    }

    fn report_path(&self, account_id: AccountId) -> PathBuf {
        self.reports_dir.join(format!("{account_id}.csv"))
    }

    /// Account ids for which a report file exists.
    pub fn list_accounts(&self) -> Result<BTreeSet<AccountId>, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: self.reports_dir.display().to_string(),
            source,
        };
        let mut accounts = BTreeSet::new();
        for entry in std::fs::read_dir(&self.reports_dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match parse_account_id(stem) {
                Ok(id) => {
                    accounts.insert(id);
                }
                Err(_) => tracing::warn!(file = %path.display(), "Skipping non-account report file"),
            }
        }
        Ok(accounts)
    }
}

#[async_trait]
impl ReportFetcher for FileReportSource {
    async fn fetch_report(
        &self,
        account_id: AccountId,
        query: &ReportQuery,
    ) -> Result<Vec<u8>, FetchError> {
        let path = self.report_path(account_id);
        tracing::debug!(account_id, query = %query, file = %path.display(), "Reading report file");
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                FetchError::NonRetryable(format!("{}: {e}", path.display()))
            }
            _ => FetchError::Retryable(format!("{}: {e}", path.display())),
        })
    }
}

#[async_trait]
impl FieldDefinitionSource for FileReportSource {
    async fn fetch_field_definitions(
        &self,
        report_type: &str,
    ) -> Result<Vec<FieldDefinition>, FetchError> {
        self.definitions.get(report_type).cloned().ok_or_else(|| {
            FetchError::NonRetryable(format!("unknown report type {report_type}"))
        })
    }
}
