use crate::error::{PipelineError, Result};
use adwatch_common::types::parse_account_id;
use adwatch_common::AccountId;
use adwatch_report::downloader::DownloaderConfig;
use adwatch_report::retry::{Backoff, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings of one `adwatch` run, read from TOML.
///
/// Relative paths are resolved against the directory of the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Manager account the processed accounts belong to (dashes allowed).
    #[serde(default)]
    pub top_account_id: Option<String>,
    #[serde(default = "default_alerts_file")]
    pub alerts_file: PathBuf,
    /// One account id per line; `#` starts a comment. When absent, accounts
    /// are discovered from the report source.
    #[serde(default)]
    pub accounts_file: Option<PathBuf>,
    #[serde(default)]
    pub alert_timeout_secs: Option<u64>,
    #[serde(default)]
    pub download: DownloadSection,
    #[serde(default)]
    pub field_mapping: FieldMappingSection,
    #[serde(default)]
    pub processing: ProcessingSection,
    #[serde(default)]
    pub source: SourceSection,

    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSection {
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_millis")]
    pub backoff_millis: u64,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            retries: default_retries(),
            backoff_millis: default_backoff_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMappingSection {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_millis")]
    pub backoff_millis: u64,
}

impl Default for FieldMappingSection {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            backoff_millis: default_backoff_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSection {
    #[serde(default = "default_threads")]
    pub threads: usize,
}

impl Default for ProcessingSection {
    fn default() -> Self {
        Self {
            threads: default_threads(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default = "default_field_definitions_file")]
    pub field_definitions_file: PathBuf,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            reports_dir: default_reports_dir(),
            field_definitions_file: default_field_definitions_file(),
        }
    }
}

fn default_alerts_file() -> PathBuf {
    PathBuf::from("alerts.json")
}

fn default_threads() -> usize {
    20
}

fn default_retries() -> u32 {
    5
}

fn default_backoff_millis() -> u64 {
    5000
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_field_definitions_file() -> PathBuf {
    PathBuf::from("field_definitions.json")
}

impl RunnerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(PipelineError::configuration)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.download.threads == 0 || self.processing.threads == 0 {
            return Err(PipelineError::configuration("thread counts must be at least 1"));
        }
        if self.download.retries == 0 || self.field_mapping.retries == 0 {
            return Err(PipelineError::configuration("retry counts must be at least 1"));
        }
        self.top_account_id()?;
        Ok(())
    }

    pub fn top_account_id(&self) -> Result<Option<AccountId>> {
        self.top_account_id
            .as_deref()
            .map(parse_account_id)
            .transpose()
            .map_err(PipelineError::from)
    }

    /// Directory of the loaded TOML file; empty for configs parsed from a
    /// string.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolves `path` against the directory of the loaded TOML file.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn downloader(&self) -> DownloaderConfig {
        DownloaderConfig {
            threads: self.download.threads,
            retries: self.download.retries,
            backoff: Duration::from_millis(self.download.backoff_millis),
        }
    }

    pub fn field_mapping_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.field_mapping.retries,
            Backoff::Linear(Duration::from_millis(self.field_mapping.backoff_millis)),
        )
    }

    pub fn alert_timeout(&self) -> Option<Duration> {
        self.alert_timeout_secs.map(Duration::from_secs)
    }
}

/// Reads an accounts file: one id per line, blank lines and `#` comments
/// ignored.
pub fn parse_accounts(content: &str) -> Result<std::collections::BTreeSet<AccountId>> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(|line| parse_account_id(line).map_err(PipelineError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let config = RunnerConfig::from_toml_str("").unwrap();
        assert_eq!(config.download.threads, 20);
        assert_eq!(config.download.retries, 5);
        assert_eq!(config.processing.threads, 20);
        assert_eq!(config.field_mapping.backoff_millis, 5000);
        assert_eq!(config.alerts_file, PathBuf::from("alerts.json"));
        assert!(config.alert_timeout().is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = RunnerConfig::from_toml_str(
            r#"
            top_account_id = "123-456-7890"
            alert_timeout_secs = 600

            [download]
            threads = 4
            backoff_millis = 10

            [processing]
            threads = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.top_account_id().unwrap(), Some(1234567890));
        assert_eq!(config.downloader().threads, 4);
        assert_eq!(config.downloader().retries, 5);
        assert_eq!(config.downloader().backoff, Duration::from_millis(10));
        assert_eq!(config.processing.threads, 2);
        assert_eq!(config.alert_timeout(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn invalid_settings_fail_fast() {
        for bad in [
            "[download]\nthreads = 0",
            "[field_mapping]\nretries = 0",
            "top_account_id = \"abc\"",
            "alerts_file = 5",
        ] {
            assert!(
                matches!(
                    RunnerConfig::from_toml_str(bad),
                    Err(PipelineError::Configuration(_))
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adwatch.toml");
        std::fs::write(&path, "alerts_file = \"alerts/prod.json\"").unwrap();
        let config = RunnerConfig::load(&path).unwrap();
        assert_eq!(
            config.resolve(&config.alerts_file),
            dir.path().join("alerts/prod.json")
        );
        assert_eq!(config.resolve(Path::new("/abs.json")), PathBuf::from("/abs.json"));
    }

    #[test]
    fn accounts_file_skips_comments_and_blank_lines() {
        let accounts = parse_accounts("# prod accounts\n123-456-7890\n\n  42  # test\n").unwrap();
        assert_eq!(accounts.into_iter().collect::<Vec<_>>(), vec![42, 1234567890]);
        assert!(parse_accounts("12x").is_err());
    }
}
