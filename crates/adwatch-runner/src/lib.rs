//! The `adwatch` runner: loads the run configuration and alert definitions,
//! wires the report source, registries and worker pools together, and runs
//! every alert through download, processing and dispatch.

pub mod config;
pub mod definition;
pub mod error;
pub mod pipeline;

use crate::config::{parse_accounts, RunnerConfig};
use crate::definition::LoadedDefinitions;
use crate::error::{PipelineError, Result};
use crate::pipeline::{AlertPipeline, ReportProcessor, RunSummary};
use adwatch_action::plugin::ActionRegistry;
use adwatch_alert::plugin::RuleRegistry;
use adwatch_common::AccountId;
use adwatch_report::downloader::ReportDownloader;
use adwatch_report::field_mapping::FieldMappingCache;
use adwatch_report::source::FileReportSource;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Outcome of [`run`]: one summary per accepted alert definition, plus the
/// definitions rejected while loading.
#[derive(Debug)]
pub struct RunReport {
    pub summaries: Vec<RunSummary>,
    pub rejected: Vec<(String, PipelineError)>,
}

impl RunReport {
    pub fn failed_alerts(&self) -> usize {
        self.rejected.len() + self.summaries.iter().filter(|s| !s.is_ok()).count()
    }
}

/// Runs every alert of the configuration at `config_path`.
///
/// Fails only when the run cannot start at all (unreadable configuration,
/// report source or account list); per-alert failures are in the report.
pub async fn run(config_path: &Path) -> Result<RunReport> {
    let config = RunnerConfig::load(config_path)?;
    let rules = Arc::new(RuleRegistry::default());
    let actions = Arc::new(ActionRegistry::default().with_base_dir(config.base_dir()));

    let loaded = LoadedDefinitions::load(&config.resolve(&config.alerts_file), &rules, &actions)?;
    tracing::info!(
        accepted = loaded.definitions.len(),
        rejected = loaded.rejected.len(),
        "Loaded alert definitions"
    );

    let source = Arc::new(FileReportSource::new(
        config.resolve(&config.source.reports_dir),
        &config.resolve(&config.source.field_definitions_file),
    )?);
    let accounts = load_accounts(&config, &source)?;
    tracing::info!(
        top_account_id = ?config.top_account_id()?,
        accounts = accounts.len(),
        "Resolved accounts"
    );

    let pipeline = AlertPipeline::new(
        source.clone(),
        FieldMappingCache::with_policy(source, config.field_mapping_policy()),
        ReportDownloader::new(config.downloader()),
        ReportProcessor::new(config.processing.threads, rules),
        actions,
    )
    .with_alert_timeout(config.alert_timeout());

    let summaries = pipeline.run_all(&loaded.definitions, &accounts).await;
    pipeline.shutdown();

    Ok(RunReport {
        summaries,
        rejected: loaded.rejected,
    })
}

fn load_accounts(config: &RunnerConfig, source: &FileReportSource) -> Result<BTreeSet<AccountId>> {
    let mut accounts = match &config.accounts_file {
        Some(file) => {
            let path = config.resolve(file);
            let content = std::fs::read_to_string(&path).map_err(|e| {
                PipelineError::configuration(format!("failed to read {}: {e}", path.display()))
            })?;
            parse_accounts(&content)?
        }
        None => source.list_accounts()?,
    };
    // The manager account itself carries no report of its own.
    if let Some(top) = config.top_account_id()? {
        accounts.remove(&top);
    }
    Ok(accounts)
}
