use crate::definition::AlertDefinition;
use crate::error::{PipelineError, Result};
use adwatch_action::dispatcher::{ActionDispatcher, ActionSummary};
use adwatch_action::plugin::ActionRegistry;
use adwatch_alert::engine::RuleEngine;
use adwatch_alert::plugin::RuleRegistry;
use adwatch_common::{AccountId, FieldMapping, ReportData};
use adwatch_report::downloader::ReportDownloader;
use adwatch_report::field_mapping::FieldMappingCache;
use adwatch_report::parser::ReportParser;
use adwatch_report::{DownloadedReport, ReportFetcher};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Reports that made it through parsing, rules and rendering, plus the
/// accounts whose report was dropped on the way.
#[derive(Debug, Default)]
pub struct ProcessedBatch {
    /// In completion order.
    pub reports: Vec<ReportData>,
    pub dropped: BTreeMap<AccountId, PipelineError>,
}

/// Turns downloaded payloads into rendered reports on a bounded pool.
///
/// Each payload is parsed, run through a fresh [`RuleEngine`] and rendered
/// with the alert's template in its own task. A template or rule failure in
/// any report aborts the whole batch; a parse failure or a panicking task
/// only drops that account.
pub struct ReportProcessor {
    pool: Arc<Semaphore>,
    rules: Arc<RuleRegistry>,
}

impl ReportProcessor {
    pub fn new(threads: usize, rules: Arc<RuleRegistry>) -> Self {
        Self {
            pool: Arc::new(Semaphore::new(threads.max(1))),
            rules,
        }
    }

    pub async fn process_all(
        &self,
        definition: &Arc<AlertDefinition>,
        mapping: Arc<FieldMapping>,
        downloads: Vec<DownloadedReport>,
    ) -> Result<ProcessedBatch> {
        let reports: Arc<Mutex<Vec<ReportData>>> =
            Arc::new(Mutex::new(Vec::with_capacity(downloads.len())));
        let dropped: Arc<Mutex<BTreeMap<AccountId, PipelineError>>> =
            Arc::new(Mutex::new(BTreeMap::new()));
        let abort: Arc<Mutex<Option<PipelineError>>> = Arc::new(Mutex::new(None));

        let mut tasks = Vec::with_capacity(downloads.len());
        for download in downloads {
            let account_id = download.account_id;
            let pool = Arc::clone(&self.pool);
            let rules = Arc::clone(&self.rules);
            let definition = Arc::clone(definition);
            let mapping = Arc::clone(&mapping);
            let reports = Arc::clone(&reports);
            let dropped = Arc::clone(&dropped);
            let abort = Arc::clone(&abort);

            let task = tokio::spawn(async move {
                let Ok(_permit) = pool.acquire_owned().await else {
                    lock(&dropped).insert(
                        account_id,
                        PipelineError::Aborted {
                            account_id,
                            reason: "processing pool closed".to_string(),
                        },
                    );
                    return;
                };
                match process_report(&definition, &rules, &mapping, download) {
                    Ok(report) => {
                        tracing::debug!(
                            alert = %definition.name,
                            account_id,
                            rows = report.row_count(),
                            "Processed report"
                        );
                        lock(&reports).push(report);
                    }
                    Err(e) if e.aborts_alert() => {
                        tracing::error!(alert = %definition.name, account_id, error = %e, "Alert processing aborted");
                        lock(&abort).get_or_insert(e);
                    }
                    Err(e) => {
                        tracing::warn!(alert = %definition.name, account_id, error = %e, "Dropped report");
                        lock(&dropped).insert(account_id, e);
                    }
                }
            });
            tasks.push((account_id, task));
        }

        for (account_id, task) in tasks {
            if let Err(e) = task.await {
                tracing::error!(account_id, error = %e, "Processing task aborted");
                lock(&dropped).insert(
                    account_id,
                    PipelineError::Aborted {
                        account_id,
                        reason: e.to_string(),
                    },
                );
            }
        }

        if let Some(e) = lock(&abort).take() {
            return Err(e);
        }
        let batch = ProcessedBatch {
            reports: std::mem::take(&mut *lock(&reports)),
            dropped: std::mem::take(&mut *lock(&dropped)),
        };
        Ok(batch)
    }
}

fn process_report(
    definition: &AlertDefinition,
    rules: &RuleRegistry,
    mapping: &FieldMapping,
    download: DownloadedReport,
) -> Result<ReportData> {
    let mut report = ReportParser::parse_csv(&definition.name, &download.payload, mapping)
        .map_err(|source| PipelineError::RowProcessing {
            account_id: download.account_id,
            source,
        })?;

    let mut engine = RuleEngine::new(rules.create_rules(&definition.rules)?);
    engine.apply(&mut report)?;
    definition.template.render(&mut report)?;
    Ok(report)
}

/// Lock a shared aggregate, recovering from a poisoned Mutex if necessary.
fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What happened to one alert definition during a run.
#[derive(Debug)]
pub struct RunSummary {
    pub alert: String,
    pub accounts: usize,
    pub downloaded: usize,
    pub download_failures: BTreeSet<AccountId>,
    pub processed: usize,
    pub dropped: BTreeSet<AccountId>,
    /// Alert rows handed to the actions.
    pub rows: usize,
    pub actions: Vec<ActionSummary>,
    pub elapsed: Duration,
    /// Set when the alert was aborted before dispatch.
    pub error: Option<PipelineError>,
}

impl RunSummary {
    fn new(alert: &str, accounts: usize) -> Self {
        Self {
            alert: alert.to_string(),
            accounts,
            downloaded: 0,
            download_failures: BTreeSet::new(),
            processed: 0,
            dropped: BTreeSet::new(),
            rows: 0,
            actions: Vec::new(),
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.actions.iter().all(ActionSummary::is_ok)
    }
}

/// Download → process → dispatch, one alert definition at a time.
pub struct AlertPipeline {
    fetcher: Arc<dyn ReportFetcher>,
    mappings: FieldMappingCache,
    downloader: ReportDownloader,
    processor: ReportProcessor,
    actions: Arc<ActionRegistry>,
    alert_timeout: Option<Duration>,
}

impl AlertPipeline {
    pub fn new(
        fetcher: Arc<dyn ReportFetcher>,
        mappings: FieldMappingCache,
        downloader: ReportDownloader,
        processor: ReportProcessor,
        actions: Arc<ActionRegistry>,
    ) -> Self {
        Self {
            fetcher,
            mappings,
            downloader,
            processor,
            actions,
            alert_timeout: None,
        }
    }

    /// Bounds the download and processing stages of each alert.
    pub fn with_alert_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.alert_timeout = timeout;
        self
    }

    /// Runs every definition in order and returns one summary each. A failed
    /// alert is logged and does not stop the following ones.
    pub async fn run_all(
        &self,
        definitions: &[Arc<AlertDefinition>],
        accounts: &BTreeSet<AccountId>,
    ) -> Vec<RunSummary> {
        let mut summaries = Vec::with_capacity(definitions.len());
        for definition in definitions {
            summaries.push(self.run_alert(definition, accounts).await);
        }
        summaries
    }

    pub async fn run_alert(
        &self,
        definition: &Arc<AlertDefinition>,
        accounts: &BTreeSet<AccountId>,
    ) -> RunSummary {
        let start = Instant::now();
        let mut summary = RunSummary::new(&definition.name, accounts.len());
        tracing::info!(
            alert = %definition.name,
            query = %definition.query,
            accounts = accounts.len(),
            "Processing alert"
        );

        let collected = match self.alert_timeout {
            Some(limit) => tokio::time::timeout(limit, self.collect(definition, accounts, &mut summary))
                .await
                .unwrap_or(Err(PipelineError::Timeout(limit))),
            None => self.collect(definition, accounts, &mut summary).await,
        };

        match collected {
            Ok(reports) => {
                summary.processed = reports.len();
                summary.rows = reports.iter().map(ReportData::row_count).sum();
                summary.actions =
                    ActionDispatcher::dispatch_configured(&self.actions, &definition.actions, &reports)
                        .await;
            }
            Err(e) => {
                tracing::error!(alert = %definition.name, error = %e, "Alert aborted");
                summary.error = Some(e);
            }
        }

        summary.elapsed = start.elapsed();
        log_summary(&summary);
        summary
    }

    async fn collect(
        &self,
        definition: &Arc<AlertDefinition>,
        accounts: &BTreeSet<AccountId>,
        summary: &mut RunSummary,
    ) -> Result<Vec<ReportData>> {
        let mapping = self
            .mappings
            .get_mapping(definition.query.report_type())
            .await?;

        let batch = self
            .downloader
            .download_all(accounts, &definition.query, Arc::clone(&self.fetcher))
            .await;
        summary.downloaded = batch.successes.len();
        summary.download_failures = batch.failed_ids();

        let processed = self
            .processor
            .process_all(definition, mapping, batch.successes)
            .await?;
        summary.dropped = processed.dropped.keys().copied().collect();
        Ok(processed.reports)
    }

    /// Releases the download pool; later runs fail every download.
    pub fn shutdown(&self) {
        self.downloader.shutdown();
    }
}

fn log_summary(summary: &RunSummary) {
    let failed_actions = summary.actions.iter().filter(|a| !a.is_ok()).count();
    tracing::info!(
        alert = %summary.alert,
        accounts = summary.accounts,
        downloaded = summary.downloaded,
        download_failures = summary.download_failures.len(),
        processed = summary.processed,
        dropped = summary.dropped.len(),
        rows = summary.rows,
        actions = summary.actions.len(),
        failed_actions,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Alert finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use adwatch_alert::error::RuleError;
    use adwatch_alert::message::MessageTemplate;
    use adwatch_alert::plugin::RulePlugin;
    use adwatch_alert::AlertRule;
    use adwatch_common::config::{ActionConfig, RuleConfig};
    use adwatch_common::{FieldDefinition, ReportQuery, ReportRow};
    use adwatch_report::downloader::DownloaderConfig;
    use adwatch_report::error::FetchError;
    use adwatch_report::source::FileReportSource;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    const REPORT_TYPE: &str = "ACCOUNT_PERFORMANCE_REPORT";

    fn mapping() -> FieldMapping {
        FieldMapping::from_definitions(
            REPORT_TYPE,
            vec![
                FieldDefinition::new("Customer ID", "ExternalCustomerId"),
                FieldDefinition::new("Impressions", "Impressions"),
            ],
        )
    }

    fn definition(rules: Vec<RuleConfig>, actions: Vec<ActionConfig>) -> Arc<AlertDefinition> {
        Arc::new(AlertDefinition {
            name: "low impressions".into(),
            query: ReportQuery::new(REPORT_TYPE, ["ExternalCustomerId", "Impressions"]),
            rules,
            template: MessageTemplate::parse("Account {ExternalCustomerId}").unwrap(),
            actions,
        })
    }

    fn download(account_id: AccountId) -> DownloadedReport {
        DownloadedReport {
            account_id,
            payload: format!("Customer ID,Impressions\n{account_id},5\n").into_bytes(),
        }
    }

    /// Panics while extending the rows of account 2.
    struct PanickingRule;

    impl AlertRule for PanickingRule {
        fn name(&self) -> &str {
            "PanickingRule"
        }

        fn new_header_fields(&self) -> Vec<String> {
            vec!["Checked".into()]
        }

        fn extend_row(&mut self, row: &ReportRow<'_>) -> Vec<String> {
            if row.get("ExternalCustomerId") == Some("2") {
                panic!("unexpected row");
            }
            vec!["yes".into()]
        }
    }

    struct PanickingRulePlugin;

    impl RulePlugin for PanickingRulePlugin {
        fn name(&self) -> &str {
            "PanickingRule"
        }

        fn create_rule(
            &self,
            _config: &Value,
            _registry: &RuleRegistry,
        ) -> std::result::Result<Box<dyn AlertRule>, RuleError> {
            Ok(Box::new(PanickingRule))
        }
    }

    #[tokio::test]
    async fn panicking_task_drops_only_its_account() {
        let mut registry = RuleRegistry::default();
        registry.register(Box::new(PanickingRulePlugin));
        let processor = ReportProcessor::new(2, Arc::new(registry));
        let definition = definition(vec![RuleConfig::new("PanickingRule", json!({}))], vec![]);

        let batch = processor
            .process_all(
                &definition,
                Arc::new(mapping()),
                vec![download(1), download(2), download(3)],
            )
            .await
            .unwrap();

        let mut processed: Vec<&str> = batch
            .reports
            .iter()
            .filter_map(|r| r.row(0).and_then(|row| row.get("ExternalCustomerId")))
            .collect();
        processed.sort_unstable();
        assert_eq!(processed, vec!["1", "3"]);
        assert_eq!(batch.dropped.len(), 1);
        assert!(matches!(
            batch.dropped.get(&2),
            Some(PipelineError::Aborted { account_id: 2, .. })
        ));
    }

    /// Never answers within the alert timeout.
    struct StalledFetcher;

    #[async_trait]
    impl ReportFetcher for StalledFetcher {
        async fn fetch_report(
            &self,
            account_id: AccountId,
            _query: &ReportQuery,
        ) -> std::result::Result<Vec<u8>, FetchError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(download(account_id).payload)
        }
    }

    #[tokio::test]
    async fn alert_timeout_skips_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("alerts.log");
        let definitions = HashMap::from([(
            REPORT_TYPE.to_string(),
            vec![
                FieldDefinition::new("Customer ID", "ExternalCustomerId"),
                FieldDefinition::new("Impressions", "Impressions"),
            ],
        )]);
        let fields = Arc::new(FileReportSource::with_definitions(dir.path(), definitions));

        let limit = Duration::from_millis(50);
        let pipeline = AlertPipeline::new(
            Arc::new(StalledFetcher),
            FieldMappingCache::new(fields),
            ReportDownloader::new(DownloaderConfig {
                threads: 2,
                retries: 1,
                backoff: Duration::from_millis(1),
            }),
            ReportProcessor::new(2, Arc::new(RuleRegistry::default())),
            Arc::new(ActionRegistry::default()),
        )
        .with_alert_timeout(Some(limit));

        let definition = definition(
            vec![],
            vec![ActionConfig::new(
                "SimpleLogFileWriter",
                json!({"LogFilePathname": log_path}),
            )],
        );
        let summary = pipeline
            .run_alert(&definition, &BTreeSet::from([1, 2]))
            .await;

        assert!(matches!(summary.error, Some(PipelineError::Timeout(d)) if d == limit));
        assert!(!summary.is_ok());
        assert!(summary.actions.is_empty());
        assert_eq!(summary.rows, 0);
        assert!(!log_path.exists());
        pipeline.shutdown();
    }
}
