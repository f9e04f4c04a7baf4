use crate::error::DownloadFailure;
use crate::retry::{Backoff, RetryPolicy};
use crate::{DownloadedReport, ReportFetcher};
use adwatch_common::{AccountId, ReportQuery};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

pub const DEFAULT_THREADS: usize = 20;
pub const DEFAULT_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloaderConfig {
    /// Maximum number of accounts downloaded at the same time.
    pub threads: usize,
    /// Total attempts per account.
    pub retries: u32,
    /// Fixed sleep between two attempts of one account.
    pub backoff: Duration,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Result of one [`ReportDownloader::download_all`] call. Every requested
/// account appears exactly once, either in `successes` or in `failures`.
#[derive(Debug, Default)]
pub struct DownloadBatch {
    pub successes: Vec<DownloadedReport>,
    pub failures: BTreeMap<AccountId, DownloadFailure>,
    pub elapsed: Duration,
}

impl DownloadBatch {
    pub fn failed_ids(&self) -> BTreeSet<AccountId> {
        self.failures.keys().copied().collect()
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// Downloads one report per account with bounded concurrency and retries.
///
/// The worker pool is a semaphore owned by the downloader, so one instance
/// can serve every alert of a run. Call [`ReportDownloader::shutdown`] once
/// no more batches are expected.
pub struct ReportDownloader {
    pool: Arc<Semaphore>,
    policy: RetryPolicy,
}

impl ReportDownloader {
    pub fn new(config: DownloaderConfig) -> Self {
        Self {
            pool: Arc::new(Semaphore::new(config.threads.max(1))),
            policy: RetryPolicy::new(config.retries, Backoff::Fixed(config.backoff)),
        }
    }

    /// Fetches the report of every account in `account_ids` and waits for
    /// all of them before returning.
    pub async fn download_all(
        &self,
        account_ids: &BTreeSet<AccountId>,
        query: &ReportQuery,
        fetcher: Arc<dyn ReportFetcher>,
    ) -> DownloadBatch {
        let start = Instant::now();
        let successes: Arc<Mutex<Vec<DownloadedReport>>> =
            Arc::new(Mutex::new(Vec::with_capacity(account_ids.len())));
        let failures: Arc<Mutex<BTreeMap<AccountId, DownloadFailure>>> =
            Arc::new(Mutex::new(BTreeMap::new()));
        let query = Arc::new(query.clone());

        let mut tasks = Vec::with_capacity(account_ids.len());
        for &account_id in account_ids {
            let pool = Arc::clone(&self.pool);
            let policy = self.policy;
            let fetcher = Arc::clone(&fetcher);
            let query = Arc::clone(&query);
            let successes = Arc::clone(&successes);
            let failures = Arc::clone(&failures);

            let task = tokio::spawn(async move {
                let Ok(_permit) = pool.acquire_owned().await else {
                    lock(&failures).insert(account_id, DownloadFailure::PoolClosed);
                    return;
                };

                let what = format!("report for account {account_id}");
                match policy
                    .run(&what, || fetcher.fetch_report(account_id, &query))
                    .await
                {
                    Ok(payload) => {
                        tracing::debug!(account_id, bytes = payload.len(), "Report downloaded");
                        lock(&successes).push(DownloadedReport {
                            account_id,
                            payload,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(account_id, error = %e, "Report download failed");
                        lock(&failures).insert(account_id, DownloadFailure::Fetch(e));
                    }
                }
            });

            tasks.push((account_id, task));
        }

        // Barrier: every task is joined before the batch is assembled.
        for (account_id, task) in tasks {
            if let Err(e) = task.await {
                tracing::error!(account_id, error = %e, "Download task aborted");
                lock(&failures).insert(
                    account_id,
                    DownloadFailure::Aborted {
                        account_id,
                        reason: e.to_string(),
                    },
                );
            }
        }

        let batch = DownloadBatch {
            successes: std::mem::take(&mut *lock(&successes)),
            failures: std::mem::take(&mut *lock(&failures)),
            elapsed: start.elapsed(),
        };
        log_batch(account_ids.len(), query.as_ref(), &batch);
        batch
    }

    /// Closes the worker pool. Later batches fail every account with
    /// [`DownloadFailure::PoolClosed`].
    pub fn shutdown(&self) {
        self.pool.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Lock a shared aggregate, recovering from a poisoned Mutex if necessary.
fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn log_batch(requested: usize, query: &ReportQuery, batch: &DownloadBatch) {
    tracing::info!(
        report_type = query.report_type(),
        accounts = requested,
        successes = batch.successes.len(),
        failures = batch.failures.len(),
        elapsed_ms = batch.elapsed.as_millis() as u64,
        "Downloaded reports"
    );

    if tracing::enabled!(tracing::Level::DEBUG) {
        for (seq, report) in batch.successes.iter().enumerate() {
            tracing::debug!(
                seq = seq + 1,
                account_id = report.account_id,
                content = %String::from_utf8_lossy(&report.payload),
                "Downloaded report file"
            );
        }
    }

    for (account_id, failure) in &batch.failures {
        tracing::error!(account_id = *account_id, error = %failure, "Report download failure");
    }
}
