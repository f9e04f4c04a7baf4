use crate::error::FieldMappingError;
use crate::retry::{Backoff, RetryPolicy};
use crate::FieldDefinitionSource;
use adwatch_common::FieldMapping;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Per-report-type cache of display-name -> field-name mappings.
///
/// A mapping is fetched at most once per cache instance; later lookups for
/// the same report type are served from memory. The cache is an ordinary
/// value, so each run (or test) owns its own.
pub struct FieldMappingCache {
    source: Arc<dyn FieldDefinitionSource>,
    policy: RetryPolicy,
    mappings: Mutex<HashMap<String, Arc<FieldMapping>>>,
}

impl FieldMappingCache {
    pub fn new(source: Arc<dyn FieldDefinitionSource>) -> Self {
        Self::with_policy(
            source,
            RetryPolicy::new(DEFAULT_RETRIES, Backoff::Linear(DEFAULT_BACKOFF)),
        )
    }

    pub fn with_policy(source: Arc<dyn FieldDefinitionSource>, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            mappings: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the mapping for `report_type`, fetching it on first use.
    ///
    /// The lock is held across the fetch so concurrent callers for the same
    /// type wait for the first fetch instead of issuing their own.
    pub async fn get_mapping(
        &self,
        report_type: &str,
    ) -> Result<Arc<FieldMapping>, FieldMappingError> {
        let mut mappings = self.mappings.lock().await;
        if let Some(mapping) = mappings.get(report_type) {
            return Ok(Arc::clone(mapping));
        }

        let definitions = self
            .policy
            .run("field definitions", || {
                self.source.fetch_field_definitions(report_type)
            })
            .await
            .map_err(|source| FieldMappingError {
                report_type: report_type.to_string(),
                source,
            })?;

        tracing::info!(
            report_type,
            fields = definitions.len(),
            "Downloaded report field definitions"
        );

        let mapping = Arc::new(FieldMapping::from_definitions(report_type, definitions));
        mappings.insert(report_type.to_string(), Arc::clone(&mapping));
        Ok(mapping)
    }

    /// Number of report types resolved so far.
    pub async fn len(&self) -> usize {
        self.mappings.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.mappings.lock().await.is_empty()
    }
}
