use crate::error::ActionError;
use crate::plugin::{parse_config, ActionPlugin};
use crate::{alert_message, AlertAction};
use adwatch_common::types::parse_account_id;
use adwatch_common::ReportRow;
use async_trait::async_trait;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

/// Rows inserted per committed transaction.
const BATCH_INSERTION_SIZE: usize = 100;

pub const ALERTS_TABLE: &str = "report_alerts";

const ALERTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS report_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    account_id INTEGER,
    account_descriptive_name TEXT,
    account_manager_name TEXT,
    account_manager_email TEXT,
    alert_message TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_report_alerts_account_id ON report_alerts(account_id);
";

const INSERT_ALERT: &str = "INSERT INTO report_alerts
    (timestamp, account_id, account_descriptive_name, account_manager_name, account_manager_email, alert_message)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// Persists alert rows into a SQLite database, committing in batches.
pub struct SqlPersister {
    path: PathBuf,
    conn: Option<Connection>,
    pending: usize,
}

impl SqlPersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            conn: None,
            pending: 0,
        }
    }

    fn conn(&self) -> Result<&Connection, ActionError> {
        self.conn
            .as_ref()
            .ok_or_else(|| ActionError::NotInitialized("SQLDBPersister".to_string()))
    }
}

#[async_trait]
impl AlertAction for SqlPersister {
    fn action_name(&self) -> &str {
        "SQLDBPersister"
    }

    async fn initialize(&mut self) -> Result<(), ActionError> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(ALERTS_SCHEMA)?;
        conn.execute_batch("BEGIN")?;
        tracing::info!(database = %self.path.display(), "Persisting alerts to database");
        self.conn = Some(conn);
        self.pending = 0;
        Ok(())
    }

    async fn process_row(&mut self, row: &ReportRow<'_>) -> Result<(), ActionError> {
        let now = chrono::Utc::now().to_rfc3339();
        let account_id = row
            .get("ExternalCustomerId")
            .and_then(|id| parse_account_id(id).ok())
            .and_then(|id| i64::try_from(id).ok());

        let conn = self.conn()?;
        conn.prepare_cached(INSERT_ALERT)?.execute(rusqlite::params![
            now,
            account_id,
            row.get("AccountDescriptiveName"),
            row.get("AccountManagerName"),
            row.get("AccountManagerEmail"),
            alert_message(row),
        ])?;

        self.pending += 1;
        if self.pending >= BATCH_INSERTION_SIZE {
            self.conn()?.execute_batch("COMMIT; BEGIN")?;
            self.pending = 0;
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), ActionError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.execute_batch("COMMIT")?;
        self.pending = 0;
        conn.close().map_err(|(_, e)| ActionError::Database(e))?;
        tracing::info!(database = %self.path.display(), "Finished persisting alerts");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SqlPersisterConfig {
    database_path: String,
}

pub struct SqlPersisterPlugin;

impl ActionPlugin for SqlPersisterPlugin {
    fn name(&self) -> &str {
        "SQLDBPersister"
    }

    fn validate_config(&self, config: &Value) -> Result<(), ActionError> {
        let cfg: SqlPersisterConfig = parse_config(self.name(), config)?;
        if cfg.database_path.trim().is_empty() {
            return Err(ActionError::invalid_config(
                self.name(),
                "DatabasePath must not be empty",
            ));
        }
        Ok(())
    }

    fn create_action(&self, config: &Value) -> Result<Box<dyn AlertAction>, ActionError> {
        let cfg: SqlPersisterConfig = parse_config(self.name(), config)?;
        Ok(Box::new(SqlPersister::new(cfg.database_path)))
    }

    fn path_params(&self) -> &[&str] {
        &["DatabasePath"]
    }
}
