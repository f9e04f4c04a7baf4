use crate::error::ActionError;
use crate::plugin::{parse_config, ActionPlugin};
use crate::{alert_message, banner_time, AlertAction};
use adwatch_common::ReportRow;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Lines written between two explicit flushes.
const LINES_TO_FLUSH: usize = 100;

/// Appends alert messages to a log file, framed by begin/end banners.
pub struct LogFileWriter {
    path: PathBuf,
    append: bool,
    writer: Option<BufWriter<File>>,
    unflushed: usize,
}

impl LogFileWriter {
    pub fn new(path: impl Into<PathBuf>, append: bool) -> Self {
        Self {
            path: path.into(),
            append,
            writer: None,
            unflushed: 0,
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ActionError> {
        self.writer
            .as_mut()
            .ok_or_else(|| ActionError::NotInitialized("SimpleLogFileWriter".to_string()))
    }
}

#[async_trait]
impl AlertAction for LogFileWriter {
    fn action_name(&self) -> &str {
        "SimpleLogFileWriter"
    }

    async fn initialize(&mut self) -> Result<(), ActionError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .open(&self.path)
            .await?;
        tracing::info!(file = %self.path.display(), "Writing alerts to log file");

        let mut writer = BufWriter::new(file);
        let banner = format!(
            "===== Begin of this run =====\nAlerts generated at {}:\n",
            banner_time()
        );
        writer.write_all(banner.as_bytes()).await?;
        self.writer = Some(writer);
        self.unflushed = 0;
        Ok(())
    }

    async fn process_row(&mut self, row: &ReportRow<'_>) -> Result<(), ActionError> {
        let line = format!("{}\n", alert_message(row));
        let writer = self.writer()?;
        writer.write_all(line.as_bytes()).await?;

        self.unflushed += 1;
        if self.unflushed >= LINES_TO_FLUSH {
            self.writer()?.flush().await?;
            self.unflushed = 0;
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), ActionError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.write_all(b"===== End of this run =====\n\n\n").await?;
        writer.flush().await?;
        writer.into_inner().sync_all().await?;
        tracing::info!(file = %self.path.display(), "Finished writing alerts to log file");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LogFileConfig {
    log_file_pathname: String,
    append_mode: Option<bool>,
}

pub struct LogFileWriterPlugin;

impl ActionPlugin for LogFileWriterPlugin {
    fn name(&self) -> &str {
        "SimpleLogFileWriter"
    }

    fn validate_config(&self, config: &Value) -> Result<(), ActionError> {
        let cfg: LogFileConfig = parse_config(self.name(), config)?;
        if cfg.log_file_pathname.trim().is_empty() {
            return Err(ActionError::invalid_config(
                self.name(),
                "LogFilePathname must not be empty",
            ));
        }
        Ok(())
    }

    fn create_action(&self, config: &Value) -> Result<Box<dyn AlertAction>, ActionError> {
        let cfg: LogFileConfig = parse_config(self.name(), config)?;
        Ok(Box::new(LogFileWriter::new(
            cfg.log_file_pathname,
            cfg.append_mode.unwrap_or(true),
        )))
    }

    fn path_params(&self) -> &[&str] {
        &["LogFilePathname"]
    }
}
