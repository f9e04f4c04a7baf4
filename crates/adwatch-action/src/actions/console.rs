use crate::error::ActionError;
use crate::plugin::ActionPlugin;
use crate::{alert_message, banner_time, AlertAction};
use adwatch_common::ReportRow;
use async_trait::async_trait;
use serde_json::Value;
use std::io::Write;

/// Prints alert messages, one per line, under a timestamped header.
pub struct ConsoleWriter {
    sink: Box<dyn Write + Send>,
}

impl ConsoleWriter {
    pub fn stdout() -> Self {
        Self::with_sink(Box::new(std::io::stdout()))
    }

    pub fn with_sink(sink: Box<dyn Write + Send>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl AlertAction for ConsoleWriter {
    fn action_name(&self) -> &str {
        "SimpleConsoleWriter"
    }

    async fn initialize(&mut self) -> Result<(), ActionError> {
        writeln!(self.sink, "Alerts generated at {}:", banner_time())?;
        Ok(())
    }

    async fn process_row(&mut self, row: &ReportRow<'_>) -> Result<(), ActionError> {
        writeln!(self.sink, "{}", alert_message(row))?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), ActionError> {
        writeln!(self.sink)?;
        writeln!(self.sink)?;
        self.sink.flush()?;
        Ok(())
    }
}

pub struct ConsoleWriterPlugin;

impl ActionPlugin for ConsoleWriterPlugin {
    fn name(&self) -> &str {
        "SimpleConsoleWriter"
    }

    fn validate_config(&self, _config: &Value) -> Result<(), ActionError> {
        Ok(())
    }

    fn create_action(&self, _config: &Value) -> Result<Box<dyn AlertAction>, ActionError> {
        Ok(Box::new(ConsoleWriter::stdout()))
    }
}
