use crate::error::ActionError;
use crate::plugin::ActionPlugin;
use crate::AlertAction;
use adwatch_common::ReportRow;
use async_trait::async_trait;
use serde_json::Value;

/// Counts rows and logs the count on finalize.
#[derive(Default)]
pub struct DummyAction {
    rows: usize,
}

#[async_trait]
impl AlertAction for DummyAction {
    fn action_name(&self) -> &str {
        "DummyAlertAction"
    }

    async fn process_row(&mut self, _row: &ReportRow<'_>) -> Result<(), ActionError> {
        self.rows += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), ActionError> {
        tracing::debug!(rows = self.rows, "Dummy alert action finished");
        Ok(())
    }
}

pub struct DummyActionPlugin;

impl ActionPlugin for DummyActionPlugin {
    fn name(&self) -> &str {
        "DummyAlertAction"
    }

    fn validate_config(&self, _config: &Value) -> Result<(), ActionError> {
        Ok(())
    }

    fn create_action(&self, _config: &Value) -> Result<Box<dyn AlertAction>, ActionError> {
        Ok(Box::new(DummyAction::default()))
    }
}
