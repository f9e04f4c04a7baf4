use crate::error::RuleError;
use crate::plugin::{parse_config, RulePlugin, RuleRegistry};
use crate::AlertRule;
use adwatch_common::ReportRow;
use serde::Deserialize;
use serde_json::Value;

/// Adds one constant-valued field to every row.
pub struct AddFieldRule {
    pub field: String,
    pub value: String,
}

impl AlertRule for AddFieldRule {
    fn name(&self) -> &str {
        "AddField"
    }

    fn new_header_fields(&self) -> Vec<String> {
        vec![self.field.clone()]
    }

    fn extend_row(&mut self, _row: &ReportRow<'_>) -> Vec<String> {
        vec![self.value.clone()]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddFieldConfig {
    field: String,
    #[serde(default)]
    value: String,
}

pub struct AddFieldPlugin;

impl RulePlugin for AddFieldPlugin {
    fn name(&self) -> &str {
        "AddField"
    }

    fn create_rule(
        &self,
        config: &Value,
        _registry: &RuleRegistry,
    ) -> Result<Box<dyn AlertRule>, RuleError> {
        let cfg: AddFieldConfig = parse_config(self.name(), config)?;
        if cfg.field.trim().is_empty() {
            return Err(RuleError::invalid_config(self.name(), "Field must not be empty"));
        }
        Ok(Box::new(AddFieldRule {
            field: cfg.field,
            value: cfg.value,
        }))
    }
}
