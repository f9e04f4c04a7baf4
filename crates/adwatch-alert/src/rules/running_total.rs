use crate::error::RuleError;
use crate::plugin::{parse_config, RulePlugin, RuleRegistry};
use crate::rules::{format_number, parse_number};
use crate::AlertRule;
use adwatch_common::ReportRow;
use serde::Deserialize;
use serde_json::Value;

/// Appends the cumulative sum of `source_field` over the rows seen so far.
/// Non-numeric cells contribute nothing.
pub struct RunningTotalRule {
    pub source_field: String,
    pub field: String,
    total: f64,
}

impl RunningTotalRule {
    pub fn new(source_field: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            field: field.into(),
            total: 0.0,
        }
    }
}

impl AlertRule for RunningTotalRule {
    fn name(&self) -> &str {
        "RunningTotal"
    }

    fn new_header_fields(&self) -> Vec<String> {
        vec![self.field.clone()]
    }

    fn extend_row(&mut self, row: &ReportRow<'_>) -> Vec<String> {
        if let Some(value) = row.get(&self.source_field).and_then(parse_number) {
            self.total += value;
        }
        vec![format_number(self.total)]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunningTotalConfig {
    source_field: String,
    field: String,
}

pub struct RunningTotalPlugin;

impl RulePlugin for RunningTotalPlugin {
    fn name(&self) -> &str {
        "RunningTotal"
    }

    fn create_rule(
        &self,
        config: &Value,
        _registry: &RuleRegistry,
    ) -> Result<Box<dyn AlertRule>, RuleError> {
        let cfg: RunningTotalConfig = parse_config(self.name(), config)?;
        if cfg.field == cfg.source_field {
            return Err(RuleError::invalid_config(
                self.name(),
                "Field must differ from SourceField",
            ));
        }
        Ok(Box::new(RunningTotalRule::new(cfg.source_field, cfg.field)))
    }
}
