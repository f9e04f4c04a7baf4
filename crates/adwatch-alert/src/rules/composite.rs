use crate::error::RuleError;
use crate::plugin::{parse_config, RulePlugin, RuleRegistry};
use crate::AlertRule;
use adwatch_common::config::RuleConfig;
use adwatch_common::ReportRow;
use serde::Deserialize;
use serde_json::Value;

/// Groups several rules into one step.
///
/// Declared fields and row values are the children's, concatenated in order.
/// Children see the row as it was before the composite extended it. A row is
/// removed when any child asks for it; every child is still consulted.
pub struct CompositeRule {
    rules: Vec<Box<dyn AlertRule>>,
}

impl CompositeRule {
    pub fn new(rules: Vec<Box<dyn AlertRule>>) -> Self {
        Self { rules }
    }
}

impl AlertRule for CompositeRule {
    fn name(&self) -> &str {
        "CompositeRule"
    }

    fn new_header_fields(&self) -> Vec<String> {
        self.rules
            .iter()
            .flat_map(|r| r.new_header_fields())
            .collect()
    }

    fn extend_row(&mut self, row: &ReportRow<'_>) -> Vec<String> {
        self.rules
            .iter_mut()
            .flat_map(|r| r.extend_row(row))
            .collect()
    }

    fn should_remove_row(&mut self, row: &ReportRow<'_>) -> bool {
        self.rules
            .iter_mut()
            .fold(false, |remove, r| r.should_remove_row(row) || remove)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CompositeConfig {
    rules: Vec<RuleConfig>,
}

pub struct CompositePlugin;

impl RulePlugin for CompositePlugin {
    fn name(&self) -> &str {
        "CompositeRule"
    }

    fn create_rule(
        &self,
        config: &Value,
        registry: &RuleRegistry,
    ) -> Result<Box<dyn AlertRule>, RuleError> {
        let cfg: CompositeConfig = parse_config(self.name(), config)?;
        if cfg.rules.is_empty() {
            return Err(RuleError::invalid_config(self.name(), "Rules must not be empty"));
        }
        Ok(Box::new(CompositeRule::new(registry.create_rules(&cfg.rules)?)))
    }
}
