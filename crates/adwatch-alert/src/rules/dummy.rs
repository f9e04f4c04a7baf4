use crate::error::RuleError;
use crate::plugin::RulePlugin;
use crate::AlertRule;
use serde_json::Value;

/// Keeps every row and adds nothing. Useful to exercise a definition
/// end to end.
pub struct DummyRule;

impl AlertRule for DummyRule {
    fn name(&self) -> &str {
        "DummyAlertRule"
    }
}

pub struct DummyRulePlugin;

impl RulePlugin for DummyRulePlugin {
    fn name(&self) -> &str {
        "DummyAlertRule"
    }

    fn create_rule(
        &self,
        _config: &Value,
        _registry: &crate::plugin::RuleRegistry,
    ) -> Result<Box<dyn AlertRule>, RuleError> {
        Ok(Box::new(DummyRule))
    }
}
