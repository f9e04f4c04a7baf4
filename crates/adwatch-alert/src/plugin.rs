use crate::error::RuleError;
use crate::AlertRule;
use adwatch_common::config::RuleConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Factory for creating [`AlertRule`] instances from JSON configuration.
///
/// Each plugin is registered in the [`RuleRegistry`] under its `name()`, the
/// value of `RuleClass` in an alert definition.
pub trait RulePlugin: Send + Sync {
    /// Returns the rule class name (e.g., `"AddAccountManagerRule"`).
    fn name(&self) -> &str;

    /// Creates a fresh rule instance. `registry` resolves nested rule
    /// configurations for rules that wrap other rules.
    fn create_rule(
        &self,
        config: &Value,
        registry: &RuleRegistry,
    ) -> Result<Box<dyn AlertRule>, RuleError>;

    /// Checks `config` without keeping the rule around.
    fn validate_config(&self, config: &Value, registry: &RuleRegistry) -> Result<(), RuleError> {
        self.create_rule(config, registry).map(drop)
    }
}

/// Registry of available [`RulePlugin`]s.
///
/// # Examples
///
/// ```
/// use adwatch_alert::plugin::RuleRegistry;
///
/// let registry = RuleRegistry::default();
/// assert!(registry.has_plugin("AddAccountManagerRule"));
/// assert!(registry.has_plugin("FieldFilter"));
/// assert!(!registry.has_plugin("nonexistent"));
/// ```
pub struct RuleRegistry {
    plugins: HashMap<String, Box<dyn RulePlugin>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn RulePlugin>) {
        let name = plugin.name().to_string();
        self.plugins.insert(name, plugin);
    }

    pub fn create_rule(&self, config: &RuleConfig) -> Result<Box<dyn AlertRule>, RuleError> {
        self.plugin(&config.class)?
            .create_rule(&config.params_value(), self)
    }

    pub fn validate_config(&self, config: &RuleConfig) -> Result<(), RuleError> {
        self.plugin(&config.class)?
            .validate_config(&config.params_value(), self)
    }

    /// Builds every rule in `configs`, preserving their order.
    pub fn create_rules(&self, configs: &[RuleConfig]) -> Result<Vec<Box<dyn AlertRule>>, RuleError> {
        configs.iter().map(|c| self.create_rule(c)).collect()
    }

    pub fn has_plugin(&self, class: &str) -> bool {
        self.plugins.contains_key(class)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.keys().map(|s| s.as_str()).collect()
    }

    fn plugin(&self, class: &str) -> Result<&dyn RulePlugin, RuleError> {
        self.plugins
            .get(class)
            .map(|p| p.as_ref())
            .ok_or_else(|| RuleError::UnknownRuleClass(class.to_string()))
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        use crate::rules::*;

        let mut registry = Self::new();
        registry.register(Box::new(dummy::DummyRulePlugin));
        registry.register(Box::new(add_field::AddFieldPlugin));
        registry.register(Box::new(account_manager::AccountManagerPlugin));
        registry.register(Box::new(monthly_budget::MonthlyBudgetPlugin));
        registry.register(Box::new(field_filter::FieldFilterPlugin));
        registry.register(Box::new(running_total::RunningTotalPlugin));
        registry.register(Box::new(composite::CompositePlugin));
        registry
    }
}

/// Deserializes a rule's parameters, mapping failures to
/// [`RuleError::InvalidConfig`].
pub fn parse_config<T: DeserializeOwned>(rule: &str, config: &Value) -> Result<T, RuleError> {
    serde_json::from_value(config.clone()).map_err(|e| RuleError::invalid_config(rule, e))
}
