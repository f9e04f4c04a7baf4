use crate::error::ActionError;
use crate::AlertAction;
use adwatch_common::config::ActionConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Factory for creating [`AlertAction`] instances from JSON configuration.
///
/// Each plugin is registered in the [`ActionRegistry`] under its `name()`,
/// the value of `ActionClass` in an alert definition.
pub trait ActionPlugin: Send + Sync {
    /// Returns the action class name (e.g., `"SQLDBPersister"`).
    fn name(&self) -> &str;

    /// Validates a JSON config blob against this plugin's expected schema
    /// without touching any external resource.
    fn validate_config(&self, config: &Value) -> Result<(), ActionError>;

    /// Creates an action instance from a validated JSON config.
    fn create_action(&self, config: &Value) -> Result<Box<dyn AlertAction>, ActionError>;

    /// Config keys holding filesystem paths. Relative values are resolved
    /// against the registry's base directory, when one is set.
    fn path_params(&self) -> &[&str] {
        &[]
    }
}

/// Registry of available [`ActionPlugin`]s.
///
/// # Examples
///
/// ```
/// use adwatch_action::plugin::ActionRegistry;
///
/// let registry = ActionRegistry::default();
/// assert!(registry.has_plugin("SimpleConsoleWriter"));
/// assert!(registry.has_plugin("LogFileWriter"));
/// assert!(!registry.has_plugin("nonexistent"));
/// ```
pub struct ActionRegistry {
    plugins: HashMap<String, Box<dyn ActionPlugin>>,
    aliases: HashMap<String, String>,
    base_dir: Option<PathBuf>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            aliases: HashMap::new(),
            base_dir: None,
        }
    }

    /// Resolves relative output paths of created actions against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn register(&mut self, plugin: Box<dyn ActionPlugin>) {
        let name = plugin.name().to_string();
        self.plugins.insert(name, plugin);
    }

    /// Makes `alias` resolve to the plugin registered as `target`.
    pub fn register_alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    pub fn validate_config(&self, config: &ActionConfig) -> Result<(), ActionError> {
        self.plugin(&config.class)?
            .validate_config(&config.params_value())
    }

    pub fn create_action(&self, config: &ActionConfig) -> Result<Box<dyn AlertAction>, ActionError> {
        let plugin = self.plugin(&config.class)?;
        let params = self.resolve_paths(plugin, config.params_value());
        plugin.validate_config(&params)?;
        plugin.create_action(&params)
    }

    pub fn has_plugin(&self, class: &str) -> bool {
        self.plugin(class).is_ok()
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins
            .keys()
            .chain(self.aliases.keys())
            .map(|s| s.as_str())
            .collect()
    }

    fn resolve_paths(&self, plugin: &dyn ActionPlugin, mut params: Value) -> Value {
        let Some(base) = &self.base_dir else {
            return params;
        };
        for key in plugin.path_params() {
            if let Some(Value::String(path)) = params.get_mut(*key) {
                if !path.trim().is_empty() && Path::new(path.as_str()).is_relative() {
                    let resolved = base.join(path.as_str());
                    *path = resolved.display().to_string();
                }
            }
        }
        params
    }

    fn plugin(&self, class: &str) -> Result<&dyn ActionPlugin, ActionError> {
        let name = self.aliases.get(class).map(String::as_str).unwrap_or(class);
        self.plugins
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| ActionError::UnknownActionClass(class.to_string()))
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        use crate::actions::*;

        let mut registry = Self::new();
        registry.register(Box::new(dummy::DummyActionPlugin));
        registry.register(Box::new(console::ConsoleWriterPlugin));
        registry.register(Box::new(log_file::LogFileWriterPlugin));
        registry.register(Box::new(email::EmailSenderPlugin));
        registry.register(Box::new(sqlite::SqlPersisterPlugin));
        registry.register_alias("LogFileWriter", "SimpleLogFileWriter");
        registry.register_alias("PerAccountManagerEmailSender", "EmailSender");
        registry
    }
}

/// Deserializes an action's parameters, mapping failures to
/// [`ActionError::InvalidConfig`].
pub fn parse_config<T: DeserializeOwned>(action: &str, config: &Value) -> Result<T, ActionError> {
    serde_json::from_value(config.clone()).map_err(|e| ActionError::invalid_config(action, e))
}
