use crate::error::{PipelineError, Result};
use adwatch_action::plugin::ActionRegistry;
use adwatch_alert::message::MessageTemplate;
use adwatch_alert::plugin::RuleRegistry;
use adwatch_common::config::{ActionConfig, AlertDefinitionConfig, AlertsFile, RuleConfig};
use adwatch_common::ReportQuery;
use std::path::Path;
use std::sync::Arc;

/// A validated alert definition, immutable for the rest of the run.
///
/// Rule and action configurations are kept rather than instances: rules are
/// built fresh for every report, actions right before dispatch.
#[derive(Debug, Clone)]
pub struct AlertDefinition {
    pub name: String,
    pub query: ReportQuery,
    pub rules: Vec<RuleConfig>,
    pub template: MessageTemplate,
    pub actions: Vec<ActionConfig>,
}

impl AlertDefinition {
    /// Validates `config`: query shape, message template syntax, every rule
    /// and every action configuration. Any failure rejects the definition.
    pub fn from_config(
        config: &AlertDefinitionConfig,
        rules: &RuleRegistry,
        actions: &ActionRegistry,
    ) -> Result<Self> {
        let query = ReportQuery::try_from(&config.report_query)?;
        let template = MessageTemplate::parse(&config.alert_message)
            .map_err(|e| PipelineError::configuration(format!("AlertMessage: {e}")))?;
        for rule in &config.rules {
            rules
                .validate_config(rule)
                .map_err(PipelineError::configuration)?;
        }
        for action in &config.actions {
            actions
                .validate_config(action)
                .map_err(PipelineError::configuration)?;
        }

        Ok(Self {
            name: config.name.clone(),
            query,
            rules: config.rules.clone(),
            template,
            actions: config.actions.clone(),
        })
    }
}

/// Result of loading an alerts file: the accepted definitions and, for each
/// rejected one, its name and the reason.
#[derive(Debug, Default)]
pub struct LoadedDefinitions {
    pub definitions: Vec<Arc<AlertDefinition>>,
    pub rejected: Vec<(String, PipelineError)>,
}

impl LoadedDefinitions {
    /// Reads and validates every definition of `path`. A file that is not
    /// valid JSON fails as a whole; a single bad definition is only skipped.
    pub fn load(path: &Path, rules: &RuleRegistry, actions: &ActionRegistry) -> Result<Self> {
        let file = AlertsFile::load(path)?;
        Ok(Self::from_file(&file, rules, actions))
    }

    pub fn from_file(file: &AlertsFile, rules: &RuleRegistry, actions: &ActionRegistry) -> Self {
        let mut loaded = Self::default();
        for config in &file.alerts {
            match AlertDefinition::from_config(config, rules, actions) {
                Ok(definition) => loaded.definitions.push(Arc::new(definition)),
                Err(e) => {
                    tracing::error!(alert = %config.name, error = %e, "Rejected alert definition");
                    loaded.rejected.push((config.name.clone(), e));
                }
            }
        }
        loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registries() -> (RuleRegistry, ActionRegistry) {
        (RuleRegistry::default(), ActionRegistry::default())
    }

    #[test]
    fn invalid_definitions_are_rejected_at_load_time() {
        let file = AlertsFile::from_json_str(
            r#"{"Alerts": [
                {"Name": "ok",
                 "ReportQuery": {"ReportType": "ACCOUNT_PERFORMANCE_REPORT", "Fields": "ExternalCustomerId,Cost"},
                 "Rules": [{"RuleClass": "DummyAlertRule"}],
                 "AlertMessage": "Account {ExternalCustomerId}",
                 "Actions": [{"ActionClass": "SimpleConsoleWriter"}]},
                {"Name": "unknown rule",
                 "ReportQuery": {"ReportType": "ACCOUNT_PERFORMANCE_REPORT", "Fields": "Cost"},
                 "Rules": [{"RuleClass": "NoSuchRule"}],
                 "AlertMessage": "x",
                 "Actions": []},
                {"Name": "unknown action",
                 "ReportQuery": {"ReportType": "ACCOUNT_PERFORMANCE_REPORT", "Fields": "Cost"},
                 "Rules": [],
                 "AlertMessage": "x",
                 "Actions": [{"ActionClass": "Pager"}]},
                {"Name": "bad template",
                 "ReportQuery": {"ReportType": "ACCOUNT_PERFORMANCE_REPORT", "Fields": "Cost"},
                 "Rules": [],
                 "AlertMessage": "Account {",
                 "Actions": []},
                {"Name": "empty fields",
                 "ReportQuery": {"ReportType": "ACCOUNT_PERFORMANCE_REPORT", "Fields": " "},
                 "Rules": [],
                 "AlertMessage": "x",
                 "Actions": []}
            ]}"#,
        )
        .unwrap();
        let (rules, actions) = registries();
        let loaded = LoadedDefinitions::from_file(&file, &rules, &actions);

        assert_eq!(loaded.definitions.len(), 1);
        assert_eq!(loaded.definitions[0].name, "ok");
        let rejected: Vec<&str> = loaded.rejected.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            rejected,
            vec!["unknown rule", "unknown action", "bad template", "empty fields"]
        );
        assert!(loaded
            .rejected
            .iter()
            .all(|(_, e)| matches!(e, PipelineError::Configuration(_))));
    }
}
