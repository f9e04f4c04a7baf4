//! Serde shapes of the alert-definition document.
//!
//! The document keeps the tag names of the original reporting tool so that
//! existing alert files load unchanged:
//!
//! ```json
//! {
//!   "Alerts": [{
//!     "Name": "Low impressions",
//!     "ReportQuery": {"ReportType": "ACCOUNT_PERFORMANCE_REPORT",
//!                     "Fields": "ExternalCustomerId,Impressions",
//!                     "TimeRange": "YESTERDAY"},
//!     "Rules": [{"RuleClass": "AddAccountManagerRule"}],
//!     "AlertMessage": "Account {ExternalCustomerId} has {Impressions} impressions",
//!     "Actions": [{"ActionClass": "SimpleConsoleWriter"}]
//!   }]
//! }
//! ```

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlertsFile {
    #[serde(default)]
    pub alerts: Vec<AlertDefinitionConfig>,
}

impl AlertsFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlertDefinitionConfig {
    pub name: String,
    pub report_query: ReportQueryConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    pub alert_message: String,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportQueryConfig {
    pub report_type: String,
    /// Comma-separated field list.
    pub fields: String,
    #[serde(default)]
    pub predicate: Option<String>,
    #[serde(default)]
    pub time_range: Option<String>,
}

/// `{"RuleClass": "...", <rule-specific keys>}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(rename = "RuleClass")]
    pub class: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl RuleConfig {
    pub fn new(class: impl Into<String>, params: Value) -> Self {
        Self {
            class: class.into(),
            params: into_object(params),
        }
    }

    /// Rule-specific keys as a JSON object, without the class tag.
    pub fn params_value(&self) -> Value {
        Value::Object(self.params.clone())
    }
}

/// `{"ActionClass": "...", <action-specific keys>}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    #[serde(rename = "ActionClass")]
    pub class: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ActionConfig {
    pub fn new(class: impl Into<String>, params: Value) -> Self {
        Self {
            class: class.into(),
            params: into_object(params),
        }
    }

    pub fn params_value(&self) -> Value {
        Value::Object(self.params.clone())
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alert_definition_document() {
        let doc = r#"{
          "Alerts": [{
            "Name": "Low impressions",
            "ReportQuery": {
              "ReportType": "ACCOUNT_PERFORMANCE_REPORT",
              "Fields": "ExternalCustomerId,Impressions",
              "Predicate": "Impressions < 100",
              "TimeRange": "YESTERDAY"
            },
            "Rules": [{"RuleClass": "AddField", "Field": "AM", "Value": "am@example.com"}],
            "AlertMessage": "Account {ExternalCustomerId}",
            "Actions": [{"ActionClass": "SimpleLogFileWriter", "LogFilePathname": "/tmp/a.log"}]
          }]
        }"#;
        let file = AlertsFile::from_json_str(doc).unwrap();
        assert_eq!(file.alerts.len(), 1);
        let alert = &file.alerts[0];
        assert_eq!(alert.name, "Low impressions");
        assert_eq!(alert.report_query.predicate.as_deref(), Some("Impressions < 100"));
        assert_eq!(alert.rules[0].class, "AddField");
        assert_eq!(alert.rules[0].params["Field"], "AM");
        assert!(!alert.rules[0].params.contains_key("RuleClass"));
        assert_eq!(alert.actions[0].class, "SimpleLogFileWriter");
        assert_eq!(alert.actions[0].params_value()["LogFilePathname"], "/tmp/a.log");
    }

    #[test]
    fn missing_class_tag_is_rejected() {
        let doc = r#"{"Alerts": [{
            "Name": "x",
            "ReportQuery": {"ReportType": "T", "Fields": "A"},
            "Rules": [{"Field": "AM"}],
            "AlertMessage": "m"
        }]}"#;
        assert!(matches!(
            AlertsFile::from_json_str(doc),
            Err(ConfigError::Json(_))
        ));
    }
}
