use crate::config::ReportQueryConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of one reportable account under the top-level account.
pub type AccountId = u64;

/// Parses an account id, accepting the dashed `123-456-7890` display form.
///
/// # Examples
///
/// ```
/// use adwatch_common::types::parse_account_id;
///
/// assert_eq!(parse_account_id("123-456-7890").unwrap(), 1234567890);
/// assert!(parse_account_id("abc").is_err());
/// ```
pub fn parse_account_id(raw: &str) -> Result<AccountId, ConfigError> {
    let digits: String = raw.trim().chars().filter(|c| *c != '-').collect();
    digits
        .parse()
        .map_err(|_| ConfigError::InvalidAccountId(raw.trim().to_string()))
}

/// A report query: report type, projected fields, optional predicate and
/// optional time range. Immutable once built.
///
/// # Examples
///
/// ```
/// use adwatch_common::ReportQuery;
///
/// let query = ReportQuery::new("ACCOUNT_PERFORMANCE_REPORT", ["ExternalCustomerId", "Cost"])
///     .with_time_range("LAST_7_DAYS");
/// assert_eq!(
///     query.generate_query(),
///     "SELECT ExternalCustomerId,Cost FROM ACCOUNT_PERFORMANCE_REPORT DURING LAST_7_DAYS"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    report_type: String,
    fields: Vec<String>,
    predicate: Option<String>,
    time_range: Option<String>,
}

impl ReportQuery {
    pub fn new<I, S>(report_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            report_type: report_type.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            predicate: None,
            time_range: None,
        }
    }

    pub fn with_predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn with_time_range(mut self, time_range: impl Into<String>) -> Self {
        self.time_range = Some(time_range.into());
        self
    }

    pub fn report_type(&self) -> &str {
        &self.report_type
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    pub fn time_range(&self) -> Option<&str> {
        self.time_range.as_deref()
    }

    /// Renders the query-language form. Absent clauses are omitted entirely.
    pub fn generate_query(&self) -> String {
        let mut query = format!("SELECT {} FROM {}", self.fields.join(","), self.report_type);
        if let Some(predicate) = &self.predicate {
            query.push_str(" WHERE ");
            query.push_str(predicate);
        }
        if let Some(time_range) = &self.time_range {
            query.push_str(" DURING ");
            query.push_str(time_range);
        }
        query
    }
}

impl std::fmt::Display for ReportQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.generate_query())
    }
}

impl TryFrom<&ReportQueryConfig> for ReportQuery {
    type Error = ConfigError;

    fn try_from(config: &ReportQueryConfig) -> Result<Self, Self::Error> {
        let report_type = config.report_type.trim();
        if report_type.is_empty() {
            return Err(ConfigError::MissingValue("ReportType"));
        }

        let fields: Vec<&str> = config
            .fields
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();
        if fields.is_empty() {
            return Err(ConfigError::MissingValue("Fields"));
        }

        let non_blank = |s: &Option<String>| {
            s.as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            report_type: report_type.to_string(),
            fields: fields.into_iter().map(str::to_string).collect(),
            predicate: non_blank(&config.predicate),
            time_range: non_blank(&config.time_range),
        })
    }
}

/// One entry of a report type's field catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FieldDefinition {
    pub display_name: String,
    pub field_name: String,
}

impl FieldDefinition {
    pub fn new(display_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            field_name: field_name.into(),
        }
    }
}

/// Display column name -> machine field name, for one report type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    report_type: String,
    fields: HashMap<String, String>,
}

impl FieldMapping {
    pub fn from_definitions<I>(report_type: impl Into<String>, definitions: I) -> Self
    where
        I: IntoIterator<Item = FieldDefinition>,
    {
        Self {
            report_type: report_type.into(),
            fields: definitions
                .into_iter()
                .map(|d| (d.display_name, d.field_name))
                .collect(),
        }
    }

    pub fn report_type(&self) -> &str {
        &self.report_type
    }

    /// Resolves a display column name to its machine field name.
    pub fn field_name(&self, display_name: &str) -> Option<&str> {
        self.fields.get(display_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
