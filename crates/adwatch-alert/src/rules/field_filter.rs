use crate::error::RuleError;
use crate::plugin::{parse_config, RulePlugin, RuleRegistry};
use crate::rules::parse_number;
use crate::AlertRule;
use adwatch_common::ReportRow;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Equal,
    NotEqual,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greater_than" | "gt" => Ok(Self::GreaterThan),
            "less_than" | "lt" => Ok(Self::LessThan),
            "greater_equal" | "gte" => Ok(Self::GreaterEqual),
            "less_equal" | "lte" => Ok(Self::LessEqual),
            "equal" | "eq" => Ok(Self::Equal),
            "not_equal" | "ne" => Ok(Self::NotEqual),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterThan => write!(f, "greater_than"),
            Self::LessThan => write!(f, "less_than"),
            Self::GreaterEqual => write!(f, "greater_equal"),
            Self::LessEqual => write!(f, "less_equal"),
            Self::Equal => write!(f, "equal"),
            Self::NotEqual => write!(f, "not_equal"),
        }
    }
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterEqual => value >= threshold,
            Self::LessEqual => value <= threshold,
            Self::Equal => value == threshold,
            Self::NotEqual => value != threshold,
        }
    }
}

/// Removes rows whose numeric `field` satisfies `operator value`. Rows where
/// the field is missing or not a number are kept.
pub struct FieldFilterRule {
    pub field: String,
    pub operator: CompareOp,
    pub value: f64,
}

impl AlertRule for FieldFilterRule {
    fn name(&self) -> &str {
        "FieldFilter"
    }

    fn should_remove_row(&mut self, row: &ReportRow<'_>) -> bool {
        row.get(&self.field)
            .and_then(parse_number)
            .is_some_and(|v| self.operator.check(v, self.value))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FieldFilterConfig {
    field: String,
    operator: String,
    value: f64,
}

pub struct FieldFilterPlugin;

impl RulePlugin for FieldFilterPlugin {
    fn name(&self) -> &str {
        "FieldFilter"
    }

    fn create_rule(
        &self,
        config: &Value,
        _registry: &RuleRegistry,
    ) -> Result<Box<dyn AlertRule>, RuleError> {
        let cfg: FieldFilterConfig = parse_config(self.name(), config)?;
        let operator = cfg
            .operator
            .parse::<CompareOp>()
            .map_err(|e| RuleError::invalid_config(self.name(), e))?;
        Ok(Box::new(FieldFilterRule {
            field: cfg.field,
            operator,
            value: cfg.value,
        }))
    }
}
