use crate::error::RuleError;
use crate::AlertRule;
use adwatch_common::ReportData;

/// Applies an ordered list of rules to one report.
///
/// For each rule in turn: every row is extended with the rule's declared
/// fields, then the rows the rule rejects are removed. Rule N+1 sees the
/// columns added and the rows kept by rules 1..=N.
pub struct RuleEngine {
    rules: Vec<Box<dyn AlertRule>>,
}

impl RuleEngine {
    pub fn new(rules: Vec<Box<dyn AlertRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&mut self, report: &mut ReportData) -> Result<(), RuleError> {
        for rule in &mut self.rules {
            let before = report.row_count();
            extend_report(rule.as_mut(), report)?;
            filter_report(rule.as_mut(), report);
            tracing::debug!(
                alert = report.alert_name(),
                rule = rule.name(),
                rows_before = before,
                rows_after = report.row_count(),
                "Applied alert rule"
            );
        }
        Ok(())
    }
}

fn extend_report(rule: &mut dyn AlertRule, report: &mut ReportData) -> Result<(), RuleError> {
    let indices: Vec<usize> = rule
        .new_header_fields()
        .iter()
        .map(|field| report.append_field(field))
        .collect();

    report.try_for_each_row_mut(|row_index, mut row| {
        let values = rule.extend_row(&row.as_row());
        if values.len() != indices.len() {
            return Err(RuleError::MalformedRule {
                rule: rule.name().to_string(),
                row: row_index,
                expected: indices.len(),
                actual: values.len(),
            });
        }
        for (&index, value) in indices.iter().zip(values) {
            // A declared field that already existed is overwritten in place.
            row.put(index, value);
        }
        Ok(())
    })?;

    report
        .check_consistency()
        .map_err(|source| RuleError::Inconsistent {
            rule: rule.name().to_string(),
            source,
        })
}

fn filter_report(rule: &mut dyn AlertRule, report: &mut ReportData) {
    report.retain_rows(|row| !rule.should_remove_row(row));
}
