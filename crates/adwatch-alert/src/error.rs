use adwatch_common::error::ReportError;

/// Errors raised while building or applying alert rules.
///
/// # Examples
///
/// ```rust
/// use adwatch_alert::error::RuleError;
///
/// let err = RuleError::UnknownRuleClass("NoSuchRule".to_string());
/// assert!(err.to_string().contains("NoSuchRule"));
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleError {
    /// No rule is registered under this class name.
    #[error("Rule: unknown rule class '{0}'")]
    UnknownRuleClass(String),

    /// The rule's configuration object is missing keys or has bad values.
    #[error("Rule: invalid configuration for {rule}: {reason}")]
    InvalidConfig { rule: String, reason: String },

    /// A rule produced a different number of values than it declared fields.
    #[error("Rule: {rule} returned {actual} values for {expected} declared fields (row {row})")]
    MalformedRule {
        rule: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// The report no longer satisfies its shape invariants after a rule ran.
    #[error("Rule: {rule} left the report inconsistent: {source}")]
    Inconsistent {
        rule: String,
        #[source]
        source: ReportError,
    },
}

impl RuleError {
    pub fn invalid_config(rule: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidConfig {
            rule: rule.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by alert-message templates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Unmatched braces, an empty name, or a name with non-word characters.
    #[error("Template: malformed placeholder at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },

    /// The placeholder names a field the report does not have.
    #[error("Template: placeholder {{{name}}} is not a field of the report")]
    UnresolvedPlaceholder { name: String },
}
