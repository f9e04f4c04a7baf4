//! Alert rules and message rendering for downloaded reports.
//!
//! A [`RuleEngine`](engine::RuleEngine) runs an ordered list of
//! [`AlertRule`]s over one [`ReportData`](adwatch_common::ReportData): each
//! rule first extends every row with the columns it declares, then drops the
//! rows it does not want alerted. The [`message`] module then renders the
//! alert text of every surviving row into the `AlertMessage` column.
//!
//! Rules are built by name from configuration through the
//! [`plugin::RuleRegistry`].

pub mod engine;
pub mod error;
pub mod message;
pub mod plugin;
pub mod rules;

#[cfg(test)]
mod tests;

use adwatch_common::ReportRow;

/// A pluggable step that augments and/or filters report rows.
///
/// A fresh instance is created for every report, so implementations may keep
/// state across the rows of that report (running totals, counters) without
/// seeing rows of other reports.
pub trait AlertRule: Send {
    /// Name used in logs and errors (e.g., `"AddAccountManagerRule"`).
    fn name(&self) -> &str;

    /// Header fields this rule appends. Called once per report, before any
    /// row is extended. Fields that already exist in the report are reused
    /// rather than duplicated.
    fn new_header_fields(&self) -> Vec<String> {
        Vec::new()
    }

    /// Values for [`AlertRule::new_header_fields`], in the same count and
    /// order. Called once for every row of the report.
    fn extend_row(&mut self, _row: &ReportRow<'_>) -> Vec<String> {
        Vec::new()
    }

    /// Returns true if the row should be removed from the report. Called once
    /// for every row, after all rows were extended.
    fn should_remove_row(&mut self, _row: &ReportRow<'_>) -> bool {
        false
    }
}
