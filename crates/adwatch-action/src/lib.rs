//! Output actions for processed alert reports.
//!
//! Every [`AlertAction`] goes through one lifecycle per alert definition:
//! [`AlertAction::initialize`], then [`AlertAction::process_row`] for every
//! row of every processed report, then [`AlertAction::finalize`]. The
//! [`dispatcher::ActionDispatcher`] runs actions one after another and keeps
//! a failing action from affecting the others.

pub mod actions;
pub mod dispatcher;
pub mod error;
pub mod plugin;


use adwatch_common::ReportRow;
use async_trait::async_trait;
use error::ActionError;

/// A consumer of alert rows with an external side effect (console, log file,
/// email, database).
///
/// Implementations are created by the matching [`plugin::ActionPlugin`].
/// Rows are read-only views; actions must not keep them past the call.
#[async_trait]
pub trait AlertAction: Send {
    /// Returns the action class name (e.g., `"SimpleLogFileWriter"`).
    fn action_name(&self) -> &str;

    /// Prepares the action before the first row (open files, connections).
    async fn initialize(&mut self) -> Result<(), ActionError> {
        Ok(())
    }

    /// Consumes one alert row.
    async fn process_row(&mut self, row: &ReportRow<'_>) -> Result<(), ActionError>;

    /// Flushes and releases whatever the action holds. Called even when an
    /// earlier step of the same action failed.
    async fn finalize(&mut self) -> Result<(), ActionError> {
        Ok(())
    }
}

/// Alert message of `row`, or an empty string if the row was never rendered.
pub(crate) fn alert_message<'a>(row: &ReportRow<'a>) -> &'a str {
    row.get(adwatch_common::ALERT_MESSAGE_FIELD).unwrap_or_default()
}

/// Local time in the `yyyy/MM/dd HH:mm` form used in action banners.
pub(crate) fn banner_time() -> String {
    chrono::Local::now().format("%Y/%m/%d %H:%M").to_string()
}
