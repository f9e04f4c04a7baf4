use crate::error::ActionError;
use crate::plugin::ActionRegistry;
use crate::AlertAction;
use adwatch_common::config::ActionConfig;
use adwatch_common::ReportData;

/// Outcome of one action's lifecycle.
#[derive(Debug)]
pub struct ActionSummary {
    pub action: String,
    /// Rows handed to `process_row` successfully.
    pub rows: usize,
    /// First error raised by the action, if any.
    pub error: Option<ActionError>,
}

impl ActionSummary {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs actions over the processed reports of one alert definition.
///
/// Actions run sequentially: one action's initialize, row and finalize
/// phases all complete before the next action starts. A failing action is
/// logged and recorded in its summary; the remaining actions still run.
pub struct ActionDispatcher;

impl ActionDispatcher {
    pub async fn dispatch(
        actions: Vec<Box<dyn AlertAction>>,
        reports: &[ReportData],
    ) -> Vec<ActionSummary> {
        let mut summaries = Vec::with_capacity(actions.len());
        for mut action in actions {
            summaries.push(run_action(action.as_mut(), reports).await);
        }
        summaries
    }

    /// Like [`ActionDispatcher::dispatch`], creating each action from its
    /// configuration right before its turn. A creation failure counts as
    /// that action's error.
    pub async fn dispatch_configured(
        registry: &ActionRegistry,
        configs: &[ActionConfig],
        reports: &[ReportData],
    ) -> Vec<ActionSummary> {
        let mut summaries = Vec::with_capacity(configs.len());
        for config in configs {
            let summary = match registry.create_action(config) {
                Ok(mut action) => run_action(action.as_mut(), reports).await,
                Err(e) => {
                    tracing::error!(action = %config.class, error = %e, "Failed to create alert action");
                    ActionSummary {
                        action: config.class.clone(),
                        rows: 0,
                        error: Some(e),
                    }
                }
            };
            summaries.push(summary);
        }
        summaries
    }
}

async fn run_action(action: &mut dyn AlertAction, reports: &[ReportData]) -> ActionSummary {
    let name = action.action_name().to_string();
    let mut rows = 0;

    let mut error = action.initialize().await.err();
    if error.is_none() {
        'reports: for report in reports {
            for row in report.rows() {
                if let Err(e) = action.process_row(&row).await {
                    error = Some(e);
                    break 'reports;
                }
                rows += 1;
            }
        }
    }

    if let Err(e) = action.finalize().await {
        match error {
            Some(_) => tracing::warn!(action = %name, error = %e, "Alert action failed to finalize"),
            None => error = Some(e),
        }
    }

    match &error {
        Some(e) => tracing::error!(action = %name, rows, error = %e, "Alert action failed"),
        None => tracing::info!(action = %name, rows, "Alert action completed"),
    }

    ActionSummary {
        action: name,
        rows,
        error,
    }
}
