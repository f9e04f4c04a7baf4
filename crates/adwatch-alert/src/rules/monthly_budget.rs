use crate::error::RuleError;
use crate::plugin::{parse_config, RulePlugin, RuleRegistry};
use crate::rules::parse_number;
use crate::AlertRule;
use adwatch_common::types::parse_account_id;
use adwatch_common::{AccountId, ReportRow};
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub const BUDGET_FIELD: &str = "AccountMonthlyBudget";
const DEFAULT_SKIP_FIRST_DAYS: u32 = 3;
const DEFAULT_SPEND_RATE_THRESHOLD: f64 = 0.6;

/// Adds each account's monthly budget (micros, `0` = unlimited) and keeps
/// only accounts that are underspending it.
///
/// A row is removed when the budget is unlimited, when `today` falls in the
/// first `skip_first_days` of the month, or when the average daily spend so
/// far exceeds `spend_rate_threshold * budget / days_in_month`.
pub struct MonthlyBudgetRule {
    pub budgets: HashMap<AccountId, i64>,
    pub default_budget: i64,
    pub skip_first_days: u32,
    pub spend_rate_threshold: f64,
    pub cost_field: String,
    pub account_id_field: String,
    pub today: NaiveDate,
}

impl MonthlyBudgetRule {
    fn budget_for(&self, row: &ReportRow<'_>) -> i64 {
        row.get(&self.account_id_field)
            .and_then(|cell| parse_account_id(cell).ok())
            .and_then(|id| self.budgets.get(&id).copied())
            .unwrap_or(self.default_budget)
    }
}

impl AlertRule for MonthlyBudgetRule {
    fn name(&self) -> &str {
        "AddAccountMonthlyBudget"
    }

    fn new_header_fields(&self) -> Vec<String> {
        vec![BUDGET_FIELD.to_string()]
    }

    fn extend_row(&mut self, row: &ReportRow<'_>) -> Vec<String> {
        vec![self.budget_for(row).to_string()]
    }

    fn should_remove_row(&mut self, row: &ReportRow<'_>) -> bool {
        let Some(budget) = row.get(BUDGET_FIELD).and_then(parse_number) else {
            return false;
        };
        if budget == 0.0 {
            return true;
        }

        let day = self.today.day();
        if day <= self.skip_first_days {
            return true;
        }

        let Some(cost) = row.get(&self.cost_field).and_then(parse_number) else {
            return false;
        };
        let daily_spend = cost / f64::from(day);
        let daily_allowance =
            self.spend_rate_threshold * budget / f64::from(days_in_month(self.today));
        daily_spend > daily_allowance
    }
}

pub fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MonthlyBudgetConfig {
    #[serde(default)]
    budgets: HashMap<String, i64>,
    #[serde(default)]
    default_budget: i64,
    skip_first_days: Option<u32>,
    spend_rate_threshold: Option<f64>,
    cost_field: Option<String>,
    account_id_field: Option<String>,
    /// `YYYY-MM-DD`; defaults to the local date when the rule is created.
    reference_date: Option<NaiveDate>,
}

pub struct MonthlyBudgetPlugin;

impl RulePlugin for MonthlyBudgetPlugin {
    fn name(&self) -> &str {
        "AddAccountMonthlyBudget"
    }

    fn create_rule(
        &self,
        config: &Value,
        _registry: &RuleRegistry,
    ) -> Result<Box<dyn AlertRule>, RuleError> {
        let cfg: MonthlyBudgetConfig = parse_config(self.name(), config)?;

        let budgets = cfg
            .budgets
            .iter()
            .map(|(id, budget)| {
                if *budget < 0 {
                    return Err(RuleError::invalid_config(
                        self.name(),
                        format!("negative budget for account {id}"),
                    ));
                }
                parse_account_id(id)
                    .map(|id| (id, *budget))
                    .map_err(|e| RuleError::invalid_config(self.name(), e))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        let spend_rate_threshold = cfg
            .spend_rate_threshold
            .unwrap_or(DEFAULT_SPEND_RATE_THRESHOLD);
        if spend_rate_threshold.is_nan() || spend_rate_threshold <= 0.0 {
            return Err(RuleError::invalid_config(
                self.name(),
                "SpendRateThreshold must be positive",
            ));
        }

        Ok(Box::new(MonthlyBudgetRule {
            budgets,
            default_budget: cfg.default_budget.max(0),
            skip_first_days: cfg.skip_first_days.unwrap_or(DEFAULT_SKIP_FIRST_DAYS),
            spend_rate_threshold,
            cost_field: cfg.cost_field.unwrap_or_else(|| "Cost".to_string()),
            account_id_field: cfg
                .account_id_field
                .unwrap_or_else(|| "ExternalCustomerId".to_string()),
            today: cfg
                .reference_date
                .unwrap_or_else(|| Local::now().date_naive()),
        }))
    }
}
