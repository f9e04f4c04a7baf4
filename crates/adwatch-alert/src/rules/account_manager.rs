use crate::error::RuleError;
use crate::plugin::{parse_config, RulePlugin, RuleRegistry};
use crate::AlertRule;
use adwatch_common::types::parse_account_id;
use adwatch_common::{AccountId, ReportRow};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

pub const MANAGER_NAME_FIELD: &str = "AccountManagerName";
pub const MANAGER_EMAIL_FIELD: &str = "AccountManagerEmail";
const DEFAULT_ACCOUNT_ID_FIELD: &str = "ExternalCustomerId";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountManager {
    pub name: String,
    pub email: String,
}

/// Adds the name and email of the manager owning each row's account.
///
/// Accounts listed explicitly under a manager go to that manager; any other
/// account is assigned by `account_id % managers.len()`, so the assignment is
/// stable across runs.
pub struct AccountManagerRule {
    managers: Vec<AccountManager>,
    assignments: HashMap<AccountId, usize>,
    account_id_field: String,
}

impl AccountManagerRule {
    /// Fails when `managers` is empty, since every row must get a manager.
    pub fn new(
        managers: Vec<AccountManager>,
        account_id_field: impl Into<String>,
    ) -> Result<Self, RuleError> {
        if managers.is_empty() {
            return Err(RuleError::invalid_config(
                "AddAccountManagerRule",
                "AccountManagers must list at least one manager",
            ));
        }
        Ok(Self {
            managers,
            assignments: HashMap::new(),
            account_id_field: account_id_field.into(),
        })
    }

    /// Pins `account_id` to the manager at `manager`. An index past the end
    /// of the manager list is ignored at lookup time.
    pub fn assign(mut self, account_id: AccountId, manager: usize) -> Self {
        self.assignments.insert(account_id, manager);
        self
    }

    pub fn manager_for(&self, account_id: Option<AccountId>) -> &AccountManager {
        let count = self.managers.len();
        let index = match account_id {
            Some(id) => self
                .assignments
                .get(&id)
                .copied()
                .filter(|&index| index < count)
                .unwrap_or((id % count as u64) as usize),
            None => 0,
        };
        &self.managers[index]
    }
}

impl AlertRule for AccountManagerRule {
    fn name(&self) -> &str {
        "AddAccountManagerRule"
    }

    fn new_header_fields(&self) -> Vec<String> {
        vec![MANAGER_NAME_FIELD.to_string(), MANAGER_EMAIL_FIELD.to_string()]
    }

    fn extend_row(&mut self, row: &ReportRow<'_>) -> Vec<String> {
        let account_id = row
            .get(&self.account_id_field)
            .and_then(|cell| parse_account_id(cell).ok());
        let manager = self.manager_for(account_id);
        vec![manager.name.clone(), manager.email.clone()]
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountIdValue {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManagerConfig {
    name: String,
    email: String,
    #[serde(default)]
    account_ids: Vec<AccountIdValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountManagerConfig {
    #[serde(default)]
    account_managers: Vec<ManagerConfig>,
    account_id_field: Option<String>,
}

pub struct AccountManagerPlugin;

impl RulePlugin for AccountManagerPlugin {
    fn name(&self) -> &str {
        "AddAccountManagerRule"
    }

    fn create_rule(
        &self,
        config: &Value,
        _registry: &RuleRegistry,
    ) -> Result<Box<dyn AlertRule>, RuleError> {
        let cfg: AccountManagerConfig = parse_config(self.name(), config)?;
        let managers = cfg
            .account_managers
            .iter()
            .map(|m| AccountManager {
                name: m.name.clone(),
                email: m.email.clone(),
            })
            .collect();
        let mut rule = AccountManagerRule::new(
            managers,
            cfg.account_id_field
                .unwrap_or_else(|| DEFAULT_ACCOUNT_ID_FIELD.to_string()),
        )?;

        for (index, manager) in cfg.account_managers.iter().enumerate() {
            for id in &manager.account_ids {
                let id = match id {
                    AccountIdValue::Number(n) => *n,
                    AccountIdValue::Text(s) => parse_account_id(s)
                        .map_err(|e| RuleError::invalid_config(self.name(), e))?,
                };
                rule = rule.assign(id, index);
            }
        }
        Ok(Box::new(rule))
    }
}
