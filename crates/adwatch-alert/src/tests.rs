use crate::engine::RuleEngine;
use crate::error::{RuleError, TemplateError};
use crate::message::{render, MessageTemplate};
use crate::plugin::RuleRegistry;
use crate::rules::account_manager::{AccountManager, AccountManagerRule};
use crate::rules::add_field::AddFieldRule;
use crate::rules::field_filter::{CompareOp, FieldFilterRule};
use crate::rules::running_total::RunningTotalRule;
use crate::AlertRule;
use adwatch_common::config::RuleConfig;
use adwatch_common::{ReportData, ReportRow, ALERT_MESSAGE_FIELD};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn header() -> Vec<String> {
    ["ExternalCustomerId", "AccountDescriptiveName", "Impressions", "Cost"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn sample_report() -> ReportData {
    let rows = [
        ("1232198123", "Acme", "50", "1420000"),
        ("1232198123", "Acme", "120", "900000"),
        ("4443219876", "Globex", "7", "0"),
        ("4443219876", "Globex", "800", "2500000"),
        ("5551234567", "Initech", "99", "10000"),
        ("5551234567", "Initech", "100", "30000"),
        ("6660001111", "Umbrella", "3", "750000"),
    ]
    .iter()
    .map(|(id, name, imp, cost)| vec![id.to_string(), name.to_string(), imp.to_string(), cost.to_string()])
    .collect();
    ReportData::new("Low impressions", "ACCOUNT_PERFORMANCE_REPORT", header(), rows).unwrap()
}

#[derive(Default)]
struct CallLog {
    header_calls: usize,
    extend_calls: usize,
    remove_calls: usize,
}

/// Records how often the engine calls it; extends with a row counter and
/// removes every row at an even position.
struct RecordingRule {
    log: Arc<Mutex<CallLog>>,
    seen: usize,
}

impl AlertRule for RecordingRule {
    fn name(&self) -> &str {
        "Recording"
    }

    fn new_header_fields(&self) -> Vec<String> {
        self.log.lock().unwrap().header_calls += 1;
        vec!["Seq".to_string()]
    }

    fn extend_row(&mut self, _row: &ReportRow<'_>) -> Vec<String> {
        self.log.lock().unwrap().extend_calls += 1;
        self.seen += 1;
        vec![self.seen.to_string()]
    }

    fn should_remove_row(&mut self, row: &ReportRow<'_>) -> bool {
        self.log.lock().unwrap().remove_calls += 1;
        row.get("Seq").unwrap().parse::<usize>().unwrap() % 2 == 0
    }
}

struct BrokenRule;

impl AlertRule for BrokenRule {
    fn name(&self) -> &str {
        "Broken"
    }

    fn new_header_fields(&self) -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    fn extend_row(&mut self, _row: &ReportRow<'_>) -> Vec<String> {
        vec!["only-one".to_string()]
    }
}

#[test]
fn engine_calls_header_once_and_rows_once_each() {
    let log = Arc::new(Mutex::new(CallLog::default()));
    let mut engine = RuleEngine::new(vec![Box::new(RecordingRule {
        log: Arc::clone(&log),
        seen: 0,
    })]);
    let mut report = sample_report();
    engine.apply(&mut report).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.header_calls, 1);
    assert_eq!(log.extend_calls, 7);
    assert_eq!(log.remove_calls, 7);
    // Rows 1, 3, 5, 7 survive, in their original order.
    let seq: Vec<&str> = report.rows().map(|r| r.get("Seq").unwrap()).collect();
    assert_eq!(seq, vec!["1", "3", "5", "7"]);
    report.check_consistency().unwrap();
}

#[test]
fn extend_then_filter_keeps_header_and_rows_aligned() {
    let mut engine = RuleEngine::new(vec![
        Box::new(AddFieldRule {
            field: "AccountManagerEmail".into(),
            value: "am@example.com".into(),
        }),
        Box::new(FieldFilterRule {
            field: "Impressions".into(),
            operator: CompareOp::GreaterEqual,
            value: 100.0,
        }),
    ]);
    let mut report = sample_report();
    engine.apply(&mut report).unwrap();

    assert_eq!(report.header().len(), 5);
    assert_eq!(report.header()[4], "AccountManagerEmail");
    assert_eq!(report.row_count(), 4);
    for row in report.rows() {
        assert_eq!(row.len(), 5);
        assert_eq!(row.get("AccountManagerEmail"), Some("am@example.com"));
        let impressions: f64 = row.get("Impressions").unwrap().parse().unwrap();
        assert!(impressions < 100.0);
    }
    let names: Vec<&str> = report
        .rows()
        .map(|r| r.get("AccountDescriptiveName").unwrap())
        .collect();
    assert_eq!(names, vec!["Acme", "Globex", "Initech", "Umbrella"]);
}

#[test]
fn later_rules_see_fields_added_by_earlier_rules() {
    let mut engine = RuleEngine::new(vec![
        Box::new(RunningTotalRule::new("Impressions", "TotalImpressions")),
        Box::new(FieldFilterRule {
            field: "TotalImpressions".into(),
            operator: CompareOp::GreaterThan,
            value: 200.0,
        }),
    ]);
    let mut report = sample_report();
    engine.apply(&mut report).unwrap();

    let totals: Vec<&str> = report
        .rows()
        .map(|r| r.get("TotalImpressions").unwrap())
        .collect();
    assert_eq!(totals, vec!["50", "170", "177"]);
}

#[test]
fn redeclared_field_is_overwritten_not_duplicated() {
    let mut engine = RuleEngine::new(vec![
        Box::new(AddFieldRule {
            field: "Owner".into(),
            value: "first".into(),
        }),
        Box::new(AddFieldRule {
            field: "Owner".into(),
            value: "second".into(),
        }),
        Box::new(AddFieldRule {
            field: "Cost".into(),
            value: "0".into(),
        }),
    ]);
    let mut report = sample_report();
    engine.apply(&mut report).unwrap();

    assert_eq!(report.header().len(), 5);
    assert!(report.rows().all(|r| r.get("Owner") == Some("second")));
    assert!(report.rows().all(|r| r.get("Cost") == Some("0")));
    report.check_consistency().unwrap();
}

#[test]
fn value_count_mismatch_is_malformed_rule() {
    let mut engine = RuleEngine::new(vec![Box::new(BrokenRule)]);
    let mut report = sample_report();
    let err = engine.apply(&mut report).unwrap_err();
    match err {
        RuleError::MalformedRule {
            rule,
            row,
            expected,
            actual,
        } => {
            assert_eq!(rule, "Broken");
            assert_eq!(row, 0);
            assert_eq!(expected, 2);
            assert_eq!(actual, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_report_gets_header_extended() {
    let mut report =
        ReportData::new("Empty", "ACCOUNT_PERFORMANCE_REPORT", header(), Vec::new()).unwrap();
    let mut engine = RuleEngine::new(vec![Box::new(BrokenRule)]);
    engine.apply(&mut report).unwrap();
    assert_eq!(report.header().len(), 6);
    assert!(report.is_empty());
}

#[test]
fn template_renders_message_as_last_column() {
    let mut report = ReportData::new(
        "Impressions",
        "ACCOUNT_PERFORMANCE_REPORT",
        vec!["ExternalCustomerId".into(), "Impressions".into()],
        vec![vec!["123".into(), "50".into()]],
    )
    .unwrap();
    render(
        "Account {ExternalCustomerId} has {Impressions} impressions",
        &mut report,
    )
    .unwrap();

    assert_eq!(report.header().last().map(String::as_str), Some(ALERT_MESSAGE_FIELD));
    let row = report.row(0).unwrap();
    assert_eq!(row.values().last().unwrap(), "Account 123 has 50 impressions");
}

#[test]
fn unresolved_placeholder_leaves_report_untouched() {
    let mut report = sample_report();
    let before = report.clone();
    let err = render("Account {ExternalCustomerId} has {Clicks} clicks", &mut report).unwrap_err();
    assert_eq!(
        err,
        TemplateError::UnresolvedPlaceholder {
            name: "Clicks".into()
        }
    );
    assert_eq!(report.header(), before.header());
    assert!(report.rows().zip(before.rows()).all(|(a, b)| a.values() == b.values()));
}

#[test]
fn malformed_templates_are_rejected() {
    for template in ["Account {", "Account }", "Account {}", "Account {Bad Name}", "{a{b}}"] {
        let err = MessageTemplate::parse(template).unwrap_err();
        assert!(
            matches!(err, TemplateError::Malformed { .. }),
            "{template}: {err}"
        );
    }
}

#[test]
fn template_without_placeholders_is_copied_verbatim() {
    let template = MessageTemplate::parse("Budget underspent").unwrap();
    assert_eq!(template.placeholders().count(), 0);
    let mut report = sample_report();
    template.render(&mut report).unwrap();
    assert!(report
        .rows()
        .all(|r| r.get(ALERT_MESSAGE_FIELD) == Some("Budget underspent")));
}

#[test]
fn registry_rejects_unknown_rule_class() {
    let registry = RuleRegistry::default();
    let err = registry
        .create_rule(&RuleConfig::new("NoSuchRule", json!({})))
        .err()
        .unwrap();
    assert!(matches!(err, RuleError::UnknownRuleClass(ref c) if c == "NoSuchRule"));
}

#[test]
fn registry_rejects_invalid_params() {
    let registry = RuleRegistry::default();
    let bad = [
        RuleConfig::new("FieldFilter", json!({"Field": "Cost", "Operator": "~", "Value": 1})),
        RuleConfig::new("AddField", json!({"Value": "x"})),
        RuleConfig::new("AddAccountManagerRule", json!({})),
        RuleConfig::new("CompositeRule", json!({"Rules": []})),
        RuleConfig::new(
            "AddAccountMonthlyBudget",
            json!({"Budgets": {"not-an-id": 5}}),
        ),
    ];
    for config in &bad {
        let err = registry.validate_config(config).unwrap_err();
        assert!(
            matches!(err, RuleError::InvalidConfig { .. }),
            "{}: {err}",
            config.class
        );
    }
}

#[test]
fn composite_rule_builds_children_from_registry() {
    let registry = RuleRegistry::default();
    let config = RuleConfig::new(
        "CompositeRule",
        json!({
            "Rules": [
                {"RuleClass": "AddField", "Field": "Team", "Value": "search"},
                {"RuleClass": "FieldFilter", "Field": "Cost", "Operator": "eq", "Value": 0}
            ]
        }),
    );
    let mut engine = RuleEngine::new(vec![registry.create_rule(&config).unwrap()]);
    let mut report = sample_report();
    engine.apply(&mut report).unwrap();

    assert_eq!(report.row_count(), 6);
    assert!(report.rows().all(|r| r.get("Team") == Some("search")));
}

#[test]
fn account_manager_assignment_is_stable() {
    let managers = vec![
        AccountManager {
            name: "Ana".into(),
            email: "ana@example.com".into(),
        },
        AccountManager {
            name: "Bo".into(),
            email: "bo@example.com".into(),
        },
    ];
    let mut rule = AccountManagerRule::new(managers, "ExternalCustomerId")
        .unwrap()
        .assign(1232198123, 1)
        .assign(4443219877, 9);
    let mut engine_rules: Vec<Box<dyn AlertRule>> = Vec::new();
    assert_eq!(rule.manager_for(Some(1232198123)).name, "Bo");
    // Out-of-range pin falls back to the modulo assignment.
    assert_eq!(rule.manager_for(Some(4443219877)).name, "Bo");
    assert_eq!(rule.manager_for(Some(4443219876)).name, "Ana");
    assert_eq!(rule.manager_for(Some(5551234567)).name, "Bo");
    assert_eq!(rule.manager_for(None).name, "Ana");

    let report = sample_report();
    let first = report.row(0).unwrap();
    assert_eq!(
        rule.extend_row(&first),
        vec!["Bo".to_string(), "bo@example.com".to_string()]
    );
    engine_rules.push(Box::new(rule));
    assert_eq!(RuleEngine::new(engine_rules).len(), 1);
}

#[test]
fn account_manager_rule_needs_a_manager() {
    let err = AccountManagerRule::new(Vec::new(), "ExternalCustomerId").err();
    assert!(matches!(err, Some(RuleError::InvalidConfig { .. })));
}

#[test]
fn monthly_budget_keeps_only_underspending_accounts() {
    let registry = RuleRegistry::default();
    let config = RuleConfig::new(
        "AddAccountMonthlyBudget",
        json!({
            "Budgets": {
                "123-219-8123": 50_000_000,
                "444-321-9876": 100_000_000,
                "555-123-4567": 0
            },
            "DefaultBudget": 0,
            "ReferenceDate": "2024-04-10"
        }),
    );
    let mut engine = RuleEngine::new(vec![registry.create_rule(&config).unwrap()]);
    let mut report = sample_report();
    engine.apply(&mut report).unwrap();

    // Allowance on day 10 of a 30-day month: 0.6 * budget / 30 per day.
    // Acme (50M): 1_000_000/day allowed; 142_000 and 90_000 per day kept.
    // Globex (100M): 2_000_000/day allowed; 0 and 250_000 per day kept.
    // Initech and Umbrella have unlimited budgets.
    let kept: Vec<(&str, &str)> = report
        .rows()
        .map(|r| {
            (
                r.get("AccountDescriptiveName").unwrap(),
                r.get("AccountMonthlyBudget").unwrap(),
            )
        })
        .collect();
    assert_eq!(
        kept,
        vec![
            ("Acme", "50000000"),
            ("Acme", "50000000"),
            ("Globex", "100000000"),
            ("Globex", "100000000"),
        ]
    );
}

#[test]
fn monthly_budget_skips_first_days_and_overspenders() {
    let registry = RuleRegistry::default();
    let early = RuleConfig::new(
        "AddAccountMonthlyBudget",
        json!({"DefaultBudget": 50_000_000, "ReferenceDate": "2024-04-03"}),
    );
    let mut engine = RuleEngine::new(vec![registry.create_rule(&early).unwrap()]);
    let mut report = sample_report();
    engine.apply(&mut report).unwrap();
    assert!(report.is_empty());

    let tight = RuleConfig::new(
        "AddAccountMonthlyBudget",
        json!({"DefaultBudget": 1_000_000, "ReferenceDate": "2024-04-10"}),
    );
    let mut engine = RuleEngine::new(vec![registry.create_rule(&tight).unwrap()]);
    let mut report = sample_report();
    engine.apply(&mut report).unwrap();
    // Allowance is 20_000/day; only rows spending at most 200_000 so far stay.
    let costs: Vec<&str> = report.rows().map(|r| r.get("Cost").unwrap()).collect();
    assert_eq!(costs, vec!["0", "10000", "30000"]);
}
