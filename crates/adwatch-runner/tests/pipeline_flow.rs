use adwatch_runner::error::PipelineError;
use serde_json::json;
use std::path::Path;

const HEADER: &str = "Customer ID,Account,Impressions,Cost";

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn setup(dir: &Path) {
    write(
        &dir.join("field_definitions.json"),
        &json!({
            "ACCOUNT_PERFORMANCE_REPORT": [
                {"DisplayName": "Customer ID", "FieldName": "ExternalCustomerId"},
                {"DisplayName": "Account", "FieldName": "AccountDescriptiveName"},
                {"DisplayName": "Impressions", "FieldName": "Impressions"},
                {"DisplayName": "Cost", "FieldName": "Cost"}
            ]
        })
        .to_string(),
    );
    write(
        &dir.join("reports/111.csv"),
        &format!("{HEADER}\n111,Acme,50,1000\n111,Acme,500,2000\n"),
    );
    write(&dir.join("reports/222.csv"), &format!("{HEADER}\n222,Globex,7,0\n"));
    // Unknown display column: this account is dropped, the others go on.
    write(
        &dir.join("reports/333.csv"),
        "Customer ID,Account,Clicks\n333,Initech,5\n",
    );
    // 444 has no report file; 999 is the manager account.
    write(&dir.join("accounts.txt"), "# accounts\n111\n222\n333\n444\n999\n");

    let query = json!({
        "ReportType": "ACCOUNT_PERFORMANCE_REPORT",
        "Fields": "ExternalCustomerId,AccountDescriptiveName,Impressions,Cost",
        "TimeRange": "YESTERDAY"
    });
    let alerts = json!({
        "Alerts": [
            {
                "Name": "Low impressions",
                "ReportQuery": query,
                "Rules": [
                    {"RuleClass": "AddField", "Field": "Team", "Value": "search"},
                    {"RuleClass": "FieldFilter", "Field": "Impressions", "Operator": "gte", "Value": 100}
                ],
                "AlertMessage": "Account {AccountDescriptiveName} ({ExternalCustomerId}) has {Impressions} impressions for {Team}",
                "Actions": [
                    // Relative to the directory of adwatch.toml.
                    {"ActionClass": "SimpleLogFileWriter", "LogFilePathname": "low.log"},
                    {"ActionClass": "SQLDBPersister", "DatabasePath": dir.join("alerts.db")}
                ]
            },
            {
                "Name": "Unresolved placeholder",
                "ReportQuery": query,
                "Rules": [],
                "AlertMessage": "Account {Clicks}",
                "Actions": [
                    {"ActionClass": "LogFileWriter", "LogFilePathname": dir.join("never.log")}
                ]
            },
            {
                "Name": "Unknown rule",
                "ReportQuery": query,
                "Rules": [{"RuleClass": "NoSuchRule"}],
                "AlertMessage": "x",
                "Actions": []
            }
        ]
    });
    write(&dir.join("alerts.json"), &alerts.to_string());

    write(
        &dir.join("adwatch.toml"),
        r#"
top_account_id = "999"
alerts_file = "alerts.json"
accounts_file = "accounts.txt"

[download]
threads = 2
retries = 2
backoff_millis = 1

[field_mapping]
retries = 1
backoff_millis = 1

[processing]
threads = 2

[source]
reports_dir = "reports"
field_definitions_file = "field_definitions.json"
"#,
    );
}

#[tokio::test]
async fn alerts_flow_from_reports_to_actions() {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    let report = adwatch_runner::run(&dir.path().join("adwatch.toml"))
        .await
        .unwrap();

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].0, "Unknown rule");
    assert!(matches!(report.rejected[0].1, PipelineError::Configuration(_)));
    assert_eq!(report.summaries.len(), 2);
    assert_eq!(report.failed_alerts(), 2);

    let low = &report.summaries[0];
    assert!(low.is_ok(), "{:?}", low.error);
    assert_eq!(low.accounts, 4);
    assert_eq!(low.downloaded, 3);
    assert_eq!(low.download_failures.iter().copied().collect::<Vec<_>>(), vec![444]);
    assert_eq!(low.dropped.iter().copied().collect::<Vec<_>>(), vec![333]);
    assert_eq!(low.processed, 2);
    assert_eq!(low.rows, 2);
    assert_eq!(low.actions.len(), 2);
    assert!(low.actions.iter().all(|a| a.rows == 2));

    let log = std::fs::read_to_string(dir.path().join("low.log")).unwrap();
    assert!(log.starts_with("===== Begin of this run =====\n"));
    assert!(log.contains("Account Acme (111) has 50 impressions for search\n"));
    assert!(log.contains("Account Globex (222) has 7 impressions for search\n"));
    assert!(!log.contains("500"));
    assert!(log.ends_with("===== End of this run =====\n\n\n"));

    assert_eq!(alert_count(&dir.path().join("alerts.db")), 2);

    let unresolved = &report.summaries[1];
    assert!(matches!(unresolved.error, Some(PipelineError::Template(_))));
    assert!(unresolved.actions.is_empty());
    assert!(!dir.path().join("never.log").exists());
}

#[tokio::test]
async fn missing_config_fails_before_any_alert() {
    let dir = tempfile::tempdir().unwrap();
    let err = adwatch_runner::run(&dir.path().join("missing.toml"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
}

/// Row count of the alerts table, read back through the SQLite file.
fn alert_count(path: &Path) -> i64 {
    let data = std::fs::read(path).unwrap();
    assert!(data.starts_with(b"SQLite format 3\0"));
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM report_alerts", [], |r| r.get(0))
        .unwrap()
}
