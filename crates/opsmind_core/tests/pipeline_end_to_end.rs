use pretty_assertions::assert_eq;

use opsmind_core::artifacts::ArtifactPathResolver;
use opsmind_core::domain::LogFormat;
use opsmind_core::pipeline::Pipeline;
use opsmind_core::store::IncidentStore;
use opsmind_core::webhook::normalize_alert;

const JAVA_LOG: &str = "service=\"pay-api\" className=\"PaymentController\" \
                        methodName=\"charge\" errorType=\"NPE\" line=42 \
                        message=\"amount was null\"";

fn pipeline(dir: &std::path::Path) -> Pipeline {
    Pipeline::new(
        IncidentStore::open(dir.join("incidents.json")),
        ArtifactPathResolver::new(dir.join("outputs")),
    )
}

#[test]
fn run_persists_an_incident_and_writes_the_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = pipeline(dir.path());

    let outcome = pipeline.run(JAVA_LOG).expect("run");
    assert_eq!(
        outcome.classification.log_format,
        Some(LogFormat::Structured)
    );
    assert!(!outcome.report_skipped);
    assert!(outcome.report_file_size > 0);
    assert!(std::path::Path::new(&outcome.report_path).is_file());

    let incidents = pipeline.list_incidents().expect("list");
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].service_name, "pay-api");
    assert_eq!(incidents[0].incident_id, outcome.incident_id);
}

#[test]
fn replay_skips_when_the_report_already_exists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = pipeline(dir.path());

    let first = pipeline.run(JAVA_LOG).expect("run");
    assert!(!first.report_skipped);

    let replayed = pipeline.replay(&first.incident_id).expect("replay");
    assert!(replayed.report_skipped);
    assert_eq!(replayed.report_path, first.report_path);
    assert_eq!(replayed.report_file_size, first.report_file_size);
}

#[test]
fn replay_of_an_unknown_incident_reports_known_ids() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = pipeline(dir.path());
    pipeline.run(JAVA_LOG).expect("run");

    let err = pipeline.replay("INC-404").expect_err("must fail");
    assert_eq!(err.code, "STORE_NOT_FOUND");
    assert!(err
        .available_incidents
        .expect("known ids")
        .iter()
        .all(|id| id != "INC-404"));
}

#[test]
fn replay_requires_a_concrete_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = pipeline(dir.path());
    let err = pipeline.replay("  ").expect_err("must fail");
    assert_eq!(err.code, "VALIDATION_FAILED");
}

#[test]
fn unclassifiable_logs_still_produce_an_incident() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = pipeline(dir.path());

    let outcome = pipeline.run("nothing to see here").expect("run");
    let incidents = pipeline.list_incidents().expect("list");
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0].service_name, "unknown-service");
    assert_eq!(incidents[0].incident_id, outcome.incident_id);
}

#[test]
fn p1_alerts_seed_incidents_and_p4_alerts_do_not() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = pipeline(dir.path());

    let p1 = normalize_alert(
        r#"{"ruleName": "cpu", "state": "alerting", "evalMatches": [{"value": 99}]}"#,
        "grafana",
        None,
    )
    .expect("normalize");
    let seeded = pipeline.seed_from_alert(&p1).expect("seed");
    assert!(seeded.is_some());
    assert_eq!(
        seeded.expect("record").severity,
        opsmind_core::domain::Severity::Critical
    );

    let p4 = normalize_alert(
        r#"{"ruleName": "cpu", "state": "ok", "evalMatches": [{"value": 1}]}"#,
        "grafana",
        None,
    )
    .expect("normalize");
    assert!(pipeline.seed_from_alert(&p4).expect("seed").is_none());
    assert_eq!(pipeline.list_incidents().expect("list").len(), 1);
}
