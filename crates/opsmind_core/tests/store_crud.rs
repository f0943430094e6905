use pretty_assertions::assert_eq;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use opsmind_core::domain::{IncidentFields, IncidentStatus, Severity};
use opsmind_core::store::IncidentStore;

fn ts(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).expect("test timestamp")
}

fn draft(service: &str) -> IncidentFields {
    IncidentFields {
        service_name: Some(service.to_string()),
        ..IncidentFields::default()
    }
}

#[test]
fn create_then_read_round_trips_inputs() {
    let mut store = IncidentStore::in_memory();
    let created = store
        .create_with_now(
            IncidentFields {
                service_name: Some("pay-api".to_string()),
                severity: Some(Severity::High),
                status: Some(IncidentStatus::InProgress),
                ..IncidentFields::default()
            },
            ts("2026-02-01T10:00:00Z"),
        )
        .expect("create");

    let read = store.read(&created.incident_id).expect("read");
    assert_eq!(read.service_name, "pay-api");
    assert_eq!(read.severity, Severity::High);
    assert_eq!(read.status, IncidentStatus::InProgress);
    assert_eq!(read.created_at, read.last_updated);
    assert_eq!(read, created);
}

#[test]
fn create_applies_documented_defaults() {
    let mut store = IncidentStore::in_memory();
    let record = store.create(draft("checkout")).expect("create");
    assert_eq!(record.severity, Severity::Medium);
    assert_eq!(record.status, IncidentStatus::Open);
    assert_eq!(record.timestamp, record.created_at);
}

#[test]
fn create_without_service_name_is_rejected() {
    let mut store = IncidentStore::in_memory();
    let err = store
        .create(IncidentFields::default())
        .expect_err("must fail");
    assert_eq!(err.code, "VALIDATION_FAILED");
}

#[test]
fn create_with_existing_id_overwrites_silently() {
    let mut store = IncidentStore::in_memory();
    let first = store
        .create(IncidentFields {
            incident_id: Some("INC-42".to_string()),
            ..draft("pay-api")
        })
        .expect("first create");
    assert_eq!(first.incident_id, "INC-42");

    let second = store
        .create(IncidentFields {
            incident_id: Some("INC-42".to_string()),
            ..draft("billing")
        })
        .expect("second create");
    assert_eq!(second.incident_id, "INC-42");
    assert_eq!(
        store.read("INC-42").expect("read").service_name,
        "billing"
    );
    assert_eq!(store.list().expect("list").len(), 1);
}

#[test]
fn update_merges_fields_and_advances_last_updated() {
    let mut store = IncidentStore::in_memory();
    let created = store
        .create_with_now(
            IncidentFields {
                incident_id: Some("INC-7".to_string()),
                commander: Some("ada".to_string()),
                ..draft("pay-api")
            },
            ts("2026-02-01T10:00:00Z"),
        )
        .expect("create");

    let updated = store
        .update_with_now(
            "INC-7",
            IncidentFields {
                status: Some(IncidentStatus::Resolved),
                ..IncidentFields::default()
            },
            ts("2026-02-01T11:30:00Z"),
        )
        .expect("update");

    assert_eq!(updated.status, IncidentStatus::Resolved);
    assert!(updated.last_updated > created.last_updated);
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.service_name, created.service_name);
    assert_eq!(updated.commander, created.commander);
    assert_eq!(updated.severity, created.severity);
}

#[test]
fn empty_update_is_a_no_op_and_leaves_record_identical() {
    let mut store = IncidentStore::in_memory();
    store
        .create(IncidentFields {
            incident_id: Some("INC-9".to_string()),
            ..draft("pay-api")
        })
        .expect("create");
    let before = store.read("INC-9").expect("read");

    let err = store
        .update("INC-9", IncidentFields::default())
        .expect_err("no-op must fail");
    assert_eq!(err.code, "STORE_NO_OP");

    let after = store.read("INC-9").expect("read");
    assert_eq!(
        serde_json::to_string(&before).expect("encode"),
        serde_json::to_string(&after).expect("encode")
    );
}

#[test]
fn delete_then_read_reports_not_found_without_the_id() {
    let mut store = IncidentStore::in_memory();
    store
        .create(IncidentFields {
            incident_id: Some("INC-1".to_string()),
            ..draft("pay-api")
        })
        .expect("create");
    store
        .create(IncidentFields {
            incident_id: Some("INC-2".to_string()),
            ..draft("billing")
        })
        .expect("create");

    let deleted = store.delete("INC-1").expect("delete");
    assert_eq!(deleted.incident_id, "INC-1");

    let err = store.read("INC-1").expect_err("must be gone");
    assert_eq!(err.code, "STORE_NOT_FOUND");
    let available = err.available_incidents.expect("known ids");
    assert!(!available.contains(&"INC-1".to_string()));
    assert!(available.contains(&"INC-2".to_string()));
}

#[test]
fn list_returns_most_recently_created_first() {
    let mut store = IncidentStore::in_memory();
    for (id, hour) in [("INC-1", "08"), ("INC-2", "09"), ("INC-3", "10")] {
        store
            .create_with_now(
                IncidentFields {
                    incident_id: Some(id.to_string()),
                    ..draft("pay-api")
                },
                ts(&format!("2026-02-01T{hour}:00:00Z")),
            )
            .expect("create");
    }

    let listed = store.list().expect("list");
    let ids: Vec<&str> = listed.iter().map(|r| r.incident_id.as_str()).collect();
    assert_eq!(ids, vec!["INC-3", "INC-2", "INC-1"]);
    assert!(listed.windows(2).all(|w| w[0].created_at > w[1].created_at));
}

#[test]
fn list_on_empty_store_is_empty_not_an_error() {
    let mut store = IncidentStore::in_memory();
    assert!(store.list().expect("list").is_empty());
}
