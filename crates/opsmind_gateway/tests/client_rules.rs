use pretty_assertions::assert_eq;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use opsmind_gateway::github::{generate_branch_name, parse_repo_url};
use opsmind_gateway::slack::{mime_for_extension, SlackClient};

fn now() -> OffsetDateTime {
    OffsetDateTime::parse("2026-02-01T10:20:30Z", &Rfc3339).expect("test now")
}

#[test]
fn repo_url_parses_owner_and_repo() {
    let (owner, repo) = parse_repo_url("https://github.com/acme/pay-api").expect("parse");
    assert_eq!(owner, "acme");
    assert_eq!(repo, "pay-api");

    let (owner, repo) = parse_repo_url("https://github.com/acme/pay-api/").expect("parse");
    assert_eq!(owner, "acme");
    assert_eq!(repo, "pay-api");
}

#[test]
fn malformed_repo_urls_are_rejected() {
    for bad in [
        "github.com/acme/pay-api",
        "https://gitlab.com/acme/pay-api",
        "https://github.com/acme",
    ] {
        let err = parse_repo_url(bad).expect_err("must fail");
        assert_eq!(err.code, "VALIDATION_FAILED", "url: {bad}");
    }
}

#[test]
fn branch_names_are_slugged_and_timestamped() {
    let name = generate_branch_name("Fix NPE in PaymentService!!", now());
    assert_eq!(name, "fix-npe-in-paymentse-20260201-102030");
}

#[test]
fn branch_slug_is_capped_and_never_ends_with_a_hyphen() {
    let name = generate_branch_name(
        "a very long pull request title that keeps going and going",
        now(),
    );
    let slug = name
        .strip_suffix("-20260201-102030")
        .expect("timestamp suffix");
    assert!(slug.len() <= 20, "slug too long: {slug}");
    assert!(!slug.ends_with('-'));
}

#[test]
fn empty_titles_still_produce_a_usable_branch() {
    let name = generate_branch_name("!!!", now());
    assert_eq!(name, "fix-20260201-102030");
}

#[test]
fn upload_of_a_missing_file_fails_before_any_network_call() {
    let dir = tempfile::tempdir().expect("tempdir");
    let client = SlackClient::new("xoxb-test");
    let err = client
        .upload_file(&dir.path().join("nope.pdf"), "C123", "report", None)
        .expect_err("must fail");
    assert_eq!(err.code, "VALIDATION_FAILED");
}

#[test]
fn mime_types_cover_the_artifact_extensions() {
    assert_eq!(mime_for_extension("pdf"), "application/pdf");
    assert_eq!(mime_for_extension("HTML"), "text/html");
    assert_eq!(mime_for_extension("json"), "application/json");
    assert_eq!(mime_for_extension("weird"), "application/octet-stream");
}
