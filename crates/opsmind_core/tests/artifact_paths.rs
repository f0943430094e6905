use pretty_assertions::assert_eq;

use opsmind_core::artifacts::{
    check_existing, file_to_base64, summarize_incident_files, ArtifactKind, ArtifactPathResolver,
    BASE64_SIZE_CEILING,
};

#[test]
fn resolve_is_deterministic_for_the_same_inputs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolver = ArtifactPathResolver::new(dir.path().join("outputs"));

    let first = resolver
        .resolve("INC-1700000000000", &ArtifactKind::Report)
        .expect("resolve");
    let second = resolver
        .resolve("INC-1700000000000", &ArtifactKind::Report)
        .expect("resolve");
    assert_eq!(first, second);
    assert!(first.ends_with("INC-1700000000000/COE_INC-1700000000000.pdf"));
}

#[test]
fn resolving_creates_the_incident_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolver = ArtifactPathResolver::new(dir.path().join("outputs"));
    let path = resolver
        .resolve("INC-5", &ArtifactKind::Timeline)
        .expect("resolve");
    assert!(path.parent().expect("parent").is_dir());
    assert!(path.to_string_lossy().ends_with("timeline_INC-5.html"));
}

#[test]
fn unsafe_id_characters_are_sanitized_in_the_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolver = ArtifactPathResolver::new(dir.path().join("outputs"));
    let path = resolver
        .resolve("INC:2026/01", &ArtifactKind::Report)
        .expect("resolve");
    let parent = path.parent().expect("parent");
    assert!(parent.ends_with("INC_2026_01"));
}

#[test]
fn existing_artifact_short_circuits_with_its_size() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolver = ArtifactPathResolver::new(dir.path().join("outputs"));
    let path = resolver
        .resolve("INC-9", &ArtifactKind::Report)
        .expect("resolve");

    assert!(check_existing(&path).is_none());
    std::fs::write(&path, b"already generated").expect("write");

    let existing = check_existing(&path).expect("existing");
    assert_eq!(existing.file_size, 17);
    assert_eq!(existing.path, path.to_string_lossy());
}

#[test]
fn base64_round_trips_small_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.pdf");
    std::fs::write(&path, b"pdf bytes").expect("write");

    let encoded = file_to_base64(&path).expect("encode");
    assert_eq!(encoded.filename, "report.pdf");
    assert_eq!(encoded.file_size, 9);
    assert_eq!(encoded.base64_content, "cGRmIGJ5dGVz");
}

#[test]
fn base64_refuses_files_over_the_ceiling() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("huge.pdf");
    let oversized = vec![0u8; (BASE64_SIZE_CEILING + 1) as usize];
    std::fs::write(&path, oversized).expect("write");

    let err = file_to_base64(&path).expect_err("must refuse");
    assert_eq!(err.code, "VALIDATION_FAILED");
}

#[test]
fn base64_on_a_missing_file_reports_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = file_to_base64(&dir.path().join("nope.pdf")).expect_err("must fail");
    assert_eq!(err.code, "ARTIFACT_NOT_FOUND");
}

#[test]
fn summary_lists_files_with_types_and_hashes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let resolver = ArtifactPathResolver::new(dir.path().join("outputs"));
    let report = resolver
        .resolve("INC-3", &ArtifactKind::Report)
        .expect("resolve");
    let timeline = resolver
        .resolve("INC-3", &ArtifactKind::Timeline)
        .expect("resolve");
    std::fs::write(&report, b"report").expect("write");
    std::fs::write(&timeline, b"<html></html>").expect("write");

    let summary = summarize_incident_files(&resolver, "INC-3").expect("summary");
    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.incident_id, "INC-3");

    let by_name: Vec<(&str, &str)> = summary
        .files
        .iter()
        .map(|f| (f.filename.as_str(), f.file_type.as_str()))
        .collect();
    assert_eq!(
        by_name,
        vec![
            ("COE_INC-3.pdf", "report"),
            ("timeline_INC-3.html", "visualization"),
        ]
    );
    assert!(summary.files.iter().all(|f| f.sha256.len() == 64));
}
