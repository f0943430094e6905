use opsmind_core::diff::{classify_error, suggest_patch, FixCategory};

#[test]
fn npe_analysis_produces_a_java_null_check_diff() {
    let analysis = "NullPointerException in class PaymentService method charge line 42";
    let diff = suggest_patch(
        analysis,
        "src/main/java/com/example/PaymentService.java",
        "java",
    );

    assert!(diff.starts_with("--- a/src/main/java/com/example/PaymentService.java\n"));
    assert!(diff.contains("+++ b/src/main/java/com/example/PaymentService.java\n"));
    assert!(diff.contains("@@ -42,"), "hunk anchors at the reported line");
    assert!(diff.contains("-    return paymentGateway.charge(request.getAmount());"));
    assert!(diff.contains("+    if (request == null || request.getAmount() == null) {"));
    assert!(
        diff.contains("public chargeType charge(PaymentServiceRequest request)"),
        "context lines carry the parsed method and class"
    );
}

#[test]
fn python_resource_leak_uses_a_with_block() {
    let analysis = "resource leak detected, connection not closed in method load_batch";
    let diff = suggest_patch(analysis, "svc/loader.py", "python");

    assert!(diff.contains("-    file = open(filename, 'r')"));
    assert!(diff.contains("+    with open(filename, 'r') as file:"));
}

#[test]
fn timeout_in_javascript_adds_an_abort_controller() {
    let diff = suggest_patch("request timeout calling provider", "src/client.js", "javascript");
    assert!(diff.contains("+    const controller = new AbortController();"));
}

#[test]
fn unknown_language_falls_back_to_general_template() {
    let diff = suggest_patch("mysterious failure", "lib/core.rb", "ruby");
    assert!(diff.contains("--- a/lib/core.rb"));
    assert!(diff.contains("+    try {"));
}

#[test]
fn hunk_counts_match_rendered_line_totals() {
    let analysis = "NullPointerException at line 42";
    let diff = suggest_patch(analysis, "A.java", "java");
    let header = diff
        .lines()
        .find(|l| l.starts_with("@@"))
        .expect("hunk header");
    // 1 removed template line + 3 context above + 3 below = 7 old lines;
    // the java null-check template adds 4 new lines in place of 1.
    assert_eq!(header, "@@ -42,7 +42,10 @@");

    let minus = diff
        .lines()
        .filter(|l| l.starts_with('-') && !l.starts_with("---"))
        .count();
    let plus = diff
        .lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
        .count();
    assert_eq!(minus, 1);
    assert_eq!(plus, 4);
}

#[test]
fn classification_prefers_specific_categories_over_general() {
    assert_eq!(
        classify_error("database pool exhausted running SQL"),
        FixCategory::Database
    );
    assert_eq!(
        classify_error("missing config for queue"),
        FixCategory::Configuration
    );
    assert_eq!(classify_error("plain weirdness"), FixCategory::General);
}
