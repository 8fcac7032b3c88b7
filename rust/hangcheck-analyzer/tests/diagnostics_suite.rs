//! Rendering and error reporting through the public API.

use hangcheck_analyzer::diagnostics::format_check_error;
use hangcheck_analyzer::{check_source, parse, AnalyzerConfig, CheckError, RuleId, Severity};

#[test]
fn rendered_finding_points_at_the_construct() {
    let src = "function load() {\n  var d = jQuery.Deferred();\n  return d.promise();\n}\n";
    let diags = check_source(src, &AnalyzerConfig::default()).expect("parses");
    assert_eq!(diags.len(), 1);
    let out = diags[0].clone().with_file("load.js").render_plain();
    assert!(out.starts_with("warning[deferred-must-complete]: "), "got: {}", out);
    assert!(out.contains("  --> load.js:2:7\n"), "got: {}", out);
    assert!(out.contains("  2 |   var d = jQuery.Deferred();\n"), "got: {}", out);
    assert!(out.contains("   |       ^^^^^^^^^^^^^^^^^^^^^\n"), "got: {}", out);
}

#[test]
fn json_output_lists_findings() {
    let src = "new Promise(function (resolve) {});";
    let diags = check_source(src, &AnalyzerConfig::default()).expect("parses");
    let json = serde_json::to_value(&diags).expect("serializes");
    assert_eq!(json[0]["rule"], "promise-must-complete");
    assert_eq!(json[0]["line"], 1);
    assert_eq!(json[0]["col"], 1);
}

#[test]
fn parse_failure_becomes_error_diagnostic() {
    let src = "var ok = 1;\nif (x {\n";
    let err = parse(src).unwrap_err();
    assert!(matches!(err, CheckError::Parse(_)));
    let diag = format_check_error(&err, src, "broken.js");
    assert_eq!(diag.rule, RuleId::ParseError);
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!(diag.line, 2);
    assert!(diag.render_plain().contains("broken.js:2:"));
}

#[test]
fn deep_nesting_is_a_parse_error_not_a_crash() {
    let src = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
    let err = parse(&src).unwrap_err();
    let diag = format_check_error(&err, &src, "deep.js");
    assert!(diag.message.contains("nesting deeper than"), "got: {}", diag.message);
    assert_eq!(diag.suggestions.len(), 1);
}

#[test]
fn long_flat_chains_are_parse_errors_not_crashes() {
    let sources = [
        format!("var s = {}1;", "1 + ".repeat(20_000)),
        format!("new Promise(function (resolve) {{ p{}; resolve(); }});", ".then(f)".repeat(20_000)),
    ];
    for src in &sources {
        let err = check_source(src, &AnalyzerConfig::default()).unwrap_err();
        assert!(matches!(err, CheckError::Parse(_)), "got: {:?}", err);
        let diag = format_check_error(&err, src, "chain.js");
        assert!(diag.message.contains("nesting deeper than"), "got: {}", diag.message);
    }
}
