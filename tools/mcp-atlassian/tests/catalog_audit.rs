use assert_cmd::Command;
use rstest::rstest;
use serde_json::Value;
use tempfile::tempdir;

#[rstest]
#[case(false)]
#[case(true)]
fn audit_binary_passes_and_writes_reports(#[case] read_only: bool) {
    let dir = tempdir().expect("tempdir");
    let json_path = dir.path().join("audit.json");
    let md_path = dir.path().join("audit.md");

    let mut cmd = Command::cargo_bin("catalog-audit").expect("binary built");
    cmd.arg("--output-json")
        .arg(&json_path)
        .arg("--output-md")
        .arg(&md_path);
    if read_only {
        cmd.arg("--read-only");
    }
    let output = cmd.output().expect("run catalog-audit");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout: Value = serde_json::from_slice(&output.stdout).expect("json on stdout");
    assert_eq!(stdout["tool_count"], 27);
    assert_eq!(stdout["read_only"], read_only);
    assert_eq!(stdout["pass_rate"], 1.0);
    let cases = stdout["cases"].as_array().expect("cases");
    assert!(cases.iter().all(|case| case["passed"] == true));
    assert!(cases.iter().all(|case| case.get("detail").is_none()));

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).expect("json report"))
            .expect("valid json report");
    assert_eq!(written["tool_count"], stdout["tool_count"]);

    let markdown = std::fs::read_to_string(&md_path).expect("markdown report");
    assert!(markdown.contains("Pass rate: 100.00%"));
    assert!(markdown.contains("routes_cover_catalog"));
}
