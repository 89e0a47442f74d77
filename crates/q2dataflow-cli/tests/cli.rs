//! Drives the built `q2dataflow` binary against a registry fixture.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::{json, Value as JsonValue};
use tempfile::{tempdir, TempDir};

const PLUGIN: &str = r#"
id: stats
version: 1.2.0
actions:
  - id: summarize
    name: Summarize
    description: Summarize a table
    signature:
      parameters:
        - name: threads
          type: {name: Str, kind: primitive}
        - name: verbose
          type: {name: Bool, kind: primitive}
          default: false
      outputs:
        - name: summary
          type: {name: Visualization, kind: semantic}
"#;

fn workspace() -> std::io::Result<TempDir> {
    let dir = tempdir()?;
    fs::create_dir(dir.path().join("registry"))?;
    fs::write(dir.path().join("registry/stats.yaml"), PLUGIN)?;
    Ok(dir)
}

fn q2dataflow(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_q2dataflow"))
        .current_dir(dir)
        .env_remove("Q2DATAFLOW_SETTINGS")
        .env_remove("RUST_LOG")
        .env("Q2DATAFLOW_REGISTRY", dir.join("registry"))
        .args(args)
        .output()
        .expect("failed to run q2dataflow")
}

#[test]
fn test_template_plugin_reports_created_files() -> std::io::Result<()> {
    let dir = workspace()?;
    let output = q2dataflow(dir.path(), &["wdl", "template", "plugin", "stats", "--output", "out"]);
    assert!(output.status.success());

    let events: Vec<JsonValue> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("status lines are JSON"))
        .collect();
    assert!(events.iter().all(|e| e["status"] == "created"));
    assert!(events.iter().any(|e| e["type"] == "directory"));

    let document = fs::read_to_string(dir.path().join("out/suite_q2_stats/q2_stats__summarize.wdl"))?;
    assert!(document.contains("version 1.0"));
    assert!(document.contains("Boolean? verbose = false"));
    assert!(dir.path().join("out/suite_q2_stats/test-data").is_dir());

    // Templating again overwrites in place
    let again = q2dataflow(dir.path(), &["wdl", "template", "plugin", "stats", "--output", "out"]);
    assert!(String::from_utf8_lossy(&again.stdout).contains(r#""status":"updated""#));
    Ok(())
}

#[test]
fn test_template_action_with_arguments() -> std::io::Result<()> {
    let dir = workspace()?;
    fs::write(dir.path().join("args.json"), r#"{"threads": "4", "summary": "out"}"#)?;
    let output = q2dataflow(
        dir.path(),
        &[
            "cwl", "template", "action", "stats", "summarize", "--output", "out", "--arguments",
            "args.json",
        ],
    );
    assert!(output.status.success());

    let arguments =
        fs::read_to_string(dir.path().join("out/suite_q2_stats/test-data/q2_stats__summarize.inputs.yml"))?;
    assert!(arguments.contains("threads"));
    let tool = fs::read_to_string(dir.path().join("out/suite_q2_stats/q2_stats__summarize.cwl"))?;
    assert!(tool.starts_with("#!/usr/bin/env cwl-runner"));
    Ok(())
}

#[test]
fn test_version() -> std::io::Result<()> {
    let dir = workspace()?;
    let output = q2dataflow(dir.path(), &["version", "stats"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1.2.0");

    let tools = q2dataflow(dir.path(), &["version", "tools"]);
    assert!(tools.status.success());
    assert!(!String::from_utf8_lossy(&tools.stdout).trim().is_empty());
    Ok(())
}

#[test]
fn test_run_hands_arguments_to_backend() -> std::io::Result<()> {
    let dir = workspace()?;
    let backend = concat!(
        "cat > payload.json && ",
        r#"printf '[{"name":"summary","semantic_type":"Visualization","path":"result.qzv"}]' "#,
        r#"> "$Q2DATAFLOW_RESULTS" && "#,
        "printf viz > result.qzv && echo done"
    );
    let settings = json!({"local": {}, "backend_command": backend});
    fs::write(dir.path().join("settings.json"), settings.to_string())?;
    fs::write(
        dir.path().join("inputs.json"),
        r#"{"threads": "4", "verbose": true, "summary": "out/summary"}"#,
    )?;

    let output = q2dataflow(
        dir.path(),
        &["--settings", "settings.json", "wdl", "run", "stats", "summarize", "inputs.json"],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{stdout}");
    assert!(stdout.contains(r#"｢threads: "4"｣"#));
    assert!(stdout.contains("done"));
    assert!(stdout.contains("Saved Visualization to: out/summary.qzv"));
    assert_eq!(fs::read_to_string(dir.path().join("out/summary.qzv"))?, "viz");

    let payload: JsonValue = serde_json::from_str(&fs::read_to_string(dir.path().join("payload.json"))?)?;
    assert_eq!(payload["action"], "summarize");
    assert_eq!(payload["arguments"]["verbose"], json!({"kind": "bool", "value": true}));
    Ok(())
}

#[test]
fn test_run_failure_leads_with_stage_header() -> std::io::Result<()> {
    let dir = workspace()?;
    fs::write(dir.path().join("inputs.json"), "{}")?;
    let output = q2dataflow(dir.path(), &["wdl", "run", "stats", "missing", "inputs.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Unexpected error finding the action:"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unexpected error finding the action:"));
    Ok(())
}
