//! End-to-end tests for the `retrofit` binary.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const QUEUE: &str = r#"{"body": [
  {"type": "import", "loc": {"line": 1, "col": 0}, "names": [{"name": "queue"}]}
]}"#;

const MODULE_SUPER: &str = r#"{"body": [
  {"type": "expr", "loc": {"line": 1, "col": 0},
   "value": {"type": "call", "loc": {"line": 1, "col": 0},
             "func": {"type": "name", "loc": {"line": 1, "col": 0}, "id": "super"}}}
]}"#;

const FSTRING: &str = r#"{"body": [
  {"type": "assign", "loc": {"line": 1, "col": 0},
   "targets": [{"type": "name", "loc": {"line": 1, "col": 0}, "id": "x"}],
   "value": {"type": "joined_str", "loc": {"line": 1, "col": 4},
             "values": [{"type": "formatted_value", "loc": {"line": 1, "col": 6},
                         "value": {"type": "name", "loc": {"line": 1, "col": 7}, "id": "y"}}]}}
]}"#;

fn retrofit() -> Command {
    Command::cargo_bin("retrofit").expect("retrofit binary")
}

fn write_input(dir: &Path, rel: &str, tree: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, tree).unwrap();
}

fn workspace() -> TempDir {
    let td = tempfile::tempdir().expect("tempdir");
    write_input(td.path(), "src/jobs.json", QUEUE);
    td
}

#[test]
fn fix_writes_guarded_import() {
    let temp = workspace();

    retrofit()
        .current_dir(temp.path())
        .args(["fix", "src", "--target", "2.7", "--no-coding-header", "--no-cache"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "1 module(s), 0 fix error(s), 0 check error(s), 0 failed",
        ));

    let written = fs::read_to_string(temp.path().join("retrofit-out/jobs.py")).unwrap();
    assert_eq!(
        written,
        "from __future__ import absolute_import\n\
         try:\n    import queue\nexcept ImportError:\n    import Queue as queue\n"
    );
}

#[test]
fn fix_adds_coding_line_for_two_x_targets() {
    let temp = workspace();

    retrofit()
        .current_dir(temp.path())
        .args(["fix", "src", "--no-cache", "--out-dir", "out"])
        .assert()
        .success();

    let written = fs::read_to_string(temp.path().join("out/jobs.py")).unwrap();
    assert!(written.starts_with(
        "# -*- coding: utf-8 -*-\nfrom __future__ import absolute_import\ntry:\n"
    ));
}

#[test]
fn fix_prints_diff() {
    let temp = workspace();

    retrofit()
        .current_dir(temp.path())
        .args(["fix", "src", "--diff", "--no-coding-header", "--no-cache"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--- a/jobs.py\n+++ b/jobs.py\n"))
        .stdout(predicate::str::contains("+except ImportError:"));
}

#[test]
fn fix_with_diagnostics_exits_two_and_skips_output() {
    let temp = workspace();
    write_input(temp.path(), "src/bad.json", MODULE_SUPER);

    retrofit()
        .current_dir(temp.path())
        .args(["fix", "src", "--no-cache"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains(
            "bad.py:1:1: fix error [syntax.super_no_args]",
        ));

    assert!(temp.path().join("retrofit-out/jobs.py").exists());
    assert!(!temp.path().join("retrofit-out/bad.py").exists());
}

#[test]
fn write_with_diagnostics_writes_everything() {
    let temp = workspace();
    write_input(temp.path(), "src/bad.json", MODULE_SUPER);

    retrofit()
        .current_dir(temp.path())
        .args(["fix", "src", "--no-cache", "--write-with-diagnostics"])
        .assert()
        .code(2);

    assert!(temp.path().join("retrofit-out/bad.py").exists());
}

#[test]
fn check_reports_json() {
    let temp = workspace();
    write_input(temp.path(), "src/pkg/__init__.json", MODULE_SUPER);

    let output = retrofit()
        .current_dir(temp.path())
        .args(["check", "src", "--format", "json", "--no-cache"])
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).expect("json report");
    assert_eq!(report["schema"], "retrofit.report.v1");
    assert_eq!(report["summary"]["fix_errors"], 1);
    let modules: Vec<&str> = report["modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["module"].as_str().unwrap())
        .collect();
    assert_eq!(modules, vec!["jobs", "pkg"]);
    assert!(!temp.path().join("retrofit-out").exists());
}

#[test]
fn check_above_the_feature_version_is_clean() {
    let temp = tempfile::tempdir().unwrap();
    write_input(temp.path(), "f.json", FSTRING);

    retrofit()
        .current_dir(temp.path())
        .args(["check", "f.json", "--target", "3.6", "--no-cache"])
        .assert()
        .success();
}

#[test]
fn config_file_is_used_and_cli_extends_it() {
    let temp = tempfile::tempdir().unwrap();
    write_input(temp.path(), "f.json", FSTRING);
    fs::write(
        temp.path().join("retrofit.toml"),
        "target = \"3.6\"\n\n[cache]\nenabled = false\n",
    )
    .unwrap();

    // 3.6 from the config: nothing to do.
    retrofit()
        .current_dir(temp.path())
        .args(["check", "f.json"])
        .assert()
        .success();

    // The CLI floor wins, and the disabled fixer leaves the f-string behind.
    retrofit()
        .current_dir(temp.path())
        .args(["check", "f.json", "--target", "3.5", "--disable", "syntax.fstring"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("check error [syntax.fstring]"));
}

#[test]
fn explicit_config_path() {
    let temp = tempfile::tempdir().unwrap();
    write_input(temp.path(), "f.json", FSTRING);
    fs::write(temp.path().join("alt.toml"), "disable = [\"syntax.fstring\"]\n").unwrap();

    retrofit()
        .current_dir(temp.path())
        .args(["--config", "alt.toml", "check", "f.json", "--no-cache"])
        .assert()
        .code(2);
}

#[test]
fn unknown_disabled_fixer_is_a_config_error() {
    let temp = workspace();

    retrofit()
        .current_dir(temp.path())
        .args(["check", "src", "--disable", "no.such.fixer", "--no-cache"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown fixer 'no.such.fixer'"));
}

#[test]
fn disabling_a_dependency_is_a_config_error() {
    let temp = workspace();

    retrofit()
        .current_dir(temp.path())
        .args(["check", "src", "--disable", "annotations.function", "--no-cache"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot disable 'annotations.function'"));
}

#[test]
fn inverted_range_is_rejected() {
    let temp = workspace();

    retrofit()
        .current_dir(temp.path())
        .args(["check", "src", "--target", "3.6", "--max-target", "3.5"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("floor 3.6 is above ceiling 3.5"));
}

#[test]
fn malformed_version_is_rejected_by_the_parser() {
    retrofit()
        .args(["check", "src", "--target", "three"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--target"));
}

#[test]
fn broken_tree_fails_the_module_only() {
    let temp = workspace();
    write_input(temp.path(), "src/broken.json", "{");

    retrofit()
        .current_dir(temp.path())
        .args(["fix", "src", "--no-cache"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("broken.py: failed: invalid syntax tree"));

    assert!(temp.path().join("retrofit-out/jobs.py").exists());
}

#[test]
fn report_and_cache_round_trip() {
    let temp = workspace();

    for _ in 0..2 {
        retrofit()
            .current_dir(temp.path())
            .args(["fix", "src", "--report", "report"])
            .assert()
            .success();
    }

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join("report/report.json")).unwrap())
            .unwrap();
    assert_eq!(report["modules"][0]["status"], "cached");
    assert!(temp.path().join("report/report.md").exists());
    assert!(temp.path().join(".retrofit-cache").is_dir());
}

#[test]
fn list_fixers_text() {
    retrofit()
        .args(["list-fixers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("syntax.fstring"))
        .stdout(predicate::str::contains("imports.unusable_modules"));
}

#[test]
fn list_fixers_json_marks_active_entries() {
    let output = retrofit()
        .args(["list-fixers", "--format", "json", "--target", "3.5"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let items: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let find = |id: &str| {
        items
            .as_array()
            .unwrap()
            .iter()
            .find(|i| i["id"] == id)
            .cloned()
            .unwrap()
    };
    assert_eq!(find("syntax.fstring")["active"], true);
    assert_eq!(find("syntax.fstring")["since"], "3.6");
    assert_eq!(find("classes.new_style")["active"], false);
    assert_eq!(
        find("annotations.variable")["depends_on"],
        serde_json::json!(["annotations.named_tuple_class"])
    );
}

#[test]
fn explain_known_id() {
    retrofit()
        .args(["explain", "classes.new_style"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DESCRIPTION"))
        .stdout(predicate::str::contains("runs after  classes.metaclass_keyword"));
}

#[test]
fn explain_unknown_id() {
    retrofit()
        .args(["explain", "no.such.id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown fixer or rule: 'no.such.id'"));
}
