//! Integration tests for CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn codectx() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("codectx"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let write = |path: &str, content: &str| {
        let full = tmp.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    };
    write("src/auth.ts", "import { hash } from './util';\n\nexport function login(user) {\n  return hash(user.name);\n}\n");
    write("src/util.ts", "export function hash(value) {\n  return value;\n}\n");
    write("codectx.toml", "[[sources]]\nid = \"app\"\nroot = \".\"\ninclude = [\"src/**\"]\n\n[selection]\ndefault_budget = 4000\n");
    tmp
}

fn index(root: &Path) {
    codectx().arg("-C").arg(root).arg("index").assert().success();
}

#[test]
fn test_cli_version() {
    codectx().arg("--version").assert().success().stdout(predicate::str::contains("codectx"));
}

#[test]
fn test_cli_help_lists_commands() {
    codectx()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("token budget"))
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("select"))
        .stdout(predicate::str::contains("symbols"))
        .stdout(predicate::str::contains("callgraph"))
        .stdout(predicate::str::contains("cache-clear"));
}

#[test]
fn test_index_reports_counts() {
    let tmp = fixture();
    codectx()
        .arg("-C")
        .arg(tmp.path())
        .arg("index")
        .assert()
        .success()
        .stdout(predicate::str::contains("Indexed 2 file(s)"));
    assert!(tmp.path().join(".codectx/index.sqlite").exists());

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .args(["index", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"files_changed\": 0"));
}

#[test]
fn test_select_before_index_fails() {
    let tmp = fixture();
    codectx()
        .arg("-C")
        .arg(tmp.path())
        .args(["select", "login"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("codectx index"));
}

#[test]
fn test_select_renders_markdown_and_reports_cache() {
    let tmp = fixture();
    index(tmp.path());

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .args(["select", "login"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## src/auth.ts"))
        .stdout(predicate::str::contains("```typescript"))
        .stderr(predicate::str::contains("(cached)").not());

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .args(["select", "login"])
        .assert()
        .success()
        .stderr(predicate::str::contains("(cached)"));
}

#[test]
fn test_select_xml_map_output() {
    let tmp = fixture();
    index(tmp.path());

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .args(["select", "login", "--mode", "map", "--format", "xml"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<context mode=\"map\">"))
        .stdout(predicate::str::contains("export function login(user) { ... }"));
}

#[test]
fn test_select_rejects_zero_budget() {
    let tmp = fixture();
    index(tmp.path());

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .args(["select", "login", "--budget", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_symbols_and_callgraph() {
    let tmp = fixture();
    index(tmp.path());

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .args(["symbols", "login", "--exact"])
        .assert()
        .success()
        .stdout(predicate::str::contains("src/auth.ts:3  function login"));

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .args(["callgraph", "hash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Defined: src/util.ts:1"))
        .stdout(predicate::str::contains("src/auth.ts:4  in login"));
}

#[test]
fn test_stats_and_cache_clear() {
    let tmp = fixture();
    index(tmp.path());
    codectx().arg("-C").arg(tmp.path()).args(["select", "hash"]).assert().success();

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .args(["stats", "--history", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Files: 2"))
        .stdout(predicate::str::contains("Cache: 1 entries"))
        .stdout(predicate::str::contains("hash"));

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .arg("cache-clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 cached selection(s)"));
}

#[test]
fn test_invalid_config_lists_violations() {
    let tmp = fixture();
    fs::write(
        tmp.path().join("bad.toml"),
        "[[sources]]\nid = \"\"\nchunk_size = 10\nchunk_overlap = 20\n",
    )
    .unwrap();

    codectx()
        .arg("-C")
        .arg(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("bad.toml"))
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_completions_generate() {
    codectx()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("codectx"));
}
