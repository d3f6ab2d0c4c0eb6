//! End-to-end tests for the zapret binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PRESET: &str = "\
# Preset: Default
# Description: YouTube only

--wf-tcp=80,443

--filter-tcp=443
--hostlist=lists/list-youtube.txt
--dpi-desync=fake
";

const CATALOG: &str = "\
[DNS]
Zapret DNS
Без прокси

[YouTube]
youtube.com
10.0.0.1
142.250.74.46
";

struct Workspace {
    dir: TempDir,
    settings: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let settings = root.join("settings.toml");
        fs::write(
            &settings,
            format!(
                "[paths]\nwork_dir = '{}'\nhosts_file = '{}'\nlog_dir = '{}'\n",
                root.display(),
                root.join("hosts").display(),
                root.join("logs").display()
            ),
        )
        .unwrap();
        Self { dir, settings }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn zapret(&self) -> Command {
        let mut cmd = Command::cargo_bin("zapret").unwrap();
        cmd.arg("--settings")
            .arg(&self.settings)
            .arg("--no-banner")
            .arg("--no-log-file")
            .env_remove("RUST_LOG");
        cmd
    }

    fn import_default(&self) {
        let file = self.root().join("Default.txt");
        fs::write(&file, PRESET).unwrap();
        self.zapret()
            .args(["preset", "import"])
            .arg(&file)
            .arg("--activate")
            .assert()
            .success();
    }
}

// ===== Preset Tests =====

#[test]
fn test_preset_import_activate_and_list() {
    let ws = Workspace::new();
    ws.import_default();

    ws.zapret()
        .args(["preset", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Default"))
        .stdout(predicate::str::contains("YouTube only"));

    let mirror = fs::read_to_string(ws.root().join("preset-active.txt")).unwrap();
    assert!(mirror.contains("# ActivePreset: Default"));
}

#[test]
fn test_preset_set_strategy_from_trailing_args() {
    let ws = Workspace::new();
    ws.import_default();

    ws.zapret()
        .args(["preset", "set-strategy", "youtube", "--", "--dpi-desync=multisplit", "--dpi-desync-split-pos=1"])
        .assert()
        .success();

    ws.zapret()
        .args(["preset", "show", "--raw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dpi-desync=multisplit"))
        .stdout(predicate::str::contains("--dpi-desync=fake").not());
}

#[test]
fn test_preset_set_strategy_by_id_records_last_applied() {
    let ws = Workspace::new();
    ws.import_default();
    fs::create_dir_all(ws.root().join("strategies")).unwrap();
    fs::write(
        ws.root().join("strategies").join("list.json"),
        r#"{"strategies": [{"id": "split", "name": "Split", "args": "--filter-tcp=443 --dpi-desync=split2"}]}"#,
    )
    .unwrap();

    ws.zapret()
        .args(["preset", "set-strategy", "youtube", "--strategy", "split"])
        .assert()
        .success();

    let mirror = fs::read_to_string(ws.root().join("preset-active.txt")).unwrap();
    assert!(mirror.contains("--dpi-desync=split2"));
    let settings = fs::read_to_string(&ws.settings).unwrap();
    assert!(settings.contains("last_applied = \"split\""));
}

#[test]
fn test_unknown_preset_fails() {
    let ws = Workspace::new();
    ws.zapret()
        .args(["preset", "activate", "Missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing"));
}

// ===== Hosts Tests =====

#[test]
fn test_hosts_select_apply_remove() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.root().join("json")).unwrap();
    fs::write(ws.root().join("json").join("hosts.ini"), CATALOG).unwrap();
    fs::write(ws.root().join("hosts"), "127.0.0.1 localhost\n").unwrap();

    ws.zapret()
        .args(["hosts", "select", "YouTube", "Zapret DNS"])
        .assert()
        .success();
    ws.zapret().args(["hosts", "apply"]).assert().success();

    let hosts = fs::read_to_string(ws.root().join("hosts")).unwrap();
    assert!(hosts.contains("127.0.0.1 localhost"));
    assert!(hosts.contains("10.0.0.1 youtube.com"));

    ws.zapret().args(["hosts", "remove"]).assert().success();
    let hosts = fs::read_to_string(ws.root().join("hosts")).unwrap();
    assert!(!hosts.contains("youtube.com"));
    assert!(hosts.contains("localhost"));
}

#[test]
fn test_hosts_apply_after_clearing_selection_removes_entries() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.root().join("json")).unwrap();
    fs::write(ws.root().join("json").join("hosts.ini"), CATALOG).unwrap();
    fs::write(ws.root().join("hosts"), "127.0.0.1 localhost\n").unwrap();

    ws.zapret()
        .args(["hosts", "select", "YouTube", "Zapret DNS"])
        .assert()
        .success();
    ws.zapret().args(["hosts", "apply"]).assert().success();
    ws.zapret()
        .args(["hosts", "select", "YouTube", "--clear"])
        .assert()
        .success();
    ws.zapret().args(["hosts", "apply"]).assert().success();

    let hosts = fs::read_to_string(ws.root().join("hosts")).unwrap();
    assert_eq!(hosts, "127.0.0.1 localhost\n");
}

#[test]
fn test_hosts_select_unknown_profile_fails() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.root().join("json")).unwrap();
    fs::write(ws.root().join("json").join("hosts.ini"), CATALOG).unwrap();

    ws.zapret()
        .args(["hosts", "select", "YouTube", "Nope DNS"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown DNS profile"));
}

// ===== Run Tests =====

#[test]
fn test_run_dry_run_direct_uses_mirror() {
    let ws = Workspace::new();
    ws.import_default();

    ws.zapret()
        .args(["run", "--dry-run", "--mode", "direct"])
        .assert()
        .success()
        .stdout(predicate::str::contains("@"))
        .stdout(predicate::str::contains("preset-active.txt"));
}

#[test]
fn test_run_dry_run_orchestrator_expands_preset() {
    let ws = Workspace::new();
    ws.import_default();

    ws.zapret()
        .args(["run", "--dry-run", "--mode", "orchestrator"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--filter-tcp=443 --hostlist=lists/list-youtube.txt"));
}

#[test]
fn test_run_without_active_preset_fails() {
    let ws = Workspace::new();
    ws.zapret().args(["run", "--dry-run"]).assert().failure();
}

// ===== Config Tests =====

#[test]
fn test_config_validate() {
    let ws = Workspace::new();
    ws.zapret()
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Settings are valid"));

    let bad = ws.root().join("bad.toml");
    fs::write(&bad, "[general]\nstop_timeout_ms = 0\n").unwrap();
    ws.zapret()
        .args(["config", "validate"])
        .arg(&bad)
        .assert()
        .failure();
}

#[test]
fn test_config_generate_refuses_overwrite() {
    let ws = Workspace::new();
    let out = ws.root().join("generated.toml");
    ws.zapret().args(["config", "generate", "-o"]).arg(&out).assert().success();
    assert!(fs::read_to_string(&out).unwrap().contains("[general]"));

    ws.zapret()
        .args(["config", "generate", "-o"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

// ===== Strategy Tests =====

#[test]
fn test_strategy_list_json() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.root().join("strategies")).unwrap();
    fs::write(
        ws.root().join("strategies").join("general.bat"),
        "REM NAME: General\r\nREM LABEL: recommended\r\nwinws.exe --filter-tcp=443 --dpi-desync=fake\r\n",
    )
    .unwrap();

    ws.zapret()
        .args(["strategy", "list", "--json", "--label", "recommended"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"general\""));
}

// ===== Completions Tests =====

#[test]
fn test_completions_bash() {
    Command::cargo_bin("zapret")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("zapret"));
}

#[test]
fn test_completion_names() {
    let ws = Workspace::new();
    ws.import_default();
    fs::create_dir_all(ws.root().join("json")).unwrap();
    fs::write(ws.root().join("json").join("hosts.ini"), CATALOG).unwrap();

    ws.zapret()
        .args(["completions", "--names", "presets"])
        .assert()
        .success()
        .stdout("Default\n");
    ws.zapret()
        .args(["completions", "--names", "services"])
        .assert()
        .success()
        .stdout("YouTube\n");
}
