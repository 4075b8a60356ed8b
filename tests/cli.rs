//! CLI smoke tests, run with an isolated config directory

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

struct TestContext {
    temp: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp: TempDir::new().unwrap(),
        }
    }

    fn mods_dir(&self) -> PathBuf {
        let dir = self.temp.path().join("mods");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn rmu(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("rmu").unwrap();
        let config_dir = self.temp.path().join("config");
        cmd.current_dir(self.temp.path());
        cmd.env_remove("GITHUB_TOKEN");
        cmd.env("APPDATA", &config_dir);
        cmd.env("XDG_CONFIG_HOME", &config_dir);
        cmd.env("HOME", self.temp.path());
        cmd
    }
}

#[test]
fn test_help_lists_commands() {
    let ctx = TestContext::new();
    ctx.rmu()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_update_empty_directory() {
    let ctx = TestContext::new();
    ctx.rmu()
        .arg("update")
        .arg(ctx.mods_dir())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("No mods found"));
}

#[test]
fn test_update_skips_prefixed_and_foreign_files() {
    let ctx = TestContext::new();
    let dir = ctx.mods_dir();
    std::fs::write(dir.join("_Disabled.dll"), b"x").unwrap();
    std::fs::write(dir.join("readme.txt"), b"x").unwrap();

    ctx.rmu()
        .arg("update")
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No mods found"));
}

#[test]
fn test_update_reports_non_assembly_as_failed() {
    let ctx = TestContext::new();
    let dir = ctx.mods_dir();
    std::fs::write(dir.join("Broken.dll"), b"definitely not a PE image").unwrap();

    ctx.rmu()
        .arg("update")
        .arg(&dir)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Broken.dll"))
        .stdout(predicate::str::contains("1 failed"));
}

#[test]
fn test_update_missing_directory_fails() {
    let ctx = TestContext::new();
    ctx.rmu()
        .arg("update")
        .arg(ctx.temp.path().join("does-not-exist"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read"));
}

#[test]
fn test_update_rejects_unknown_strategy() {
    let ctx = TestContext::new();
    ctx.rmu()
        .arg("update")
        .arg(ctx.mods_dir())
        .arg("--strategy")
        .arg("newest")
        .assert()
        .failure();
}

#[test]
fn test_config_set_path_and_show() {
    let ctx = TestContext::new();
    let dir = ctx.mods_dir();

    ctx.rmu()
        .args(["config", "set-path"])
        .arg(&dir)
        .assert()
        .success();

    ctx.rmu()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(dir.to_string_lossy().as_ref()))
        .stdout(predicate::str::contains("Token: not set"));
}

#[test]
fn test_config_token_is_never_printed() {
    let ctx = TestContext::new();
    ctx.rmu()
        .args(["config", "set-token", "ghp_secret_value"])
        .assert()
        .success();

    ctx.rmu()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Token: set"))
        .stdout(predicate::str::contains("ghp_secret_value").not());

    ctx.rmu().args(["config", "clear-token"]).assert().success();
    ctx.rmu()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Token: not set"));
}

#[test]
fn test_config_set_path_rejects_missing_directory() {
    let ctx = TestContext::new();
    ctx.rmu()
        .args(["config", "set-path"])
        .arg(ctx.temp.path().join("nope"))
        .assert()
        .failure();
}
