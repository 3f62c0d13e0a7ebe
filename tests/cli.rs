//! CLI integration tests for siteman admin commands.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;
use siteman::store::{SqliteStore, Store};

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("siteman").expect("failed to find binary");
        cmd.env("NO_COLOR", "1");
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "admin",
                "init",
                "--data-dir",
                &self.data_dir_str(),
                "--non-interactive",
            ])
            .assert()
    }

    fn add_user(&self, username: &str) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "admin",
                "add-user",
                "--data-dir",
                &self.data_dir_str(),
                "--username",
                username,
            ])
            .assert()
    }

    fn open_store(&self) -> SqliteStore {
        SqliteStore::new(self.data_dir().join("siteman.db")).expect("open store")
    }
}

#[test]
fn init_creates_the_database() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Database created"));

    assert!(ctx.data_dir().join("siteman.db").exists());
}

#[test]
fn add_user_prints_a_service_token_once() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.add_user("octocat")
        .success()
        .stdout(predicate::str::contains("siteman_"));

    let store = ctx.open_store();
    let user = store
        .get_user_by_provider("github", "octocat")
        .unwrap()
        .expect("user created");
    assert_eq!(user.username, "octocat");
    assert!(store.has_service_token().unwrap());
}

#[test]
fn add_user_is_an_upsert_on_the_same_identity() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.add_user("octocat").success();
    ctx.add_user("octocat").success();

    let store = ctx.open_store();
    let user = store
        .get_user_by_provider("github", "octocat")
        .unwrap()
        .unwrap();
    // One account, even though each invocation mints a fresh token
    assert_eq!(user.username, "octocat");
}

#[test]
fn init_refuses_to_reinitialize_a_live_server() {
    let ctx = TestContext::new();
    ctx.init().success();
    ctx.add_user("octocat").success();

    ctx.init()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn add_user_requires_init_first() {
    let ctx = TestContext::new();

    ctx.add_user("octocat")
        .failure()
        .stderr(predicate::str::contains("admin init"));
}

#[test]
fn add_user_rejects_unknown_providers() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .args([
            "admin",
            "add-user",
            "--data-dir",
            &ctx.data_dir_str(),
            "--username",
            "octocat",
            "--provider",
            "gitlab",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported provider"));
}

#[test]
fn serve_requires_the_vault_secret() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.cmd()
        .env_remove("SITEMAN_TOKEN_SECRET")
        .args(["serve", "--data-dir", &ctx.data_dir_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SITEMAN_TOKEN_SECRET"));
}
