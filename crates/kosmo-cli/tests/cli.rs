//! CLI surface tests that run without a cluster

use assert_cmd::Command;
use predicates::prelude::*;

fn kosmo() -> Command {
    Command::cargo_bin("kosmo").expect("binary built")
}

#[test]
fn help_lists_all_subcommands() {
    kosmo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("uninstall"))
        .stdout(predicate::str::contains("license"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn version_client_only_works_offline() {
    kosmo()
        .args(["version", "--client-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("client version:"));
}

#[test]
fn license_activate_rejects_blank_order_number() {
    kosmo()
        .args(["license", "activate", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("order number"));
}

#[test]
fn install_requires_module_repo_and_token() {
    kosmo()
        .args(["install", "core"])
        .env_remove("KOSMO_GIT_URL")
        .env_remove("KOSMO_GIT_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--repo"));
}

#[test]
fn config_requires_module_repo_and_token() {
    kosmo()
        .args(["config", "core"])
        .env_remove("KOSMO_GIT_URL")
        .env_remove("KOSMO_GIT_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--repo"));
}
