//! The `skein` binary's command-line surface.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn skein() -> Command {
    let mut cmd = Command::cargo_bin("skein").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("NODE_ENV")
        .env_remove("NODE_PORT")
        .env_remove("NODE_HOST")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_commands() {
    skein()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("build"));
}

#[test]
fn help_lists_environment_variables() {
    skein()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment Variables:"))
        .stdout(predicate::str::contains("NODE_ENV"))
        .stdout(predicate::str::contains("NODE_PORT"))
        .stdout(predicate::str::contains("NODE_HOST"));
}

#[test]
fn version_prints_the_package_version() {
    skein()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn build_help_shows_output_options() {
    skein()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-path"))
        .stdout(predicate::str::contains("--output-public-path"))
        .stdout(predicate::str::contains("--entry-server"));
}

#[test]
fn unknown_subcommand_fails() {
    skein().arg("serve").assert().failure();
}

#[test]
fn missing_manifest_exits_with_1() {
    let temp = TempDir::new().unwrap();
    skein()
        .current_dir(temp.path())
        .env("SKEIN_HOME", temp.path())
        .args(["build", "--context"])
        .arg(temp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("package.json"));
}

#[test]
fn invalid_port_exits_with_1() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("package.json"), r#"{"name":"app"}"#).unwrap();
    skein()
        .current_dir(temp.path())
        .env("SKEIN_HOME", temp.path())
        .env("NODE_PORT", "eighty")
        .arg("start")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("environment"));
}

#[test]
fn missing_node_modules_exits_with_1() {
    let temp = TempDir::new().unwrap();
    let app = temp.path().join("app");
    let home = temp.path().join("home");
    std::fs::create_dir_all(&app).unwrap();
    std::fs::create_dir_all(&home).unwrap();
    std::fs::write(app.join("package.json"), r#"{"name":"app"}"#).unwrap();

    skein()
        .current_dir(&app)
        .env("SKEIN_HOME", &home)
        .arg("build")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("node_modules"));
}
