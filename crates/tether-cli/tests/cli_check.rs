use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[allow(deprecated)]
fn tether_cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tether").unwrap();
    cmd.env("HOME", home.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_check_summarises_universe() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("Tether.toml"),
        r#"
[[resource]]
name = "A"

[[resource]]
name = "F"
fragment = true
mandatory = false

[[resource.requirement]]
namespace = "host"
filter = "(host=A)"
"#,
    )
    .unwrap();

    tether_cmd(&tmp)
        .current_dir(tmp.path())
        .args(["check"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Universe OK: 2 resource(s), 1 fragment(s); 1 mandatory, 1 optional, 0 resolved",
        ));
}

#[test]
fn test_check_rejects_bad_filter() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("Tether.toml"),
        r#"
[[resource]]
name = "A"

[[resource.requirement]]
namespace = "package"
filter = "(package=foo"
"#,
    )
    .unwrap();

    tether_cmd(&tmp)
        .current_dir(tmp.path())
        .args(["check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid filter"));
}

#[test]
fn test_check_rejects_malformed_toml() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("Tether.toml"), "[[resource]\nname = 1").unwrap();

    tether_cmd(&tmp)
        .current_dir(tmp.path())
        .args(["check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse universe"));
}
