use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_flag_prints_usage() {
    let mut cmd = Command::cargo_bin("kvcli").unwrap();
    cmd.arg("--help");
    cmd.assert().success().stdout(predicate::str::contains("Usage"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    let mut cmd = Command::cargo_bin("kvcli").unwrap();
    cmd.arg("not-a-real-subcommand");
    cmd.assert().failure();
}

#[test]
fn leader_port_flag_must_parse_as_u16() {
    let mut cmd = Command::cargo_bin("kvcli").unwrap();
    cmd.args(["leader", "--port", "not-a-port"]);
    cmd.assert().failure();
}

#[test]
fn follower_dirname_flag_requires_a_value() {
    let mut cmd = Command::cargo_bin("kvcli").unwrap();
    cmd.args(["follower", "--dirname"]);
    cmd.assert().failure();
}
