use assert_cmd::Command;
use assert_json_diff::assert_json_eq;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn mailtally() -> Command {
    let mut cmd = Command::cargo_bin("mailtally").unwrap();
    cmd.env("TZ", "UTC").env_remove("RUST_LOG");
    cmd
}

fn archive(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("inbox.mbox");
    std::fs::write(&path, contents).unwrap();
    path
}

fn stdout_json(cmd: &mut Command) -> Value {
    let assert = cmd.assert().success();
    serde_json::from_slice(&assert.get_output().stdout).unwrap()
}

fn two_messages() -> String {
    "From b@y Thu Feb 20 16:48:49 2025\r\n\
     From: b@y\r\n\
     To: a@x\r\n\
     Subject: first\r\n\
     \r\n\
     hello\r\n\
     \r\n\
     From b@y Sat Mar  1 09:12:11 2025\r\n\
     From: \"B\" <B@Y>\r\n\
     To: a@x\r\n\
     Subject: second\r\n\
     \r\n\
     >From the start\r\n"
        .into()
}

#[test]
fn prints_the_report_to_the_console() {
    let dir = TempDir::new().unwrap();
    let path = archive(&dir, &two_messages());

    let report = stdout_json(mailtally().arg(&path).arg("-co"));

    assert_json_eq!(
        json!({"a@x": {"b@y": {"n_mails": 2, "dates": ["2025-02-20T16:48:49", "2025-03-01T09:12:11"]}}}),
        report
    );
}

#[test]
fn missing_sender_field_is_reported_as_unknown() {
    let dir = TempDir::new().unwrap();
    let path = archive(
        &dir,
        "From MAILER-DAEMON Thu Feb 20 16:48:49 2025\n\
         Date: Thu, 20 Feb 2025 16:48:49 +0000\n\
         To: Alice <Alice@Example.com>\n\
         \n\
         body\n",
    );

    let report = stdout_json(mailtally().arg(&path).arg("-co"));

    assert_json_eq!(
        json!({"alice@example.com": {"unknown": {"n_mails": 1, "dates": ["2025-02-20T16:48:49"]}}}),
        report
    );
}

#[test]
fn one_entry_per_recipient() {
    let dir = TempDir::new().unwrap();
    let path = archive(
        &dir,
        "From b@y Thu Feb 20 16:48:49 2025\n\
         From: b@y\n\
         To: a@x,\n\
         \tc@x\n\
         Cc: d@x\n\
         \n\
         body\n",
    );

    let report = stdout_json(mailtally().arg(&path).arg("--console-out"));

    let stats = json!({"n_mails": 1, "dates": ["2025-02-20T16:48:49"]});
    assert_json_eq!(
        json!({"a@x": {"b@y": stats}, "c@x": {"b@y": stats}, "d@x": {"b@y": stats}}),
        report
    );
}

#[test]
fn writes_the_report_to_a_file() {
    let dir = TempDir::new().unwrap();
    let path = archive(&dir, &two_messages());
    let out = dir.path().join("report.json");

    mailtally()
        .arg(&path)
        .arg("-jo")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json!(2), written["a@x"]["b@y"]["n_mails"]);
}

#[test]
fn prints_the_sender_list() {
    let dir = TempDir::new().unwrap();
    let path = archive(
        &dir,
        "From x Thu Feb 20 16:48:49 2025\nFrom: b@y\nTo: a@x\n\nhi\n\n\
         From x Thu Feb 20 16:48:50 2025\nFrom: c@y\nTo: a@x\n\nhi\n\n\
         From x Thu Feb 20 16:48:51 2025\nFrom: B@Y\nTo: d@x\n\nhi\n",
    );

    mailtally()
        .arg(&path)
        .arg("-so")
        .assert()
        .success()
        .stdout("b@y\nc@y\n");
}

#[test]
fn empty_archive_gives_an_empty_report() {
    let dir = TempDir::new().unwrap();
    let path = archive(&dir, "");

    assert_json_eq!(json!({}), stdout_json(mailtally().arg(&path).arg("-co")));
}

#[test]
fn console_json_and_sender_list_are_exclusive() {
    mailtally()
        .arg(Path::new("does-not-exist.mbox"))
        .args(["-co", "-so"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("-co and -so"));
}

#[test]
fn fatal_errors_are_reported_once() {
    let output = mailtally()
        .arg(Path::new("does-not-exist.mbox"))
        .arg("-co")
        .assert()
        .code(2)
        .get_output()
        .stderr
        .clone();

    let stderr = String::from_utf8(output).unwrap();
    assert_eq!(1, stderr.matches("does-not-exist.mbox").count(), "{}", stderr);
    assert!(!stderr.contains('\u{1b}'), "{}", stderr);
}

#[test]
fn skipped_and_unresolved_messages_are_reported_on_stderr() {
    let dir = TempDir::new().unwrap();
    let path = archive(
        &dir,
        "From MAILER-DAEMON Thu Feb 20 16:48:49 2025\n\
         \n\
         From MAILER-DAEMON\n\
         From: b@y\n\
         To: a@x\n\
         \n\
         no date anywhere\n\
         From MAILER-DAEMON Thu Feb 20 16:48:50 2025\n\
         Subject: no addresses\n\
         \n\
         hi\n",
    );

    mailtally()
        .arg(&path)
        .arg("-co")
        .assert()
        .success()
        .stderr(predicate::str::contains("Skipping unreadable archive entry").count(2))
        .stderr(predicate::str::contains("Could not resolve sender or receivers"));
}

#[test]
fn an_output_option_is_required() {
    let dir = TempDir::new().unwrap();
    let path = archive(&dir, &two_messages());

    mailtally().arg(&path).assert().code(1);
}

#[test]
fn unknown_flags_are_argument_errors() {
    mailtally().args(["inbox.mbox", "-co", "--bogus"]).assert().code(1);
}

#[test]
fn help_exits_cleanly() {
    mailtally()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--json-out"));
}

#[test]
fn missing_archive_exits_with_two() {
    let dir = TempDir::new().unwrap();

    mailtally()
        .arg(dir.path().join("absent.mbox"))
        .arg("-co")
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty());
}

#[test]
fn non_mbox_archive_exits_with_three() {
    let dir = TempDir::new().unwrap();
    let path = archive(&dir, "this is not\nan mbox file\n");

    mailtally()
        .arg(&path)
        .arg("-co")
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty());
}

#[test]
fn unwritable_output_exits_with_four() {
    let dir = TempDir::new().unwrap();
    let path = archive(&dir, &two_messages());

    mailtally()
        .arg(&path)
        .arg("-jo")
        .arg(dir.path().join("no-such-dir").join("report.json"))
        .assert()
        .code(4);
}

#[test]
fn drop_policy_omits_unresolved_messages() {
    let dir = TempDir::new().unwrap();
    let path = archive(
        &dir,
        "From MAILER-DAEMON Thu Feb 20 16:48:49 2025\n\nno header\n\n\
         From x Thu Feb 20 16:48:50 2025\nFrom: b@y\nTo: a@x\n\nhi\n",
    );

    let bucketed = stdout_json(mailtally().arg(&path).arg("-co"));
    let dropped = stdout_json(mailtally().arg(&path).args(["-co", "--unresolved", "drop"]));

    assert_eq!(json!(1), bucketed["unknown"]["unknown"]["n_mails"]);
    assert_json_eq!(
        json!({"a@x": {"b@y": {"n_mails": 1, "dates": ["2025-02-20T16:48:50"]}}}),
        dropped
    );
}
