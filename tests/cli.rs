#![forbid(unsafe_code)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("reserva-cli").unwrap();
    cmd.current_dir(dir)
        .args(["--db", "reserva.json", "--tokens", "tokens.json"])
        .args(["--outbox", "outbox.jsonl", "--now", "2025-06-01 10:00"]);
    cmd
}

fn prepare(dir: &Path) {
    std::fs::write(dir.join("tokens.json"), r#"{"tok-ana": 1, "tok-luis": 2}"#).unwrap();
    cli(dir)
        .args(["add-user", "--first-name", "Ana", "--last-name", "Pérez"])
        .assert()
        .success()
        .stdout("1\n");
    cli(dir)
        .args(["add-user", "--first-name", "Luis", "--last-name", "Gómez"])
        .assert()
        .success()
        .stdout("2\n");
    cli(dir)
        .args(["add-service-type", "--name", "Limpieza"])
        .assert()
        .success();
    cli(dir)
        .args(["--token", "tok-luis", "add-service", "--service-type", "1", "--description", "Casa"])
        .assert()
        .success()
        .stdout("1\n");
}

fn slot_args<'a>() -> [&'a str; 8] {
    ["--service", "1", "--date", "2025-06-03", "--start", "14:00", "--end", "15:00"]
}

#[test]
fn seed_states_lists_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .arg("seed-states")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 | requested"))
        .stdout(predicate::str::contains("7 | cancelled_by_worker"));
    assert!(dir.path().join("reserva.json").exists());
}

#[test]
fn booking_flow_through_the_cli() {
    let dir = tempfile::tempdir().unwrap();
    prepare(dir.path());

    cli(dir.path())
        .arg("check-slot")
        .args(slot_args())
        .assert()
        .success()
        .stdout("available\n");

    cli(dir.path())
        .args(["--token", "tok-ana", "book"])
        .args(slot_args())
        .assert()
        .success()
        .stdout("Booking 1 requested for 2025-06-03 14:00-15:00\n");

    cli(dir.path())
        .arg("check-slot")
        .args(["--service", "1", "--date", "2025-06-03", "--start", "14:30", "--end", "15:30"])
        .assert()
        .code(2)
        .stdout(predicate::str::starts_with("unavailable: overlaps booking 1"));

    cli(dir.path())
        .args(["occupied", "--service", "1", "--date", "2025-06-03"])
        .assert()
        .success()
        .stdout("14:00\n");

    cli(dir.path())
        .args(["--token", "tok-ana", "confirm", "--booking", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not authorized"));

    cli(dir.path())
        .args(["--token", "tok-luis", "confirm", "--booking", "1"])
        .assert()
        .success()
        .stdout("Booking 1 confirmed\n");

    let outbox = std::fs::read_to_string(dir.path().join("outbox.jsonl")).unwrap();
    let kinds: Vec<String> = outbox
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["kind"].to_string())
        .collect();
    assert_eq!(kinds, vec!["\"booking_requested\"", "\"booking_confirmed\""]);
}

#[test]
fn unknown_token_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    prepare(dir.path());
    cli(dir.path())
        .args(["--token", "nope", "book"])
        .args(slot_args())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid or expired credential"));
}

#[test]
fn schedule_commands() {
    let dir = tempfile::tempdir().unwrap();
    prepare(dir.path());
    cli(dir.path())
        .args(["--token", "tok-luis", "add-service", "--service-type", "1"])
        .assert()
        .success()
        .stdout("2\n");
    std::fs::write(
        dir.path().join("lunes.json"),
        r#"{"horario_regular":{"lunes":[{"inicio":"09:00","fin":"12:00"}]}}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("clash.json"),
        r#"{"horario_regular":{"lunes":[{"inicio":"11:00","fin":"13:00"}]}}"#,
    )
    .unwrap();

    cli(dir.path())
        .args(["--token", "tok-luis", "save-schedule", "--service", "1", "--file", "lunes.json"])
        .assert()
        .success();
    cli(dir.path())
        .args(["--token", "tok-luis", "check-schedule", "--file", "clash.json", "--exclude", "2"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("conflict on Lunes"));
    cli(dir.path())
        .args(["--token", "tok-luis", "save-schedule", "--service", "2", "--file", "clash.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("schedule conflict"));
    cli(dir.path())
        .args(["show-schedule", "--service", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""lunes":[{"inicio":"09:00","fin":"12:00"}]"#));
}
