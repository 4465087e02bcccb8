use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::fs;

mod common;
use common::{pw, setup_test_db};

fn init(db_path: &str) {
    pw().args(["--db", db_path, "--test", "init"])
        .assert()
        .success()
        .stdout(contains("Database initialized"));
}

fn ingest(db_path: &str, name: &str, lines: &[&str]) {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join(format!("{name}.jsonl"));
    fs::write(&file, lines.join("\n")).unwrap();

    pw().args(["--db", db_path, "ingest", "--file", file.to_str().unwrap()])
        .assert()
        .success();
}

#[test]
fn test_init_creates_schema() {
    let db_path = setup_test_db("cli_init");
    init(&db_path);

    pw().args(["--db", &db_path, "db", "--info"])
        .assert()
        .success()
        .stdout(contains("Total readings:"))
        .stdout(contains("Watermark:"));
}

#[test]
fn test_ingest_fold_and_list_events() {
    let db_path = setup_test_db("cli_fold");
    init(&db_path);

    ingest(
        &db_path,
        "cli_fold",
        &[
            r#"{"client_id":"lab1","gpio":[0,0]}"#,
            r#"{"client_id":"lab1","gpio":[0,1]}"#,
            r#"{"client_id":"lab1","gpio":[0,1]}"#,
            r#"{"client_id":"lab1","gpio":[0,0]}"#,
        ],
    );

    pw().args(["--db", &db_path, "fold", "--once"])
        .assert()
        .success()
        .stdout(contains("Folded 4 reading(s)"));

    pw().args(["--db", &db_path, "events", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""client_id": "lab1""#))
        .stdout(contains(r#""pin_index": 1"#));

    pw().args(["--db", &db_path, "events", "--pin", "0"])
        .assert()
        .success()
        .stdout(contains("No alarm episodes match."));

    pw().args(["--db", &db_path, "fold", "--once"])
        .assert()
        .success()
        .stdout(contains("Nothing to fold"));

    pw().args(["--db", &db_path, "db", "--verify"])
        .assert()
        .success()
        .stdout(contains("Episodes are consistent."));
}

#[test]
fn test_bad_payload_lines_are_skipped() {
    let db_path = setup_test_db("cli_bad_payload");
    init(&db_path);

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mixed.jsonl");
    fs::write(
        &file,
        [
            r#"{"client_id":"lab1","gpio":[1]}"#,
            r#"{"client_id":"lab1","gpio":[7]}"#,
            r#"not json"#,
        ]
        .join("\n"),
    )
    .unwrap();

    pw().args(["--db", &db_path, "ingest", "--file", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("1 reading(s) appended, 2 rejected"));
}

#[test]
fn test_status_json_reports_live_alarm() {
    let db_path = setup_test_db("cli_status");
    init(&db_path);
    ingest(
        &db_path,
        "cli_status",
        &[
            r#"{"client_id":"lab1","gpio":[0],"temp":[3.5]}"#,
            r#"{"client_id":"lab1","gpio":[1],"temp":[3.6]}"#,
        ],
    );

    pw().args(["--db", &db_path, "status", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""client_id": "lab1""#))
        .stdout(contains(r#""is_active": true"#))
        .stdout(contains(r#""temperature": 3.6"#));

    pw().args(["--db", &db_path, "status", "--client", "nobody", "--json"])
        .assert()
        .success()
        .stdout(contains("[]"));
}

#[test]
fn test_invalid_pin_filter_fails() {
    let db_path = setup_test_db("cli_bad_pin");
    init(&db_path);

    pw().args(["--db", &db_path, "events", "--pin", "8"])
        .assert()
        .failure()
        .stderr(contains("Invalid pin index").and(contains("8")));
}

#[test]
fn test_log_records_cycle() {
    let db_path = setup_test_db("cli_log");
    init(&db_path);
    ingest(&db_path, "cli_log", &[r#"{"client_id":"lab1","gpio":[1]}"#]);

    pw().args(["--db", &db_path, "fold", "--once"])
        .assert()
        .success();

    pw().args(["--db", &db_path, "log", "--print"])
        .assert()
        .success()
        .stdout(contains("migration_applied"))
        .stdout(contains("ingest"))
        .stdout(contains("fold"));
}

#[test]
fn test_fold_worker_stops_after_requested_cycles() {
    let db_path = setup_test_db("cli_worker");
    init(&db_path);
    ingest(
        &db_path,
        "cli_worker",
        &[
            r#"{"client_id":"lab1","gpio":[1]}"#,
            r#"{"client_id":"lab1","gpio":[0]}"#,
        ],
    );

    pw().args(["--db", &db_path, "fold", "--cycles", "1"])
        .assert()
        .success()
        .stdout(contains("Press Ctrl+C to stop"))
        .stdout(contains("1 cycle(s), 2 reading(s) folded, 0 failure(s)"));
}

#[test]
fn test_readings_lists_newest_first() {
    let db_path = setup_test_db("cli_readings");
    init(&db_path);
    ingest(
        &db_path,
        "cli_readings",
        &[
            r#"{"client_id":"lab1","gpio":[0],"temp":[4.5]}"#,
            r#"{"client_id":"lab2","gpio":[1]}"#,
            r#"{"client_id":"lab1","gpio":[1],"hum":[null,55.0]}"#,
        ],
    );

    pw().args(["--db", &db_path, "readings", "--limit", "2", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""id": 3,"#))
        .stdout(contains(r#""id": 2,"#))
        .stdout(contains(r#""id": 1,"#).not());

    pw().args(["--db", &db_path, "readings", "--client", "lab1"])
        .assert()
        .success()
        .stdout(contains("0:4.5"))
        .stdout(contains("1:55"))
        .stdout(contains("lab2").not())
        .stdout(contains("2 reading(s) shown"));
}

#[test]
fn test_series_covers_recent_window_only() {
    let db_path = setup_test_db("cli_series");
    init(&db_path);
    ingest(
        &db_path,
        "cli_series",
        &[r#"{"client_id":"lab1","gpio":[0,1],"temp":[3.5]}"#],
    );

    pw().args(["--db", &db_path, "series", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""Sensor 0": ["#))
        .stdout(contains(r#""GPIO 1": ["#));

    pw().args(["--db", &db_path, "series", "--until", "2000-01-01"])
        .assert()
        .success()
        .stdout(contains("No readings in the last 15 minute(s)."));

    pw().args(["--db", &db_path, "series", "--minutes", "0"])
        .assert()
        .failure();
}

#[test]
fn test_config_setters_persist_to_file() {
    let home = tempfile::tempdir().unwrap();
    let db_path = setup_test_db("cli_config_set");

    pw().env("HOME", home.path())
        .args([
            "--db",
            &db_path,
            "config",
            "--client-alias",
            "lab1=Freezer",
            "--gpio-alias",
            "lab1:1=Door",
            "--visible-pins",
            "lab1=1",
        ])
        .assert()
        .success()
        .stdout(contains("Configuration saved"));

    let written = fs::read_to_string(home.path().join(".pinwatch").join("pinwatch.conf")).unwrap();
    assert!(written.contains("Freezer"));
    assert!(written.contains("Door"));
    // the --db override stays out of the file
    assert!(!written.contains("cli_config_set"));

    init(&db_path);
    ingest(
        &db_path,
        "cli_config_set",
        &[r#"{"client_id":"lab1","gpio":[1,1]}"#],
    );
    pw().env("HOME", home.path())
        .args(["--db", &db_path, "status", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""display_name": "Freezer""#))
        .stdout(contains(r#""alias": "Door""#))
        .stdout(contains(r#""alias": "GPIO 0""#).not());
}

#[test]
fn test_config_rejects_bad_channel() {
    let home = tempfile::tempdir().unwrap();

    pw().env("HOME", home.path())
        .args(["config", "--gpio-alias", "lab1:9=Door"])
        .assert()
        .failure()
        .stderr(contains("Configuration error"));

    assert!(!home.path().join(".pinwatch").join("pinwatch.conf").exists());
}

#[cfg(unix)]
#[test]
fn test_config_edit_runs_requested_editor() {
    let home = tempfile::tempdir().unwrap();

    pw().env("HOME", home.path())
        .args(["config", "--edit", "--editor", "true"])
        .assert()
        .success()
        .stdout(contains("edited successfully using 'true'"));

    assert!(home.path().join(".pinwatch").join("pinwatch.conf").exists());
}
