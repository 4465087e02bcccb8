use chrono::Duration;
use pinwatch::config::Config;
use pinwatch::core::ingest::IngestLogic;
use pinwatch::core::live::LiveLogic;
use pinwatch::models::episode::EpisodeView;
use pinwatch::models::reading::NewReading;

mod common;
use common::{at, memory_db, pin, seed_pin};

fn cfg() -> Config {
    Config::with_database("unused.sqlite".into())
}

#[test]
fn test_active_alarm_reports_its_start() {
    let conn = memory_db();
    let p = pin(1);
    seed_pin(&conn, "lab1", p, &[Some(0), Some(1), Some(1)]);

    let states = LiveLogic::client_pin_states(&conn, &cfg(), "lab1").unwrap();
    assert_eq!(
        states.get(&p),
        Some(&EpisodeView {
            is_active: true,
            start_time: at(2),
            end_time: None,
        })
    );
}

#[test]
fn test_cleared_alarm_ends_at_falling_edge() {
    let conn = memory_db();
    let p = pin(1);
    seed_pin(&conn, "lab1", p, &[Some(0), Some(1), Some(1), Some(0), Some(0)]);

    let states = LiveLogic::client_pin_states(&conn, &cfg(), "lab1").unwrap();
    assert_eq!(
        states.get(&p),
        Some(&EpisodeView {
            is_active: false,
            start_time: at(2),
            end_time: Some(at(4)),
        })
    );
}

#[test]
fn test_live_does_not_wait_for_the_fold() {
    // nothing folded yet: the live answer comes from the readings alone
    let conn = memory_db();
    let p = pin(0);
    seed_pin(&conn, "lab1", p, &[Some(1), Some(0)]);

    let states = LiveLogic::client_pin_states(&conn, &cfg(), "lab1").unwrap();
    assert_eq!(states[&p].end_time, Some(at(2)));
}

#[test]
fn test_pins_without_history_are_omitted() {
    let conn = memory_db();
    seed_pin(&conn, "lab1", pin(2), &[Some(0), Some(0)]);

    let states = LiveLogic::client_pin_states(&conn, &cfg(), "lab1").unwrap();
    assert!(states.is_empty());
    assert!(LiveLogic::client_pin_states(&conn, &cfg(), "nobody").unwrap().is_empty());
}

#[test]
fn test_snapshot_of_connected_client() {
    let conn = memory_db();
    let payload = NewReading {
        client_id: "lab1".into(),
        gpio: vec![Some(0), Some(1)],
        temp: vec![Some(4.5), None],
        hum: vec![Some(61.0), None],
    };
    IngestLogic::append_at(&conn, &payload, at(1)).unwrap();

    let snap = LiveLogic::snapshot(&conn, &cfg(), at(3), None).unwrap();
    assert_eq!(snap.len(), 1);

    let lab1 = &snap[0];
    assert!(lab1.is_connected);
    assert_eq!(lab1.display_name, "lab1");
    assert_eq!(lab1.combined_sensors.len(), 1);
    assert_eq!(lab1.combined_sensors[0].temperature, Some(4.5));
    assert_eq!(lab1.combined_sensors[0].humidity, Some(61.0));

    let pins: Vec<(u8, i64)> = lab1.gpio.iter().map(|g| (g.pin, g.status)).collect();
    assert_eq!(pins, vec![(0, 0), (1, 1)]);
    assert!(lab1.gpio[0].alarm.is_none());
    assert_eq!(lab1.gpio[1].alarm.map(|a| a.is_active), Some(true));
}

#[test]
fn test_stale_client_is_offline() {
    let conn = memory_db();
    seed_pin(&conn, "lab1", pin(1), &[Some(1)]);

    let snap = LiveLogic::snapshot(&conn, &cfg(), at(1) + Duration::seconds(60), None).unwrap();
    assert!(!snap[0].is_connected);
    assert!(snap[0].timestamp.is_none());
    assert!(snap[0].gpio.is_empty());
}

#[test]
fn test_snapshot_applies_aliases_and_visibility() {
    let conn = memory_db();
    let payload = NewReading {
        client_id: "lab1".into(),
        gpio: vec![Some(1), Some(0), Some(1)],
        temp: vec![Some(20.0), Some(21.0)],
        hum: Vec::new(),
    };
    IngestLogic::append_at(&conn, &payload, at(1)).unwrap();
    seed_pin(&conn, "lab2", pin(0), &[Some(0)]);

    let cfg = Config::from_yaml(
        r#"
database: unused.sqlite
client_aliases: { lab1: "Cold room" }
visible_gpio_pins: { lab1: [0, 2] }
gpio_aliases: { lab1: { 2: "Door" } }
visible_temp_sensors: { lab1: [1] }
visible_hum_sensors: { lab1: [] }
"#,
    )
    .unwrap();

    let snap = LiveLogic::snapshot(&conn, &cfg, at(2), Some("lab1")).unwrap();
    assert_eq!(snap.len(), 1);
    let lab1 = &snap[0];
    assert_eq!(lab1.display_name, "Cold room");

    let aliases: Vec<&str> = lab1.gpio.iter().map(|g| g.alias.as_str()).collect();
    assert_eq!(aliases, vec!["GPIO 0", "Door"]);

    let channels: Vec<u8> = lab1.combined_sensors.iter().map(|s| s.channel).collect();
    assert_eq!(channels, vec![1]);
}
