//! Headless runner tests against the magic pack on disk.

use std::path::PathBuf;

use glest_headless::runner::{run_pack, RunConfig};
use glest_test_utils::fixtures::MAGIC;
use glest_test_utils::pack::{faction_file, replace_in_file, write_magic_pack};

fn magic_pack() -> (tempfile::TempDir, PathBuf) {
    let techs = tempfile::tempdir().expect("tempdir");
    let pack = write_magic_pack(techs.path()).expect("write pack");
    (techs, pack)
}

fn two_magic(pack: PathBuf, seconds: u32) -> RunConfig {
    let mut config = RunConfig::new(pack, vec![MAGIC.to_string(), MAGIC.to_string()]);
    config.seconds = seconds;
    config
}

#[test]
fn test_stepped_run_summary() {
    let (_techs, pack) = magic_pack();
    let summary = run_pack(&two_magic(pack, 2)).expect("run");

    assert_eq!(summary.pack, "megapack");
    assert_eq!(summary.ticks, 40);
    assert!((summary.game_time - 2.0).abs() < 1e-6);
    assert_eq!(summary.winner, None);
    assert_eq!(summary.events.get("Tick"), Some(&40));
    assert_eq!(summary.controller.ticks, 40);

    assert_eq!(summary.players.len(), 2);
    for player in &summary.players {
        assert!(player.active);
        assert_eq!(player.faction, MAGIC);
        assert_eq!(player.units, 7);
        assert_eq!(player.buildings, 2);
        assert_eq!(player.resources.get("gold"), Some(&500));
    }
}

#[test]
fn test_runs_are_deterministic() {
    let (_techs, pack) = magic_pack();
    let first = run_pack(&two_magic(pack.clone(), 3)).expect("first run");
    let second = run_pack(&two_magic(pack, 3)).expect("second run");
    assert_eq!(first.state_hash, second.state_hash);
    assert_eq!(first.players, second.players);
}

#[test]
fn test_realtime_run() {
    let (_techs, pack) = magic_pack();
    let mut config = two_magic(pack, 1);
    config.realtime = true;
    config.controller.tick_rate = 50;

    let summary = run_pack(&config).expect("run");
    assert!(summary.ticks >= 50);
    assert_eq!(summary.controller.ticks, summary.ticks);
}

#[test]
fn test_invalid_pack_is_not_run() {
    let (_techs, pack) = magic_pack();
    replace_in_file(&faction_file(&pack, MAGIC), "gold", "gol").expect("edit");

    let err = run_pack(&two_magic(pack, 1)).expect_err("validation error");
    assert_eq!(err.kind(), "ValidationFailed");
    assert_eq!(err.to_string(), "Pack 'megapack' failed validation with 1 error(s)");
}

#[test]
fn test_player_count_and_faction_checks() {
    let (_techs, pack) = magic_pack();

    let solo = RunConfig::new(pack.clone(), vec![MAGIC.to_string()]);
    assert_eq!(run_pack(&solo).expect_err("one player").kind(), "PlayerCount");

    let unknown = RunConfig::new(pack, vec![MAGIC.to_string(), "tech".to_string()]);
    assert_eq!(run_pack(&unknown).expect_err("unknown faction").kind(), "InvalidType");
}

#[test]
fn test_missing_pack() {
    let techs = tempfile::tempdir().expect("tempdir");
    let config = two_magic(techs.path().join("nowhere"), 1);
    assert!(run_pack(&config).is_err());
}
