//! Whole-player scenarios driven through the public API.

use std::sync::Arc;

use sp_engine::{Player, PlayerConfig, StoppedRequestPolicy, VoiceState};
use sp_ir::{Clip, ClipOptions, NoteEvent, Song, SongCell};
use sp_master::{render_transitions, Change, ClockConfig, RecordingHost};

const Q: f32 = 1.0 / 64.0;

fn clip(length: f64, repeat: u32, notes: &[(f64, f32, f32)]) -> Clip {
    let mut clip = Clip::new(length).unwrap().with_options(ClipOptions::repeat(repeat));
    for &(start, duration, pitch) in notes {
        clip.insert_note(NoteEvent::new(start, duration, pitch)).unwrap();
    }
    clip
}

fn player(song: Song, config: PlayerConfig) -> Player<RecordingHost> {
    let (player, _remote) = Player::new(config, Arc::new(SongCell::new(song)), RecordingHost::new());
    player
}

#[test]
fn quarter_note_loop() {
    let mut song = Song::with_tracks("quarter", 1);
    song.set_clip(0, 0, Some(clip(1.0, 0, &[(0.0, 0.5, 2.0)]))).unwrap();
    let mut player = player(song, PlayerConfig::default().with_tracks(1));
    player.set_running_status(true);
    player.step();

    player.update_to_metric_time(0.24, 0.001, true);
    assert!(player.host().gate(0, 0));
    assert_eq!(player.host().cv(0, 0), 2.0);
    assert_eq!(player.host().gate_changes(), 1);

    player.update_to_metric_time(0.5, 0.001, true);
    assert!(!player.host().gate(0, 0));
    assert_eq!(player.host().gate_changes(), 2);

    player.update_to_metric_time(1.02, 0.001, true);
    assert!(player.host().gate(0, 0));
    assert_eq!(player.host().cv(0, 0), 2.0);
    assert_eq!(player.host().gate_changes(), 3);
}

#[test]
fn retrigger_gap_is_exact() {
    let mut song = Song::with_tracks("retrigger", 1);
    song.set_clip(0, 0, Some(clip(1.0, 0, &[(0.0, 0.5, 1.0), (0.5, 0.5, 1.0)]))).unwrap();
    let mut player = player(song, PlayerConfig::default().with_tracks(1).with_retrigger_samples(44));
    player.set_running_status(true);
    player.step();

    player.update_to_metric_time(0.0, Q, true);
    assert!(player.host().gate(0, 0));
    player.update_to_metric_time(0.5, Q, true);
    assert!(!player.host().gate(0, 0));
    let track = player.track(0).unwrap();
    assert_eq!(track.voices()[0].state(), VoiceState::Retriggering);

    player.update_sample_count(43);
    assert!(!player.host().gate(0, 0));
    player.update_sample_count(1);
    assert!(player.host().gate(0, 0));
    assert_eq!(player.host().gate_changes(), 3);
}

#[test]
fn sections_advance_by_repeat_count() {
    let mut song = Song::with_tracks("sequence", 1);
    song.set_clip(0, 0, Some(clip(1.0, 2, &[(0.0, 0.5, 0.0)]))).unwrap();
    song.set_clip(0, 2, Some(clip(1.0, 1, &[(0.0, 0.5, 1.0)]))).unwrap();
    let cell = Arc::new(SongCell::new(song));

    let transitions = render_transitions(cell, PlayerConfig::default(), ClockConfig::default(), 2);
    let pitches: Vec<f32> = transitions
        .iter()
        .filter_map(|t| match t.change {
            Change::Cv(cv) => Some(cv),
            Change::Gate(_) => None,
        })
        .collect();
    assert_eq!(pitches, vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
}

#[test]
fn stopped_request_applies_on_resume() {
    let mut song = Song::with_tracks("stop", 1);
    song.set_clip(0, 0, Some(clip(4.0, 0, &[(0.0, 1.0, 0.0)]))).unwrap();
    song.set_clip(0, 1, Some(clip(4.0, 0, &[(0.0, 1.0, 5.0)]))).unwrap();
    let cell = Arc::new(SongCell::new(song));
    let (mut player, mut remote) = Player::new(PlayerConfig::default(), cell, RecordingHost::new());
    remote.set_running_status(true).unwrap();
    player.step();
    player.update_to_metric_time(1.5, Q, true);

    remote.set_running_status(false).unwrap();
    remote.set_next_section_request(0, 2).unwrap();
    player.step();
    assert_eq!(remote.section(0), 2);
    assert_eq!(remote.next_section_request(0), 0);

    player.update_to_metric_time(1.5, Q, false);
    assert_eq!(player.host().cv(0, 1), 0.0);

    remote.set_running_status(true).unwrap();
    player.step();
    player.update_to_metric_time(1.6, Q, true);
    assert!(player.host().any_gate_high(0));
    assert_eq!(player.host().cv(0, 1), 5.0);
}

#[test]
fn stopped_request_can_wait_for_boundary() {
    let mut song = Song::with_tracks("stop", 1);
    song.set_clip(0, 0, Some(clip(4.0, 0, &[(0.0, 1.0, 0.0)]))).unwrap();
    song.set_clip(0, 1, Some(clip(4.0, 0, &[(0.0, 1.0, 5.0)]))).unwrap();
    let config = PlayerConfig::default().with_stopped_request_policy(StoppedRequestPolicy::QueueUntilBoundary);
    let (mut player, mut remote) = Player::new(config, Arc::new(SongCell::new(song)), RecordingHost::new());
    remote.set_running_status(true).unwrap();
    player.step();
    player.update_to_metric_time(1.5, Q, true);

    remote.set_running_status(false).unwrap();
    remote.set_next_section_request(0, 2).unwrap();
    player.step();
    assert_eq!(remote.section(0), 1);
    assert_eq!(remote.next_section_request(0), 2);

    remote.set_running_status(true).unwrap();
    player.step();
    player.update_to_metric_time(4.0, Q, true);
    assert_eq!(remote.section(0), 2);
    assert_eq!(remote.next_section_request(0), 0);
}

#[test]
fn reset_restarts_song_and_clock() {
    let mut song = Song::with_tracks("reset", 2);
    song.set_clip(0, 0, Some(clip(1.0, 1, &[(0.0, 0.5, 0.0)]))).unwrap();
    song.set_clip(0, 1, Some(clip(2.0, 0, &[(0.0, 2.0, 1.0)]))).unwrap();
    song.set_clip(1, 0, Some(clip(8.0, 0, &[(0.0, 8.0, 2.0)]))).unwrap();
    let (mut player, mut remote) = Player::new(PlayerConfig::default(), Arc::new(SongCell::new(song)), RecordingHost::new());
    remote.set_running_status(true).unwrap();
    player.step();
    player.update_to_metric_time(1.5, Q, true);
    assert_eq!(remote.section(0), 2);

    remote.reset(true, true).unwrap();
    player.step();
    assert_eq!(remote.section(0), 1);
    assert!(!player.host().any_gate_high(0));
    assert!(!player.host().any_gate_high(1));
    assert_eq!(player.host().clock_resets(), 1);

    player.update_to_metric_time(0.0, Q, true);
    assert!(player.host().any_gate_high(0));
    assert!(player.host().any_gate_high(1));
}
