use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sp_engine::{Host, Player, PlayerConfig};
use sp_ir::{Clip, ClipOptions, NoteEvent, Song, SongCell, MAX_SECTIONS, MAX_TRACKS};

struct NullHost;

impl Host for NullHost {
    fn set_gate(&mut self, _track: usize, _voice: usize, _gate: bool) {}
    fn set_cv(&mut self, _track: usize, _voice: usize, _cv: f32) {}
    fn on_lock_failed(&mut self) {}
    fn reset_clock(&mut self) {}
}

/// Four tracks, four sections each, sixteenth notes in four-note chords.
fn dense_song() -> Song {
    let mut song = Song::with_tracks("bench", MAX_TRACKS);
    for t in 0..MAX_TRACKS {
        for s in 0..MAX_SECTIONS {
            let mut clip = Clip::new(4.0).unwrap().with_options(ClipOptions::repeat(2));
            for step in 0..16 {
                for voice in 0..4 {
                    let pitch = (t + s + voice) as f32 / 12.0;
                    clip.insert_note(NoteEvent::new(step as f64 * 0.25, 0.2, pitch)).unwrap();
                }
            }
            song.set_clip(t, s, Some(clip)).unwrap();
        }
    }
    song
}

fn bench_update(c: &mut Criterion) {
    let cell = Arc::new(SongCell::new(dense_song()));
    let (mut player, _remote) = Player::new(PlayerConfig::default(), cell, NullHost);
    player.set_running_status(true);
    player.step();

    // one 64-sample block at 120 bpm, 44.1 kHz
    let block = 64.0 * 2.0 / 44_100.0;
    let mut time = 0.0;
    c.bench_function("update_to_metric_time", |b| {
        b.iter(|| {
            player.step();
            player.update_to_metric_time(black_box(time), 1.0 / 64.0, true);
            player.update_sample_count(64);
            time += block;
        })
    });
}

criterion_group!(benches, bench_update);
criterion_main!(benches);
