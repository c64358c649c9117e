//! seqplay CLI: render a demo song offline and print its gate/CV changes.
//!
//! Usage:
//!   sp-cli --bars 4 --bpm 96
//!   sp-cli --edit            # rewrite clips from a second thread meanwhile

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sp_master::{
    render, Clip, ClipOptions, ClockConfig, Controller, NoteEvent, Song, SongCell, SongError,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sp-cli", about = "Render the seqplay demo song")]
struct Args {
    /// Bars of 4/4 to render
    #[arg(long, default_value_t = 4)]
    bars: u32,

    /// Tempo in beats per minute
    #[arg(long, default_value_t = 120.0)]
    bpm: f64,

    /// Keep editing the song from another thread while rendering
    #[arg(long)]
    edit: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let clock = ClockConfig::default().with_bpm(args.bpm);
    let ctrl = Controller::with_config(demo_song()?, Default::default(), clock)
        .context("invalid playback configuration")?;

    let song = ctrl.song().load();
    println!("Title:  {}", song.title);
    for (i, track) in song.tracks().enumerate() {
        let sections: Vec<String> = (0..4)
            .map(|s| match track.section(s) {
                Some(clip) if clip.options.is_infinite() => format!("{}:loop", s + 1),
                Some(clip) => format!("{}:x{}", s + 1, clip.options.repeat_count),
                None => format!("{}:-", s + 1),
            })
            .collect();
        println!("Track {}: {:8} {}", i + 1, track.name.as_str(), sections.join(" "));
    }
    println!();

    let editor = args.edit.then(|| spawn_editor(Arc::clone(ctrl.song())));
    info!(bars = args.bars, bpm = args.bpm, edit = args.edit, "rendering");
    let mut host = render(Arc::clone(ctrl.song()), Default::default(), *ctrl.clock(), args.bars);
    if let Some((stop, handle)) = editor {
        stop.store(true, Ordering::Relaxed);
        let edits = handle
            .join()
            .map_err(|_| anyhow::anyhow!("editor thread panicked"))??;
        println!("Editor: {edits} edits");
    }

    for transition in host.take_transitions() {
        println!("{transition}");
    }
    println!();
    println!("Gate changes:  {}", host.gate_changes());
    println!("Lock failures: {}", host.lock_failures());
    println!("Clock resets:  {}", host.clock_resets());
    Ok(())
}

fn clip(length: f64, repeat: u32, notes: &[(f64, f32, f32)]) -> Result<Clip, SongError> {
    let mut clip = Clip::new(length)?.with_options(ClipOptions::repeat(repeat));
    for &(start, duration, pitch) in notes {
        clip.insert_note(NoteEvent::new(start, duration, pitch))?;
    }
    Ok(clip)
}

/// Bass, chords, lead and a sparse percussion track.
fn demo_song() -> Result<Song, SongError> {
    let mut song = Song::with_tracks("Demo", 4);
    let names = ["bass", "chords", "lead", "perc"];
    for (t, name) in names.iter().enumerate() {
        song.track_mut(t)?.name = name.parse().unwrap_or_default();
    }

    let bass: Vec<(f64, f32, f32)> = (0..8).map(|i| (i as f64 * 0.5, 0.25, -1.0)).collect();
    song.set_clip(0, 0, Some(clip(4.0, 2, &bass)?))?;
    song.set_clip(0, 1, Some(clip(4.0, 1, &[(0.0, 1.5, -1.0 + 5.0 / 12.0), (2.0, 1.5, -1.0 + 7.0 / 12.0)])?))?;

    let chord = [0.0, 4.0 / 12.0, 7.0 / 12.0];
    let chords: Vec<(f64, f32, f32)> = chord.iter().map(|&p| (0.0, 3.5, p)).collect();
    song.set_clip(1, 0, Some(clip(4.0, 0, &chords)?))?;

    song.set_clip(2, 0, Some(clip(2.0, 3, &[(0.0, 0.5, 1.0), (0.5, 0.5, 1.25), (1.0, 1.0, 1.5)])?))?;
    song.set_clip(2, 2, Some(clip(2.0, 1, &[(0.0, 2.0, 2.0)])?))?;

    // back-to-back hits exercise the retrigger gap
    song.set_clip(3, 3, Some(clip(1.0, 0, &[(0.0, 0.25, 0.0), (0.25, 0.25, 0.0), (0.5, 0.5, 0.0)])?))?;
    Ok(song)
}

/// Shift the lead line around until told to stop. Returns the edit count.
fn spawn_editor(song: Arc<SongCell>) -> (Arc<AtomicBool>, thread::JoinHandle<Result<u64, SongError>>) {
    let stop = Arc::new(AtomicBool::new(false));
    let done = stop.clone();
    let handle = thread::spawn(move || {
        let mut edits = 0u64;
        while !done.load(Ordering::Relaxed) {
            let step = (edits % 4) as f64 * 0.5;
            song.edit(|song| {
                let Some(lead) = song.track_mut(2)?.section_mut(0) else {
                    return Ok(());
                };
                if lead.note_count() > 3 {
                    lead.remove_note(lead.note_count() - 1)?;
                }
                lead.insert_note(NoteEvent::new(step + 0.25, 0.25, 1.75))
            })?;
            edits += 1;
            thread::sleep(Duration::from_micros(200));
        }
        Ok(edits)
    });
    (stop, handle)
}
