//! Editor → player mailbox and player → editor readback.
//!
//! Commands travel through a single-producer single-consumer ring buffer:
//! the editor owns the producer, the player owns the consumer and drains it
//! once per quantum in `Player::step`. Song cells the player replaces come
//! back through a second ring so they are freed on the editor side.
//! Readback goes the other way through relaxed atomics.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use sp_ir::{SongCell, MAX_TRACKS};

/// A request from the editor thread.
#[derive(Debug, Clone)]
pub enum Command {
    /// Switch every track to a new song.
    SetSong(Arc<SongCell>),
    /// Queue a 1-based section on a track; 0 cancels.
    SetNextSection { track: usize, section: usize },
    /// Silence voices and optionally rewind to the first section.
    Reset { clear_gates: bool, reset_sections: bool },
    /// Transport running status.
    SetRunning(bool),
}

#[derive(Debug, Default)]
struct TrackReadback {
    section: AtomicUsize,
    next_section: AtomicUsize,
    repetition: AtomicU32,
}

/// Values the player publishes for other threads.
#[derive(Debug, Default)]
pub struct Readback {
    tracks: [TrackReadback; MAX_TRACKS],
}

impl Readback {
    pub(crate) fn publish(&self, track: usize, section: usize, next_section: usize, repetition: u32) {
        if let Some(t) = self.tracks.get(track) {
            t.section.store(section, Ordering::Relaxed);
            t.next_section.store(next_section, Ordering::Relaxed);
            t.repetition.store(repetition, Ordering::Relaxed);
        }
    }

    pub fn section(&self, track: usize) -> usize {
        self.tracks.get(track).map_or(0, |t| t.section.load(Ordering::Relaxed))
    }

    pub fn next_section(&self, track: usize) -> usize {
        self.tracks
            .get(track)
            .map_or(0, |t| t.next_section.load(Ordering::Relaxed))
    }

    pub fn repetition(&self, track: usize) -> u32 {
        self.tracks
            .get(track)
            .map_or(0, |t| t.repetition.load(Ordering::Relaxed))
    }
}

/// Editor-side handle to a running [`Player`](crate::Player).
pub struct PlayerRemote {
    commands: HeapProd<Command>,
    retired: HeapCons<Arc<SongCell>>,
    readback: Arc<Readback>,
}

/// Create a linked mailbox: the remote for the editor, plus the command
/// consumer and retired-song producer for the player.
pub(crate) fn mailbox(
    capacity: usize,
    readback: Arc<Readback>,
) -> (PlayerRemote, HeapCons<Command>, HeapProd<Arc<SongCell>>) {
    let (commands, consumer) = HeapRb::<Command>::new(capacity).split();
    // every retired cell comes from a command, plus one pending song
    let (returns, retired) = HeapRb::<Arc<SongCell>>::new(capacity + 1).split();
    (PlayerRemote { commands, retired, readback }, consumer, returns)
}

impl PlayerRemote {
    /// Post a command. Never blocks; a full mailbox hands the command back.
    pub fn send(&mut self, command: Command) -> Result<(), Command> {
        self.release_retired();
        self.commands.try_push(command)
    }

    /// Free song cells the player has let go of. Returns how many.
    pub fn release_retired(&mut self) -> usize {
        self.retired.pop_iter().count()
    }

    pub fn set_song(&mut self, song: Arc<SongCell>) -> Result<(), Command> {
        self.send(Command::SetSong(song))
    }

    pub fn set_next_section_request(&mut self, track: usize, section: usize) -> Result<(), Command> {
        self.send(Command::SetNextSection { track, section })
    }

    pub fn reset(&mut self, clear_gates: bool, reset_sections: bool) -> Result<(), Command> {
        self.send(Command::Reset { clear_gates, reset_sections })
    }

    pub fn set_running_status(&mut self, running: bool) -> Result<(), Command> {
        self.send(Command::SetRunning(running))
    }

    /// Commands posted but not yet drained by the player.
    pub fn pending(&self) -> usize {
        self.commands.occupied_len()
    }

    /// 1-based section the track is playing, 0 if halted.
    pub fn section(&self, track: usize) -> usize {
        self.readback.section(track)
    }

    pub fn next_section_request(&self, track: usize) -> usize {
        self.readback.next_section(track)
    }

    pub fn repetition(&self, track: usize) -> u32 {
        self.readback.repetition(track)
    }
}
