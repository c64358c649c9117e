//! Shared song cell: the handoff point between the editor and the player.
//!
//! The editor never mutates a song the player is reading. Edits go through
//! `Arc::make_mut`, so a snapshot the player holds stays untouched and the
//! editor works on its own copy. The mutex only guards publication; the
//! player takes it with `try_lock` and never waits.
//!
//! Replaced snapshots are parked in the cell until no reader holds them, so
//! the last reference to a song is always released here on the editor side
//! and never by the player dropping its copy.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tracing::debug;

use crate::error::SongError;
use crate::song::Song;

/// Version of the published song. Bumped on every edit or replacement.
pub type SongVersion = u64;

#[derive(Debug)]
struct Published {
    song: Arc<Song>,
    version: SongVersion,
    /// Superseded snapshots a reader may still hold
    retired: Vec<Arc<Song>>,
}

impl Published {
    fn publish(&mut self, song: Arc<Song>) {
        let previous = core::mem::replace(&mut self.song, song);
        self.collect_retired();
        // readers only clone under the lock, so a count of 1 is final
        if Arc::strong_count(&previous) > 1 {
            self.retired.push(previous);
        }
        self.version += 1;
    }

    fn collect_retired(&mut self) {
        self.retired.retain(|song| Arc::strong_count(song) > 1);
    }
}

/// Result of a non-blocking snapshot poll.
#[derive(Debug)]
pub enum Snapshot {
    /// The caller's version is current.
    Unchanged,
    /// A newer song was published.
    Updated(Arc<Song>, SongVersion),
    /// The editor holds the cell right now.
    Contended,
}

/// A song shared between one editor and one real-time reader.
#[derive(Debug)]
pub struct SongCell {
    published: Mutex<Published>,
}

/// Keeps the cell locked for as long as it lives.
pub struct HoldGuard<'a> {
    published: MutexGuard<'a, Published>,
}

impl SongCell {
    pub fn new(song: Song) -> Self {
        Self::from_arc(Arc::new(song))
    }

    pub fn from_arc(song: Arc<Song>) -> Self {
        Self {
            published: Mutex::new(Published { song, version: 1, retired: Vec::new() }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Published> {
        self.published.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- Editor side (may block) ---

    /// Apply an edit to a private copy and publish it as a new version.
    ///
    /// If `f` fails nothing is published.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Song) -> Result<R, SongError>) -> Result<R, SongError> {
        let mut published = self.lock();
        let mut draft = Arc::clone(&published.song);
        let result = f(Arc::make_mut(&mut draft))?;
        published.publish(draft);
        debug!(version = published.version, "song edited");
        Ok(result)
    }

    /// Publish a whole new song.
    pub fn replace(&self, song: Song) {
        let mut published = self.lock();
        published.publish(Arc::new(song));
        debug!(version = published.version, "song replaced");
    }

    /// Lock the cell until the guard drops. The player sees contention
    /// meanwhile.
    pub fn hold(&self) -> HoldGuard<'_> {
        HoldGuard { published: self.lock() }
    }

    /// Current song, blocking if the editor holds the cell.
    pub fn load(&self) -> Arc<Song> {
        Arc::clone(&self.lock().song)
    }

    /// Current song with its version, read under one lock.
    pub fn load_versioned(&self) -> (Arc<Song>, SongVersion) {
        let published = self.lock();
        (Arc::clone(&published.song), published.version)
    }

    pub fn version(&self) -> SongVersion {
        self.lock().version
    }

    /// Free superseded snapshots no reader holds any more. Returns how many
    /// are still in use.
    pub fn collect_retired(&self) -> usize {
        let mut published = self.lock();
        published.collect_retired();
        published.retired.len()
    }

    // --- Real-time side (never blocks) ---

    /// Poll for a song newer than `known`. Pass 0 to always get the current one.
    pub fn try_snapshot(&self, known: SongVersion) -> Snapshot {
        let published = match self.published.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Snapshot::Contended,
        };
        if published.version == known {
            Snapshot::Unchanged
        } else {
            Snapshot::Updated(Arc::clone(&published.song), published.version)
        }
    }
}

impl Default for SongCell {
    fn default() -> Self {
        Self::new(Song::default())
    }
}

impl HoldGuard<'_> {
    /// Song as currently published.
    pub fn song(&self) -> &Song {
        &self.published.song
    }
}
