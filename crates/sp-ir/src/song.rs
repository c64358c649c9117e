//! Song structure: up to four tracks, each with up to four sections.

use arrayvec::{ArrayString, ArrayVec};

use crate::clip::Clip;
use crate::error::SongError;

/// Maximum number of tracks in a song.
pub const MAX_TRACKS: usize = 4;

/// Maximum number of sections (clips) per track.
pub const MAX_SECTIONS: usize = 4;

/// A complete song.
#[derive(Clone, Debug, Default)]
pub struct Song {
    /// Song title
    pub title: ArrayString<32>,
    tracks: ArrayVec<Track, MAX_TRACKS>,
}

impl Song {
    /// Create a new empty song with no tracks.
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        let _ = song.title.try_push_str(title);
        song
    }

    /// Create a song with `num_tracks` empty tracks (clamped to `MAX_TRACKS`).
    pub fn with_tracks(title: &str, num_tracks: usize) -> Self {
        let mut song = Self::new(title);
        for _ in 0..num_tracks.min(MAX_TRACKS) {
            song.tracks.push(Track::default());
        }
        song
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Result<&mut Track, SongError> {
        let count = self.tracks.len();
        self.tracks
            .get_mut(index)
            .ok_or(SongError::TrackOutOfRange { track: index, count })
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> + '_ {
        self.tracks.iter()
    }

    /// Clip at `section` (0-based) of `track`, if both exist.
    pub fn clip(&self, track: usize, section: usize) -> Option<&Clip> {
        self.track(track)?.section(section)
    }

    /// Put `clip` into a section slot, replacing what was there.
    pub fn set_clip(&mut self, track: usize, section: usize, clip: Option<Clip>) -> Result<(), SongError> {
        self.track_mut(track)?.set_section(section, clip)
    }
}

/// One track: a row of alternative sections.
#[derive(Clone, Debug, Default)]
pub struct Track {
    /// Name of the track
    pub name: ArrayString<32>,
    sections: [Option<Clip>; MAX_SECTIONS],
}

impl Track {
    pub fn new(name: &str) -> Self {
        let mut track = Self::default();
        let _ = track.name.try_push_str(name);
        track
    }

    /// Clip in the 0-based `section` slot.
    pub fn section(&self, section: usize) -> Option<&Clip> {
        self.sections.get(section)?.as_ref()
    }

    pub fn section_mut(&mut self, section: usize) -> Option<&mut Clip> {
        self.sections.get_mut(section)?.as_mut()
    }

    pub fn set_section(&mut self, section: usize, clip: Option<Clip>) -> Result<(), SongError> {
        let slot = self
            .sections
            .get_mut(section)
            .ok_or(SongError::SectionOutOfRange(section))?;
        *slot = clip;
        Ok(())
    }

    /// Does the 0-based `section` hold a playable clip?
    pub fn has_content(&self, section: usize) -> bool {
        self.section(section).is_some()
    }

    /// True if no section is playable.
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(Option::is_none)
    }
}
