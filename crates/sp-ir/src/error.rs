//! Errors raised while building or editing songs.
//!
//! These only ever surface on the editor side. The real-time player treats a
//! malformed stream as a broken contract and does not recover from it.

use thiserror::Error;

/// Error type for song construction and editing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SongError {
    /// An event starts before the event preceding it.
    #[error("event {index} at {time} starts before the previous event at {previous}")]
    EventsOutOfOrder { index: usize, time: f64, previous: f64 },
    /// The stream has no terminating End marker.
    #[error("event stream has no End marker")]
    MissingEnd,
    /// An End marker appears before the last position.
    #[error("End marker at index {index} is not the last event")]
    EndNotLast { index: usize },
    /// A note starts at or after the End marker.
    #[error("note at {start} starts at or after the clip end {end}")]
    NoteAfterEnd { start: f64, end: f64 },
    /// The clip length is zero, negative or not finite.
    #[error("clip length {0} must be positive")]
    ZeroLengthClip(f64),
    /// Track index past the song's track count.
    #[error("track {track} out of range (song has {count})")]
    TrackOutOfRange { track: usize, count: usize },
    /// Section index past `MAX_SECTIONS`.
    #[error("section {0} out of range")]
    SectionOutOfRange(usize),
    /// Note index past the clip's note count.
    #[error("note {index} out of range (clip has {count})")]
    NoteIndexOutOfRange { index: usize, count: usize },
}
