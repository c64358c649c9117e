//! Song model for the seqplay section player.
//!
//! A song has up to four tracks; each track has up to four alternative
//! sections ("clips"), each an ordered stream of notes closed by an End
//! marker. The model is `no_std` compatible with `alloc`; the shared
//! [`SongCell`] handoff needs `std`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
mod cell;
mod clip;
mod error;
mod metric_time;
mod song;

#[cfg(feature = "std")]
pub use cell::{HoldGuard, Snapshot, SongCell, SongVersion};
pub use clip::{validate_events, Clip, ClipEvent, ClipOptions, NoteEvent};
pub use error::SongError;
pub use metric_time::{quantize_down, samples_to_metric, MetricTime};
pub use song::{Song, Track, MAX_SECTIONS, MAX_TRACKS};
