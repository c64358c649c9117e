//! Clips: one section's ordered event stream plus its options.

use alloc::vec::Vec;

use crate::error::SongError;
use crate::metric_time::MetricTime;

/// A note in a clip. `start` is relative to the clip's loop start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteEvent {
    /// Start time (quarter notes from the loop start)
    pub start: MetricTime,
    /// Length in quarter notes
    pub duration: f32,
    /// Pitch CV (1V/oct)
    pub pitch: f32,
}

impl NoteEvent {
    pub fn new(start: MetricTime, duration: f32, pitch: f32) -> Self {
        Self { start, duration, pitch }
    }

    /// Time the note ends, relative to the loop start.
    pub fn end(&self) -> MetricTime {
        self.start + self.duration as f64
    }
}

/// One entry in a clip's event stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClipEvent {
    /// Play a note
    Note(NoteEvent),
    /// End of the clip; `time` is the clip length
    End { time: MetricTime },
}

impl ClipEvent {
    /// Time of the event relative to the loop start.
    pub fn time(&self) -> MetricTime {
        match self {
            ClipEvent::Note(note) => note.start,
            ClipEvent::End { time } => *time,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, ClipEvent::End { .. })
    }
}

/// Per-clip playback options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipOptions {
    /// How many times the clip plays before moving on. 0 = forever.
    pub repeat_count: u32,
}

impl ClipOptions {
    pub fn repeat(repeat_count: u32) -> Self {
        Self { repeat_count }
    }

    pub fn is_infinite(&self) -> bool {
        self.repeat_count == 0
    }
}

/// A section's content: notes sorted by start time, terminated by `End`.
///
/// Every constructor and editing operation keeps the stream valid, so the
/// player can walk it with a plain index.
#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    events: Vec<ClipEvent>,
    pub options: ClipOptions,
}

impl Clip {
    /// Create an empty clip of the given length.
    pub fn new(length: MetricTime) -> Result<Self, SongError> {
        check_length(length)?;
        let mut events = Vec::new();
        events.push(ClipEvent::End { time: length });
        Ok(Self { events, options: ClipOptions::default() })
    }

    /// Build a clip from a complete event stream, validating it.
    pub fn from_events(events: Vec<ClipEvent>) -> Result<Self, SongError> {
        validate_events(&events)?;
        Ok(Self { events, options: ClipOptions::default() })
    }

    /// Builder-style variant of setting `options`.
    pub fn with_options(mut self, options: ClipOptions) -> Self {
        self.options = options;
        self
    }

    /// The full event stream, End included.
    pub fn events(&self) -> &[ClipEvent] {
        &self.events
    }

    /// Iterate over the notes only.
    pub fn notes(&self) -> impl Iterator<Item = &NoteEvent> + '_ {
        self.events.iter().filter_map(|e| match e {
            ClipEvent::Note(note) => Some(note),
            ClipEvent::End { .. } => None,
        })
    }

    pub fn note_count(&self) -> usize {
        self.events.len() - 1
    }

    /// Clip length (time of the End marker).
    pub fn length(&self) -> MetricTime {
        self.events.last().map(ClipEvent::time).unwrap_or(0.0)
    }

    /// Insert a note, keeping start order. Notes with equal starts keep
    /// insertion order.
    pub fn insert_note(&mut self, note: NoteEvent) -> Result<(), SongError> {
        let end = self.length();
        if note.start < 0.0 || note.start >= end {
            return Err(SongError::NoteAfterEnd { start: note.start, end });
        }
        let notes = self.note_count();
        let pos = self.events[..notes].partition_point(|e| e.time() <= note.start);
        self.events.insert(pos, ClipEvent::Note(note));
        Ok(())
    }

    /// Remove the `index`-th note.
    pub fn remove_note(&mut self, index: usize) -> Result<NoteEvent, SongError> {
        let count = self.note_count();
        if index >= count {
            return Err(SongError::NoteIndexOutOfRange { index, count });
        }
        match self.events.remove(index) {
            ClipEvent::Note(note) => Ok(note),
            ClipEvent::End { .. } => unreachable!("End is always last"),
        }
    }

    /// Move the End marker. Fails if a note would start past the new end.
    pub fn set_length(&mut self, length: MetricTime) -> Result<(), SongError> {
        check_length(length)?;
        if let Some(note) = self.notes().find(|n| n.start >= length) {
            return Err(SongError::NoteAfterEnd { start: note.start, end: length });
        }
        if let Some(last) = self.events.last_mut() {
            *last = ClipEvent::End { time: length };
        }
        Ok(())
    }

    /// Index of the first event at or after `time`. Always finds something,
    /// since End is last; past the End it returns the End index.
    pub fn seek(&self, time: MetricTime) -> usize {
        let notes = self.note_count();
        self.events[..notes].partition_point(|e| e.time() < time)
    }

    /// Index of the first event strictly after `time`.
    pub fn seek_after(&self, time: MetricTime) -> usize {
        let notes = self.note_count();
        self.events[..notes].partition_point(|e| e.time() <= time)
    }

    pub fn set_options(&mut self, options: ClipOptions) {
        self.options = options;
    }
}

fn check_length(length: MetricTime) -> Result<(), SongError> {
    if !(length.is_finite() && length > 0.0) {
        return Err(SongError::ZeroLengthClip(length));
    }
    Ok(())
}

/// Check ordering and termination of an event stream.
pub fn validate_events(events: &[ClipEvent]) -> Result<(), SongError> {
    let Some(last) = events.last() else {
        return Err(SongError::MissingEnd);
    };
    let ClipEvent::End { time: end } = *last else {
        return Err(SongError::MissingEnd);
    };
    check_length(end)?;

    let mut previous = 0.0;
    for (index, event) in events[..events.len() - 1].iter().enumerate() {
        match event {
            ClipEvent::End { .. } => return Err(SongError::EndNotLast { index }),
            ClipEvent::Note(note) => {
                if note.start < previous {
                    return Err(SongError::EventsOutOfOrder {
                        index,
                        time: note.start,
                        previous,
                    });
                }
                if note.start >= end {
                    return Err(SongError::NoteAfterEnd { start: note.start, end });
                }
                previous = note.start;
            }
        }
    }
    Ok(())
}
