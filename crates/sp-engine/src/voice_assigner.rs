//! VoiceAssigner: picks which voice plays the next note.

use tracing::trace;

use crate::voice::Voice;

/// Allocation policy over a track's voices. Holds no note data of its own;
/// everything it decides is based on the voices' current state.
///
/// Order of preference:
/// 1. an idle voice that last played the same pitch
/// 2. the first idle voice at or after the rotation cursor
/// 3. the voice under the cursor, stolen
#[derive(Clone, Debug)]
pub struct VoiceAssigner {
    num_voices: usize,
    next_voice: usize,
}

impl VoiceAssigner {
    pub fn new(num_voices: usize) -> Self {
        Self { num_voices, next_voice: 0 }
    }

    pub fn num_voices(&self) -> usize {
        self.num_voices
    }

    /// Rotation cursor.
    pub fn next_voice(&self) -> usize {
        self.next_voice
    }

    /// Limit future scans to voices `0..n`.
    pub fn set_num_voices(&mut self, n: usize) {
        self.num_voices = n;
        if self.next_voice >= n {
            self.next_voice = 0;
        }
    }

    /// Move the cursor back to voice 0. Voice states are untouched.
    pub fn reset(&mut self) {
        self.next_voice = 0;
    }

    /// Choose a voice for `pitch`. `None` only when no voices are enabled.
    pub fn get_next(&mut self, voices: &[Voice], pitch: f32) -> Option<usize> {
        let n = self.num_voices.min(voices.len());
        if n == 0 {
            return None;
        }
        if self.next_voice >= n {
            self.next_voice = 0;
        }

        if let Some(i) = voices[..n]
            .iter()
            .position(|v| v.is_idle() && v.pitch() == Some(pitch))
        {
            if i == self.next_voice {
                self.advance_past(i, n);
            }
            return Some(i);
        }

        if let Some(i) = (0..n)
            .map(|k| (self.next_voice + k) % n)
            .find(|&i| voices[i].is_idle())
        {
            self.advance_past(i, n);
            return Some(i);
        }

        let stolen = self.next_voice;
        trace!(voice = stolen, "stealing voice");
        self.advance_past(stolen, n);
        Some(stolen)
    }

    fn advance_past(&mut self, index: usize, n: usize) {
        self.next_voice = (index + 1) % n;
    }
}
