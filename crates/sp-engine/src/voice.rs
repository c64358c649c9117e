//! Voice: one gate + pitch output pair and its note lifecycle.

use sp_ir::MetricTime;

use crate::host::Host;

/// Default retrigger gap, about 1 ms at 44.1 kHz.
pub const DEFAULT_RETRIGGER_SAMPLES: u32 = 44;

/// Voice lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    /// No note; gate low.
    #[default]
    Idle,
    /// Gate high until `note_off_time`.
    Playing,
    /// Gate forced low for a few samples before a note that starts exactly
    /// where the previous one ended.
    Retriggering,
}

/// A note waiting out the retrigger gap.
#[derive(Clone, Copy, Debug, PartialEq)]
struct DelayedNote {
    pitch: f32,
    end_time: MetricTime,
}

/// A single output voice.
#[derive(Clone, Debug)]
pub struct Voice {
    index: usize,
    track: usize,
    state: VoiceState,
    /// Last pitch sent to this voice; kept while idle for reuse.
    current_pitch: Option<f32>,
    note_off_time: Option<MetricTime>,
    last_note_off_time: Option<MetricTime>,
    delayed: Option<DelayedNote>,
    retrigger_samples_remaining: i64,
    retrigger_sample_count: u32,
    /// Last gate level sent to the host
    gate: bool,
}

impl Voice {
    pub fn new(track: usize, index: usize) -> Self {
        Self {
            index,
            track,
            state: VoiceState::Idle,
            current_pitch: None,
            note_off_time: None,
            last_note_off_time: None,
            delayed: None,
            retrigger_samples_remaining: 0,
            retrigger_sample_count: DEFAULT_RETRIGGER_SAMPLES,
            gate: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == VoiceState::Idle
    }

    /// Whether the gate output is high. An idle voice can still hold its
    /// gate high after a reset that left gates alone.
    pub fn gate(&self) -> bool {
        self.gate
    }

    pub fn pitch(&self) -> Option<f32> {
        self.current_pitch
    }

    pub fn note_off_time(&self) -> Option<MetricTime> {
        self.note_off_time
    }

    pub fn set_sample_count_for_retrigger(&mut self, samples: u32) {
        self.retrigger_sample_count = samples;
    }

    /// Start a note, cutting whatever the voice was doing.
    ///
    /// A note that begins exactly when this voice's previous note ended goes
    /// through `Retriggering` so the gate visibly drops between the two.
    pub fn play_note<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        pitch: f32,
        current_time: MetricTime,
        end_time: MetricTime,
    ) {
        self.current_pitch = Some(pitch);
        if self.last_note_off_time == Some(current_time) {
            self.set_gate(host, false);
            self.delayed = Some(DelayedNote { pitch, end_time });
            self.note_off_time = None;
            self.retrigger_samples_remaining = self.retrigger_sample_count as i64;
            self.state = VoiceState::Retriggering;
        } else {
            host.set_cv(self.track, self.index, pitch);
            self.set_gate(host, true);
            self.delayed = None;
            self.note_off_time = Some(end_time);
            self.state = VoiceState::Playing;
        }
    }

    /// End the note if its off time has come. Returns true if it did.
    pub fn update_to_metric_time<H: Host + ?Sized>(&mut self, host: &mut H, time: MetricTime) -> bool {
        if self.state != VoiceState::Playing {
            return false;
        }
        match self.note_off_time {
            Some(off) if off <= time => {
                self.set_gate(host, false);
                self.last_note_off_time = Some(off);
                self.note_off_time = None;
                self.state = VoiceState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Count down the retrigger gap; release the delayed note when it runs out.
    pub fn update_sample_count<H: Host + ?Sized>(&mut self, host: &mut H, samples: u32) {
        if self.state != VoiceState::Retriggering {
            return;
        }
        self.retrigger_samples_remaining -= samples as i64;
        if self.retrigger_samples_remaining > 0 {
            return;
        }
        if let Some(note) = self.delayed.take() {
            host.set_cv(self.track, self.index, note.pitch);
            self.note_off_time = Some(note.end_time);
            self.set_gate(host, true);
            self.state = VoiceState::Playing;
        } else {
            self.state = VoiceState::Idle;
        }
    }

    /// Force the voice idle and forget its timers.
    pub fn reset<H: Host + ?Sized>(&mut self, host: &mut H, clear_gate: bool) {
        self.state = VoiceState::Idle;
        self.current_pitch = None;
        self.note_off_time = None;
        self.last_note_off_time = None;
        self.delayed = None;
        self.retrigger_samples_remaining = 0;
        if clear_gate {
            self.set_gate(host, false);
        }
    }

    fn set_gate<H: Host + ?Sized>(&mut self, host: &mut H, gate: bool) {
        self.gate = gate;
        host.set_gate(self.track, self.index, gate);
    }
}
