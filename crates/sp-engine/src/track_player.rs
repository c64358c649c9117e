//! TrackPlayer: one track's timeline, sections, loops and voices.
//!
//! Each quantum the host calls `step()` (service queued work and CV input),
//! then `update_to_metric_time()` (play everything due), then, as audio is
//! rendered, `update_sample_count()` (retrigger timers).
//!
//! The track reads song data from its own `Arc<Song>` snapshot. The shared
//! [`SongCell`] belongs to the [`Player`](crate::Player) and is only touched
//! for a non-blocking poll of the published version; if the editor holds it,
//! the tick is skipped after silencing the voices.

use std::sync::Arc;

use heapless::Vec as HVec;
use sp_ir::{quantize_down, ClipEvent, MetricTime, Snapshot, Song, SongCell, SongVersion, MAX_SECTIONS};
use tracing::debug;

use crate::config::{PlayerConfig, StoppedRequestPolicy, MAX_VOICES};
use crate::event_queue::{EventQueue, ResetRequest};
use crate::host::{CvInputMode, Host, Ports};
use crate::trigger::GateTrigger;
use crate::voice::Voice;
use crate::voice_assigner::VoiceAssigner;

/// Position in the current section's event stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventCursor {
    /// Index of the next event to play
    At(usize),
    /// No section is playable; nothing will fire
    Exhausted,
}

/// Where the track is in its song.
#[derive(Clone, Copy, Debug)]
struct Playback {
    /// 0-based section, `None` when halted
    section: Option<usize>,
    cursor: EventCursor,
    /// Metric time at which the current loop iteration started
    loop_start: MetricTime,
    /// Last quantized time seen by `update_to_metric_time`
    last_quantized: MetricTime,
}

impl Playback {
    fn rewound() -> Self {
        Self {
            section: None,
            cursor: EventCursor::Exhausted,
            loop_start: 0.0,
            last_quantized: 0.0,
        }
    }
}

/// Loop bookkeeping for the current section.
#[derive(Clone, Copy, Debug, Default)]
struct Repeats {
    /// Plays the section gets in total; 0 = forever
    total: u32,
    /// Plays left including the current one (finite sections only)
    remaining: u32,
    /// 1-based count of plays since the section was entered
    current: u32,
}

/// 1-based section to play, searching forward with wraparound from `section`
/// for one with content. 0 if the track has nothing playable.
pub fn validate_section_request(section: usize, song: &Song, track: usize) -> usize {
    let Some(track) = song.track(track) else {
        return 0;
    };
    let start = section.saturating_sub(1) % MAX_SECTIONS;
    (0..MAX_SECTIONS)
        .map(|k| (start + k) % MAX_SECTIONS)
        .find(|&s| track.has_content(s))
        .map_or(0, |s| s + 1)
}

/// Like [`validate_section_request`] but searching backward.
fn validate_section_request_backward(section: usize, song: &Song, track: usize) -> usize {
    let Some(track) = song.track(track) else {
        return 0;
    };
    let start = section.saturating_sub(1) % MAX_SECTIONS;
    (0..MAX_SECTIONS)
        .map(|k| (start + MAX_SECTIONS - k) % MAX_SECTIONS)
        .find(|&s| track.has_content(s))
        .map_or(0, |s| s + 1)
}

/// Plays one track of a song.
pub struct TrackPlayer {
    track_index: usize,
    cv_input_mode: CvInputMode,
    policy: StoppedRequestPolicy,
    voices: HVec<Voice, MAX_VOICES>,
    assigner: VoiceAssigner,
    playback: Playback,
    queue: EventQueue,
    repeats: Repeats,
    snapshot: Arc<Song>,
    snapshot_version: SongVersion,
    running: bool,
    next_trigger: GateTrigger,
    prev_trigger: GateTrigger,
    last_section_cv: Option<i32>,
}

impl TrackPlayer {
    /// Create a player for `track_index`. Loads the current song from `song`,
    /// which may block briefly; call this off the real-time thread.
    pub fn new(track_index: usize, song: &SongCell, config: &PlayerConfig) -> Self {
        let mut voices = HVec::new();
        for i in 0..MAX_VOICES {
            let mut voice = Voice::new(track_index, i);
            voice.set_sample_count_for_retrigger(config.retrigger_samples);
            let _ = voices.push(voice);
        }
        let (snapshot, snapshot_version) = song.load_versioned();
        Self {
            track_index,
            cv_input_mode: config.cv_input_mode,
            policy: config.stopped_request_policy,
            voices,
            assigner: VoiceAssigner::new(config.voices_per_track.min(MAX_VOICES)),
            playback: Playback::rewound(),
            queue: EventQueue::new(),
            repeats: Repeats::default(),
            snapshot,
            snapshot_version,
            running: false,
            next_trigger: GateTrigger::new(),
            prev_trigger: GateTrigger::new(),
            last_section_cv: None,
        }
    }

    // --- Queued work ---

    /// Service queued work and poll CV input, whether or not the transport
    /// runs. Returns true if the host clock should restart.
    pub fn step<H: Host + ?Sized>(&mut self, host: &mut H, ports: &Ports) -> bool {
        let mut reset_clock = false;

        if let Some(reset) = self.queue.take_reset() {
            self.apply_reset(host, reset);
            reset_clock = reset.reset_sections;
        }

        self.poll_for_cv_change(ports);

        if self.queue.startup() {
            self.queue.finish_startup();
            let first = self.queue.take_section().unwrap_or(1);
            self.setup_to_play_different_section(first);
        }

        if self.queue.next_section() != 0 {
            let stopped_apply = self.queue.set_while_stopped()
                && self.policy == StoppedRequestPolicy::ApplyWhileStopped;
            let immediate = self.queue.apply_immediately();
            if stopped_apply || immediate {
                if let Some(section) = self.queue.take_section() {
                    if immediate {
                        self.reset_voices(host, true);
                    }
                    self.playback.loop_start = self.playback.last_quantized;
                    self.setup_to_play_different_section(section);
                }
            }
        }

        reset_clock
    }

    /// Drop everything playing and start `song` from its first playable
    /// section, or from a pending request.
    pub fn install_song<H: Host + ?Sized>(&mut self, host: &mut H, song: Arc<Song>, version: SongVersion) {
        debug!(track = self.track_index, version, "new song");
        self.snapshot = song;
        self.snapshot_version = version;
        self.reset_voices(host, true);
        self.playback = Playback::rewound();
        self.queue.finish_startup();
        let first = self.queue.take_section().unwrap_or(1);
        self.setup_to_play_different_section(first);
    }

    fn apply_reset<H: Host + ?Sized>(&mut self, host: &mut H, reset: ResetRequest) {
        debug!(
            track = self.track_index,
            clear_gates = reset.clear_gates,
            reset_sections = reset.reset_sections,
            "reset"
        );
        self.reset(host, reset.clear_gates, reset.reset_sections);
    }

    /// Silence the track and rewind to the top of the current section, or of
    /// the first playable section when `reset_section_index` is set.
    pub fn reset<H: Host + ?Sized>(&mut self, host: &mut H, reset_gates: bool, reset_section_index: bool) {
        self.reset_voices(host, reset_gates);
        let section = self.playback.section;
        self.playback = Playback::rewound();
        self.next_trigger.reset();
        self.prev_trigger.reset();
        if reset_section_index {
            self.queue.take_section();
            self.setup_to_play_different_section(1);
        } else {
            match section {
                Some(s) => self.setup_to_play_different_section(s + 1),
                None => self.setup_to_play_different_section(1),
            }
        }
    }

    fn reset_voices<H: Host + ?Sized>(&mut self, host: &mut H, clear_gates: bool) {
        for voice in self.voices.iter_mut() {
            voice.reset(host, clear_gates);
        }
        self.assigner.reset();
    }

    /// Force low every gate that is not already low and idle the voices.
    pub fn silence<H: Host + ?Sized>(&mut self, host: &mut H) {
        for voice in self.voices.iter_mut() {
            if !voice.is_idle() || voice.gate() {
                voice.reset(host, true);
            }
        }
        self.assigner.reset();
    }

    // --- Scheduling ---

    /// Advance to `metric_time`, first taking any newer version of `song`
    /// into use. Returns true if the song was locked by the editor, in which
    /// case the track was silenced and nothing played.
    pub fn update_to_metric_time<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        song: &SongCell,
        metric_time: MetricTime,
        quantization_interval: f32,
        running: bool,
    ) -> bool {
        if !running {
            return false;
        }

        match song.try_snapshot(self.snapshot_version) {
            Snapshot::Contended => {
                self.silence(host);
                return true;
            }
            Snapshot::Updated(song, version) => self.adopt_snapshot(song, version),
            Snapshot::Unchanged => {}
        }

        for voice in self.voices.iter_mut() {
            voice.update_to_metric_time(host, metric_time);
        }
        while self.play_once(host, metric_time, quantization_interval) {}
        false
    }

    /// Play the next due event, if any. Call until it returns false to drain
    /// everything due at this instant.
    pub fn play_once<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        metric_time: MetricTime,
        quantization_interval: f32,
    ) -> bool {
        let now = quantize_down(metric_time, quantization_interval);
        if now > self.playback.last_quantized {
            self.playback.last_quantized = now;
        }

        let Some(section) = self.playback.section else {
            return false;
        };
        let EventCursor::At(index) = self.playback.cursor else {
            return false;
        };
        // adopt_snapshot keeps section and cursor valid for the snapshot
        let Some(clip) = self.snapshot.clip(self.track_index, section) else {
            return false;
        };
        debug_assert!(index < clip.events().len(), "event cursor past End marker");
        let Some(&event) = clip.events().get(index) else {
            return false;
        };

        let event_time = self.playback.loop_start + event.time();
        if event_time > now {
            return false;
        }

        match event {
            ClipEvent::Note(note) => {
                let end_time = event_time + note.duration as f64;
                if let Some(v) = self.assigner.get_next(&self.voices, note.pitch) {
                    self.voices[v].play_note(host, note.pitch, event_time, end_time);
                }
                self.playback.cursor = EventCursor::At(index + 1);
            }
            ClipEvent::End { time } => {
                self.playback.loop_start += time;
                self.on_section_end();
            }
        }
        true
    }

    fn on_section_end(&mut self) {
        if let Some(section) = self.queue.take_section() {
            self.setup_to_play_different_section(section);
            return;
        }
        if self.repeats.total == 0 {
            self.rewind_loop();
            return;
        }
        self.repeats.remaining = self.repeats.remaining.saturating_sub(1);
        if self.repeats.remaining > 0 {
            self.rewind_loop();
        } else {
            self.setup_to_play_next_section();
        }
    }

    fn rewind_loop(&mut self) {
        self.playback.cursor = EventCursor::At(0);
        self.repeats.current += 1;
    }

    /// Move on to the next section with content after the current one,
    /// wrapping. Halts if the track has nothing playable.
    pub fn setup_to_play_next_section(&mut self) {
        let after = self.playback.section.map_or(0, |s| s + 1);
        let next = validate_section_request(after % MAX_SECTIONS + 1, &self.snapshot, self.track_index);
        self.enter_section(next);
    }

    /// Jump to the 1-based `section`, or the next playable one after it.
    pub fn setup_to_play_different_section(&mut self, section: usize) {
        let section = validate_section_request(section, &self.snapshot, self.track_index);
        self.enter_section(section);
    }

    fn enter_section(&mut self, section: usize) {
        let clip = section
            .checked_sub(1)
            .and_then(|s| self.snapshot.clip(self.track_index, s).map(|c| (s, c)));
        match clip {
            Some((s, clip)) => {
                let total = clip.options.repeat_count;
                self.playback.section = Some(s);
                self.playback.cursor = EventCursor::At(0);
                self.repeats = Repeats { total, remaining: total, current: 1 };
                debug!(track = self.track_index, section, "entering section");
            }
            None => {
                if self.playback.section.is_some() {
                    debug!(track = self.track_index, "no playable section, halting");
                }
                self.playback.section = None;
                self.playback.cursor = EventCursor::Exhausted;
                self.repeats = Repeats::default();
            }
        }
    }

    /// Take a newer snapshot into use at the same position. Events inserted
    /// before the cursor but after the current time still play.
    fn adopt_snapshot(&mut self, song: Arc<Song>, version: SongVersion) {
        let resume_at = match (self.playback.section, self.playback.cursor) {
            (Some(s), EventCursor::At(i)) => self
                .snapshot
                .clip(self.track_index, s)
                .and_then(|clip| clip.events().get(i))
                .map(ClipEvent::time),
            _ => None,
        };
        self.snapshot = song;
        self.snapshot_version = version;

        match self.playback.section {
            Some(s) => match self.snapshot.clip(self.track_index, s) {
                Some(clip) => {
                    let position = self.playback.last_quantized - self.playback.loop_start;
                    let index = clip
                        .seek(resume_at.unwrap_or(0.0))
                        .min(clip.seek_after(position));
                    self.playback.cursor = EventCursor::At(index);
                    let total = clip.options.repeat_count;
                    if total != self.repeats.total {
                        let played = self.repeats.current.saturating_sub(1);
                        self.repeats.total = total;
                        self.repeats.remaining = total.saturating_sub(played).max(1);
                    }
                }
                None => {
                    self.playback.loop_start = self.playback.last_quantized;
                    self.setup_to_play_next_section();
                }
            },
            None => {
                self.playback.loop_start = self.playback.last_quantized;
                self.setup_to_play_different_section(1);
            }
        }
    }

    // --- Retrigger timing ---

    pub fn update_sample_count<H: Host + ?Sized>(&mut self, host: &mut H, samples: u32) {
        for voice in self.voices.iter_mut() {
            voice.update_sample_count(host, samples);
        }
    }

    pub fn set_sample_count_for_retrigger(&mut self, samples: u32) {
        for voice in self.voices.iter_mut() {
            voice.set_sample_count_for_retrigger(samples);
        }
    }

    pub fn set_num_voices(&mut self, n: usize) {
        self.assigner.set_num_voices(n.min(MAX_VOICES));
    }

    pub fn num_voices(&self) -> usize {
        self.assigner.num_voices()
    }

    // --- Section requests ---

    /// Queue a 1-based section (0 cancels). Applied at the next section end,
    /// or sooner when stopped or when `immediately` is set.
    pub fn set_next_section_request(&mut self, section: usize, immediately: bool) {
        let section = if section == 0 {
            0
        } else {
            validate_section_request(section, &self.snapshot, self.track_index)
        };
        self.queue.request_section(section, !self.running, immediately);
    }

    pub fn get_next_section_request(&self) -> usize {
        self.queue.next_section()
    }

    /// 1-based section being played, 0 if halted.
    pub fn get_section(&self) -> usize {
        self.playback.section.map_or(0, |s| s + 1)
    }

    /// How many times the current section has started since it was entered.
    pub fn get_current_repetition(&self) -> u32 {
        self.repeats.current
    }

    pub fn current_loop_start(&self) -> MetricTime {
        self.playback.loop_start
    }

    pub fn cursor(&self) -> EventCursor {
        self.playback.cursor
    }

    pub fn request_reset(&mut self, clear_gates: bool, reset_section_index: bool) {
        self.queue.request_reset(clear_gates, reset_section_index);
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn snapshot_version(&self) -> SongVersion {
        self.snapshot_version
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    // --- CV input ---

    pub fn set_cv_input_mode(&mut self, mode: CvInputMode) {
        self.cv_input_mode = mode;
        self.last_section_cv = None;
        self.next_trigger.reset();
        self.prev_trigger.reset();
    }

    /// Turn CV input into section requests.
    pub fn poll_for_cv_change(&mut self, ports: &Ports) {
        let Some(cv) = ports.cv.as_deref() else {
            return;
        };
        if cv.channels() == 0 {
            return;
        }
        let immediately = ports.trigger_high();

        match self.cv_input_mode {
            CvInputMode::Poly | CvInputMode::Abs => {
                let volts = if self.cv_input_mode == CvInputMode::Poly {
                    cv.poly_voltage(self.track_index)
                } else {
                    cv.voltage(0)
                };
                let requested = libm::roundf(volts) as i32;
                if self.last_section_cv != Some(requested) {
                    self.last_section_cv = Some(requested);
                    if (1..=MAX_SECTIONS as i32).contains(&requested) {
                        self.set_next_section_request(requested as usize, immediately);
                    }
                }
            }
            CvInputMode::Next => {
                if self.next_trigger.process(cv.poly_voltage(self.track_index)) {
                    let from = self.request_or_current();
                    let next = validate_section_request(from % MAX_SECTIONS + 1, &self.snapshot, self.track_index);
                    self.queue.request_section(next, !self.running, immediately);
                }
            }
            CvInputMode::Prev => {
                if self.prev_trigger.process(cv.poly_voltage(self.track_index)) {
                    let from = self.request_or_current();
                    let prev = if from <= 1 { MAX_SECTIONS } else { from - 1 };
                    let prev = validate_section_request_backward(prev, &self.snapshot, self.track_index);
                    self.queue.request_section(prev, !self.running, immediately);
                }
            }
        }
    }

    fn request_or_current(&self) -> usize {
        match self.queue.next_section() {
            0 => self.get_section(),
            pending => pending,
        }
    }
}
