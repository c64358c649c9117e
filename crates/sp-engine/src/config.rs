//! Player configuration.

use sp_ir::MAX_TRACKS;
use thiserror::Error;
use tracing::warn;

use crate::host::CvInputMode;
use crate::voice::DEFAULT_RETRIGGER_SAMPLES;

/// Maximum voices per track.
pub const MAX_VOICES: usize = 16;

/// What happens to a section request made while the transport is stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoppedRequestPolicy {
    /// The next `step()` switches to the requested section; playback resumes
    /// there.
    #[default]
    ApplyWhileStopped,
    /// The request waits for the next section end, as while running.
    QueueUntilBoundary,
}

/// Out-of-range configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("track count {0} must be between 1 and 4")]
    TrackCount(usize),
    #[error("voice count {0} must be between 1 and 16")]
    VoiceCount(usize),
    #[error("command capacity must be at least 1")]
    CommandCapacity,
}

/// Player construction parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerConfig {
    pub num_tracks: usize,
    /// Active voices per track at startup
    pub voices_per_track: usize,
    /// Length of the forced gate-low gap between back-to-back notes
    pub retrigger_samples: u32,
    pub cv_input_mode: CvInputMode,
    pub stopped_request_policy: StoppedRequestPolicy,
    /// Slots in the editor → player command mailbox
    pub command_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            num_tracks: MAX_TRACKS,
            voices_per_track: MAX_VOICES,
            retrigger_samples: DEFAULT_RETRIGGER_SAMPLES,
            cv_input_mode: CvInputMode::default(),
            stopped_request_policy: StoppedRequestPolicy::default(),
            command_capacity: 64,
        }
    }
}

impl PlayerConfig {
    pub fn with_tracks(mut self, num_tracks: usize) -> Self {
        self.num_tracks = num_tracks;
        self
    }

    pub fn with_voices(mut self, voices_per_track: usize) -> Self {
        self.voices_per_track = voices_per_track;
        self
    }

    pub fn with_retrigger_samples(mut self, samples: u32) -> Self {
        self.retrigger_samples = samples;
        self
    }

    pub fn with_cv_input_mode(mut self, mode: CvInputMode) -> Self {
        self.cv_input_mode = mode;
        self
    }

    pub fn with_stopped_request_policy(mut self, policy: StoppedRequestPolicy) -> Self {
        self.stopped_request_policy = policy;
        self
    }

    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_TRACKS).contains(&self.num_tracks) {
            return Err(ConfigError::TrackCount(self.num_tracks));
        }
        if !(1..=MAX_VOICES).contains(&self.voices_per_track) {
            return Err(ConfigError::VoiceCount(self.voices_per_track));
        }
        if self.command_capacity == 0 {
            return Err(ConfigError::CommandCapacity);
        }
        Ok(())
    }

    /// Pull every value into range, logging what had to change.
    pub fn clamped(mut self) -> Self {
        if let Err(e) = self.validate() {
            warn!(error = %e, "clamping player config");
        }
        self.num_tracks = self.num_tracks.clamp(1, MAX_TRACKS);
        self.voices_per_track = self.voices_per_track.clamp(1, MAX_VOICES);
        self.command_capacity = self.command_capacity.max(1);
        self
    }
}
