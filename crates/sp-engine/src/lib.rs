//! Real-time section player for seqplay.
//!
//! Walks each track's current section, assigns notes to voices, and emits
//! gate/CV changes through a [`Host`]. Runs on the audio thread; the editor
//! reaches it through a [`PlayerRemote`] and edits songs through
//! [`sp_ir::SongCell`].

mod config;
mod event_queue;
mod host;
mod player;
mod remote;
mod track_player;
mod trigger;
mod voice;
mod voice_assigner;

#[cfg(test)]
mod testing;

pub use config::{ConfigError, PlayerConfig, StoppedRequestPolicy, MAX_VOICES};
pub use event_queue::{EventQueue, ResetRequest};
pub use host::{AtomicPort, CvInputMode, Host, Port, Ports, MAX_PORT_CHANNELS};
pub use player::Player;
pub use remote::{Command, PlayerRemote, Readback};
pub use track_player::{validate_section_request, EventCursor, TrackPlayer};
pub use trigger::{GateTrigger, GATE_HIGH_VOLTS, GATE_LOW_VOLTS};
pub use voice::{Voice, VoiceState, DEFAULT_RETRIGGER_SAMPLES};
pub use voice_assigner::VoiceAssigner;
