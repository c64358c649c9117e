//! Headless controller for seqplay.
//!
//! Owns the editor side of a song and drives a [`Player`] from a simulated
//! audio clock, either offline ([`Controller::render_transitions`]) or on a
//! background thread paced like an audio callback ([`Controller::play`]).

mod clock;
mod recording;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use sp_engine::{Command, ConfigError, Player, PlayerConfig, PlayerRemote};
use thiserror::Error;
use tracing::{debug, info};

// Re-export common types so callers don't need sp-ir/sp-engine directly.
pub use clock::{ClockConfig, ClockError, SimClock};
pub use recording::{Change, RecordingHost, Transition};
pub use sp_engine::CvInputMode;
pub use sp_ir::{Clip, ClipOptions, MetricTime, NoteEvent, Song, SongCell, SongError};

/// Transitions kept by the real-time playback thread.
const PLAYBACK_LOG_LIMIT: usize = 1 << 16;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("player is not running")]
    NotPlaying,
    #[error("command mailbox is full")]
    MailboxFull,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Clock(#[from] ClockError),
}

/// Headless section player controller: owns a song and manages playback.
pub struct Controller {
    song: Arc<SongCell>,
    player_config: PlayerConfig,
    clock: ClockConfig,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    remote: PlayerRemote,
    stop_signal: Arc<AtomicBool>,
    /// Metric time as f64 bits
    position: Arc<AtomicU64>,
    thread: Option<JoinHandle<RecordingHost>>,
}

impl Controller {
    pub fn new(song: Song) -> Self {
        Self {
            song: Arc::new(SongCell::new(song)),
            player_config: PlayerConfig::default(),
            clock: ClockConfig::default(),
            playback: None,
        }
    }

    pub fn with_config(song: Song, player_config: PlayerConfig, clock: ClockConfig) -> Result<Self, ControllerError> {
        player_config.validate()?;
        clock.validate()?;
        Ok(Self {
            song: Arc::new(SongCell::new(song)),
            player_config,
            clock,
            playback: None,
        })
    }

    pub fn clock(&self) -> &ClockConfig {
        &self.clock
    }

    // --- Song management ---

    /// Shared cell of the current song. Clone it to edit from another thread.
    pub fn song(&self) -> &Arc<SongCell> {
        &self.song
    }

    /// Edit the current song; a running player picks the change up.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Song) -> Result<R, SongError>) -> Result<R, SongError> {
        self.song.edit(f)
    }

    /// Switch to a different song. A running player restarts from its first
    /// section.
    pub fn load_song(&mut self, song: Song) -> Result<(), ControllerError> {
        self.song = Arc::new(SongCell::new(song));
        let song = Arc::clone(&self.song);
        match self.playback.as_mut() {
            Some(pb) => send(&mut pb.remote, Command::SetSong(song)),
            None => Ok(()),
        }
    }

    // --- Real-time playback ---

    pub fn play(&mut self) {
        self.stop();

        let (mut player, remote) = Player::new(
            self.player_config.clone(),
            Arc::clone(&self.song),
            RecordingHost::bounded(PLAYBACK_LOG_LIMIT),
        );
        player.set_running_status(true);

        let stop_signal = Arc::new(AtomicBool::new(false));
        let position = Arc::new(AtomicU64::new(0.0f64.to_bits()));
        let stop = stop_signal.clone();
        let pos = position.clone();
        let clock = SimClock::new(self.clock);

        let thread = std::thread::spawn(move || playback_thread(player, clock, stop, pos));
        info!(bpm = self.clock.bpm, "playback started");

        self.playback = Some(PlaybackHandle {
            remote,
            stop_signal,
            position,
            thread: Some(thread),
        });
    }

    /// Stop playback, returning what the player emitted.
    pub fn stop(&mut self) -> Option<RecordingHost> {
        let mut pb = self.playback.take()?;
        pb.stop_signal.store(true, Ordering::Relaxed);
        let host = pb.thread.take().and_then(|handle| handle.join().ok());
        debug!("playback stopped");
        host
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_some()
    }

    /// Metric time the playback thread last reached.
    pub fn position(&self) -> Option<MetricTime> {
        let pb = self.playback.as_ref()?;
        Some(f64::from_bits(pb.position.load(Ordering::Relaxed)))
    }

    pub fn set_next_section(&mut self, track: usize, section: usize) -> Result<(), ControllerError> {
        let pb = self.playback.as_mut().ok_or(ControllerError::NotPlaying)?;
        send(&mut pb.remote, Command::SetNextSection { track, section })
    }

    pub fn reset(&mut self, clear_gates: bool, reset_sections: bool) -> Result<(), ControllerError> {
        let pb = self.playback.as_mut().ok_or(ControllerError::NotPlaying)?;
        send(&mut pb.remote, Command::Reset { clear_gates, reset_sections })
    }

    pub fn set_running(&mut self, running: bool) -> Result<(), ControllerError> {
        let pb = self.playback.as_mut().ok_or(ControllerError::NotPlaying)?;
        send(&mut pb.remote, Command::SetRunning(running))
    }

    /// 1-based section playing on `track`; 0 when halted or stopped.
    pub fn section(&self, track: usize) -> usize {
        self.playback.as_ref().map_or(0, |pb| pb.remote.section(track))
    }

    pub fn next_section_request(&self, track: usize) -> usize {
        self.playback
            .as_ref()
            .map_or(0, |pb| pb.remote.next_section_request(track))
    }

    // --- Offline rendering ---

    /// Render `bars` bars of 4/4 as fast as possible and return every output
    /// change.
    pub fn render_transitions(&self, bars: u32) -> Vec<Transition> {
        render_transitions(Arc::clone(&self.song), self.player_config.clone(), self.clock, bars)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn send(remote: &mut PlayerRemote, command: Command) -> Result<(), ControllerError> {
    remote.send(command).map_err(|_| ControllerError::MailboxFull)
}

/// Render `bars` bars of `song` offline and return every output change.
pub fn render_transitions(
    song: Arc<SongCell>,
    config: PlayerConfig,
    clock: ClockConfig,
    bars: u32,
) -> Vec<Transition> {
    render(song, config, clock, bars).take_transitions()
}

/// Render `bars` bars of `song` offline, returning the host with its log
/// and counters.
pub fn render(song: Arc<SongCell>, config: PlayerConfig, clock: ClockConfig, bars: u32) -> RecordingHost {
    let (mut player, _remote) = Player::new(config, song, RecordingHost::new());
    player.set_running_status(true);
    let mut sim = SimClock::new(clock);

    let total = clock.samples_for_beats(bars as f64 * 4.0);
    let mut rendered = 0u64;
    while rendered < total {
        run_block(&mut player, &mut sim);
        rendered += clock.block_size as u64;
    }
    debug!(samples = rendered, "render finished");
    player.into_host()
}

/// One processing quantum: service queues, schedule, advance retrigger timers.
pub fn run_block(player: &mut Player<RecordingHost>, clock: &mut SimClock) {
    player.step();
    if player.host_mut().take_clock_reset() {
        clock.reset();
    }
    let now = clock.metric_time();
    let running = player.running();
    player.host_mut().set_time(now);
    player.update_to_metric_time(now, clock.config().quantization, running);
    player.update_sample_count(clock.config().block_size as u32);
    if running {
        clock.advance();
    }
}

fn playback_thread(
    mut player: Player<RecordingHost>,
    mut clock: SimClock,
    stop_signal: Arc<AtomicBool>,
    position: Arc<AtomicU64>,
) -> RecordingHost {
    let block = clock.config().block_duration();
    while !stop_signal.load(Ordering::Relaxed) {
        run_block(&mut player, &mut clock);
        position.store(clock.metric_time().to_bits(), Ordering::Relaxed);
        std::thread::sleep(block);
    }
    player.into_host()
}
