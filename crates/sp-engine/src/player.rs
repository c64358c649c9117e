//! Player: fans the clock out to up to four independent tracks.

use std::sync::Arc;

use heapless::Vec as HVec;
use ringbuf::traits::{Consumer, Producer};
use ringbuf::{HeapCons, HeapProd};
use sp_ir::{MetricTime, Snapshot, SongCell, MAX_TRACKS};
use tracing::{debug, warn};

use crate::config::PlayerConfig;
use crate::host::{CvInputMode, Host, Ports};
use crate::remote::{mailbox, Command, PlayerRemote, Readback};
use crate::track_player::TrackPlayer;

/// Top-level section player.
///
/// Lives on the real-time thread. The editor talks to it through the
/// [`PlayerRemote`] returned by [`Player::new`]. Song cells the player lets
/// go of are handed back to the remote, so freeing them is the editor's job.
pub struct Player<H: Host> {
    tracks: HVec<TrackPlayer, MAX_TRACKS>,
    song: Arc<SongCell>,
    /// Song waiting for its cell to be free so every track can switch at once
    pending_song: Option<Arc<SongCell>>,
    host: H,
    ports: Ports,
    commands: HeapCons<Command>,
    retired: HeapProd<Arc<SongCell>>,
    readback: Arc<Readback>,
    running: bool,
    contended: bool,
}

impl<H: Host> Player<H> {
    /// Build a player and its editor-side remote. Allocates; call before
    /// handing the player to the real-time thread.
    pub fn new(config: PlayerConfig, song: Arc<SongCell>, host: H) -> (Self, PlayerRemote) {
        let config = config.clamped();
        let mut tracks = HVec::new();
        for t in 0..config.num_tracks {
            let _ = tracks.push(TrackPlayer::new(t, &song, &config));
        }
        let readback = Arc::new(Readback::default());
        let (remote, commands, retired) = mailbox(config.command_capacity, Arc::clone(&readback));
        debug!(tracks = config.num_tracks, voices = config.voices_per_track, "player created");

        let player = Self {
            tracks,
            song,
            pending_song: None,
            host,
            ports: Ports::default(),
            commands,
            retired,
            readback,
            running: false,
            contended: false,
        };
        (player, remote)
    }

    // --- Clock ---

    /// Drain the mailbox, switch to a pending song if its cell is free, then
    /// service every track's queued work and CV input.
    pub fn step(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            self.apply(command);
        }

        let mut reset_clock = self.install_pending_song();
        for track in self.tracks.iter_mut() {
            reset_clock |= track.step(&mut self.host, &self.ports);
        }
        if reset_clock {
            self.host.reset_clock();
        }
        self.publish();
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::SetSong(song) => self.set_song(song),
            Command::SetNextSection { track, section } => self.set_next_section_request(track, section),
            Command::Reset { clear_gates, reset_sections } => self.reset(clear_gates, reset_sections),
            Command::SetRunning(running) => self.set_running_status(running),
        }
    }

    fn install_pending_song(&mut self) -> bool {
        let Some(cell) = self.pending_song.take() else {
            return false;
        };
        let (song, version) = match cell.try_snapshot(0) {
            Snapshot::Updated(song, version) => (song, version),
            // retry next quantum
            Snapshot::Contended | Snapshot::Unchanged => {
                self.pending_song = Some(cell);
                return false;
            }
        };
        for track in self.tracks.iter_mut() {
            track.install_song(&mut self.host, Arc::clone(&song), version);
        }
        let previous = core::mem::replace(&mut self.song, cell);
        self.retire(previous);
        true
    }

    fn retire(&mut self, cell: Arc<SongCell>) {
        if let Err(cell) = self.retired.try_push(cell) {
            warn!("retired song queue full, releasing song on the player thread");
            drop(cell);
        }
    }

    /// Advance every track to `metric_time`.
    pub fn update_to_metric_time(&mut self, metric_time: MetricTime, quantization_interval: f32, running: bool) {
        let mut contended = false;
        for track in self.tracks.iter_mut() {
            contended |= track.update_to_metric_time(
                &mut self.host,
                &self.song,
                metric_time,
                quantization_interval,
                running,
            );
        }
        if contended {
            if !self.contended {
                warn!("song locked by editor, silencing tracks");
            }
            self.host.on_lock_failed();
        }
        self.contended = contended;
        self.publish();
    }

    pub fn update_sample_count(&mut self, samples: u32) {
        for track in self.tracks.iter_mut() {
            track.update_sample_count(&mut self.host, samples);
        }
    }

    fn publish(&self) {
        for (t, track) in self.tracks.iter().enumerate() {
            self.readback.publish(
                t,
                track.get_section(),
                track.get_next_section_request(),
                track.get_current_repetition(),
            );
        }
    }

    // --- Control ---

    /// Switch every track to `song` at the next `step()` that finds its cell
    /// unlocked. A song still pending is superseded.
    pub fn set_song(&mut self, song: Arc<SongCell>) {
        if let Some(superseded) = self.pending_song.replace(song) {
            self.retire(superseded);
        }
    }

    /// The song the tracks are playing. A song passed to `set_song` shows up
    /// here once the tracks have switched to it.
    pub fn get_song(&self) -> &Arc<SongCell> {
        &self.song
    }

    /// Queue a reset on every track; applied at the next `step()`.
    pub fn reset(&mut self, clear_gates: bool, reset_section_index: bool) {
        for track in self.tracks.iter_mut() {
            track.request_reset(clear_gates, reset_section_index);
        }
    }

    pub fn set_running_status(&mut self, running: bool) {
        self.running = running;
        for track in self.tracks.iter_mut() {
            track.set_running(running);
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn set_num_voices(&mut self, track: usize, n: usize) {
        if let Some(t) = self.tracks.get_mut(track) {
            t.set_num_voices(n);
        }
    }

    pub fn set_sample_count_for_retrigger(&mut self, samples: u32) {
        for track in self.tracks.iter_mut() {
            track.set_sample_count_for_retrigger(samples);
        }
    }

    /// 1-based section playing on `track`, 0 if halted or out of range.
    pub fn get_section(&self, track: usize) -> usize {
        self.tracks.get(track).map_or(0, TrackPlayer::get_section)
    }

    pub fn set_next_section_request(&mut self, track: usize, section: usize) {
        let immediately = self.ports.trigger_high();
        if let Some(t) = self.tracks.get_mut(track) {
            t.set_next_section_request(section, immediately);
        }
    }

    pub fn get_next_section_request(&self, track: usize) -> usize {
        self.tracks.get(track).map_or(0, TrackPlayer::get_next_section_request)
    }

    pub fn get_current_repetition(&self, track: usize) -> u32 {
        self.tracks.get(track).map_or(0, TrackPlayer::get_current_repetition)
    }

    // --- Inputs ---

    pub fn set_ports(&mut self, ports: Ports) {
        self.ports = ports;
    }

    pub fn set_cv_input_mode(&mut self, mode: CvInputMode) {
        for track in self.tracks.iter_mut() {
            track.set_cv_input_mode(mode);
        }
    }

    // --- Access ---

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Option<&TrackPlayer> {
        self.tracks.get(index)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::AtomicPort;
    use crate::testing::{Call, TestHost};
    use sp_ir::{Clip, ClipOptions, NoteEvent, Song};

    const Q: f32 = 1.0 / 64.0;

    fn looping_clip(pitch: f32) -> Clip {
        let mut clip = Clip::new(1.0).unwrap();
        clip.insert_note(NoteEvent::new(0.0, 0.5, pitch)).unwrap();
        clip
    }

    /// Track t gets sections 1 and 2 with pitches t and t + 10.
    fn two_track_song() -> Arc<SongCell> {
        let mut song = Song::with_tracks("p", 2);
        for t in 0..2 {
            song.set_clip(t, 0, Some(looping_clip(t as f32))).unwrap();
            song.set_clip(t, 1, Some(looping_clip(t as f32 + 10.0))).unwrap();
        }
        Arc::new(SongCell::new(song))
    }

    fn started(config: PlayerConfig) -> (Player<TestHost>, PlayerRemote) {
        let (mut player, remote) = Player::new(config, two_track_song(), TestHost::default());
        player.set_running_status(true);
        player.step();
        (player, remote)
    }

    #[test]
    fn tracks_play_independently() {
        let (mut player, _remote) = started(PlayerConfig::default().with_tracks(2));
        player.update_to_metric_time(0.1, Q, true);
        assert!(player.host().gate(0, 0));
        assert!(player.host().gate(1, 0));
        assert_eq!(player.host().cv(0, 0), 0.0);
        assert_eq!(player.host().cv(1, 0), 1.0);
    }

    #[test]
    fn config_is_clamped() {
        let (player, _remote) = Player::new(
            PlayerConfig::default().with_tracks(9),
            two_track_song(),
            TestHost::default(),
        );
        assert_eq!(player.num_tracks(), MAX_TRACKS);
    }

    #[test]
    fn lock_failure_reported_once_per_update() {
        let (mut player, _remote) = started(PlayerConfig::default().with_tracks(2));
        player.update_to_metric_time(0.1, Q, true);
        let song = Arc::clone(player.get_song());
        {
            let _hold = song.hold();
            player.update_to_metric_time(0.2, Q, true);
        }
        assert_eq!(player.host().count(Call::LockFailed), 1);
        assert!(!player.host().any_gate_high(0));
        assert!(!player.host().any_gate_high(1));

        player.update_to_metric_time(0.3, Q, true);
        assert_eq!(player.host().count(Call::LockFailed), 1);
    }

    #[test]
    fn remote_commands_apply_on_step() {
        let (mut player, mut remote) = started(PlayerConfig::default().with_tracks(2));
        remote.set_next_section_request(1, 2).unwrap();
        assert_eq!(player.get_next_section_request(1), 0);

        player.step();
        assert_eq!(remote.pending(), 0);
        assert_eq!(player.get_next_section_request(1), 2);
        assert_eq!(remote.next_section_request(1), 2);

        player.update_to_metric_time(1.0, Q, true);
        assert_eq!(remote.section(1), 2);
        assert_eq!(remote.section(0), 1);
        assert_eq!(remote.repetition(0), 2);
    }

    #[test]
    fn stopped_remote_request_switches_on_step() {
        let (mut player, mut remote) = Player::new(
            PlayerConfig::default().with_tracks(2),
            two_track_song(),
            TestHost::default(),
        );
        player.step();
        remote.set_next_section_request(0, 2).unwrap();
        player.step();
        player.step();
        assert_eq!(player.get_section(0), 2);
        assert_eq!(remote.section(0), 2);
    }

    #[test]
    fn reset_with_sections_restarts_clock_once() {
        let (mut player, mut remote) = started(PlayerConfig::default().with_tracks(2));
        player.update_to_metric_time(1.5, Q, true);
        remote.reset(true, true).unwrap();
        player.step();
        assert_eq!(player.host().count(Call::ResetClock), 1);
        assert!(!player.host().any_gate_high(0));
        assert_eq!(player.get_current_repetition(0), 1);
    }

    #[test]
    fn reset_without_sections_keeps_clock() {
        let (mut player, mut remote) = started(PlayerConfig::default().with_tracks(2));
        player.update_to_metric_time(0.1, Q, true);
        remote.reset(true, false).unwrap();
        player.step();
        assert_eq!(player.host().count(Call::ResetClock), 0);
        assert!(!player.host().any_gate_high(1));
    }

    #[test]
    fn set_song_through_remote() {
        let (mut player, mut remote) = started(PlayerConfig::default().with_tracks(2));
        let mut song = Song::with_tracks("other", 2);
        let clip = looping_clip(5.0).with_options(ClipOptions::repeat(2));
        song.set_clip(0, 3, Some(clip)).unwrap();
        let cell = Arc::new(SongCell::new(song));

        remote.set_song(Arc::clone(&cell)).unwrap();
        player.step();
        assert!(Arc::ptr_eq(player.get_song(), &cell));
        assert_eq!(player.get_section(0), 4);
        assert_eq!(player.get_section(1), 0);
        assert_eq!(player.host().count(Call::ResetClock), 1);
    }

    #[test]
    fn new_song_waits_for_unlocked_cell() {
        let (mut player, _remote) = started(PlayerConfig::default().with_tracks(2));
        let first = Arc::clone(player.get_song());
        let other = Arc::new(SongCell::new(Song::with_tracks("other", 2)));
        player.set_song(Arc::clone(&other));
        {
            let _hold = other.hold();
            player.step();
            assert!(Arc::ptr_eq(player.get_song(), &first));
            assert_eq!(player.get_section(0), 1);
        }
        player.step();
        assert!(Arc::ptr_eq(player.get_song(), &other));
        assert_eq!(player.get_section(0), 0);
        assert_eq!(player.host().count(Call::ResetClock), 1);
    }

    #[test]
    fn replaced_song_is_returned_to_remote() {
        let (mut player, mut remote) = started(PlayerConfig::default().with_tracks(2));
        let first = Arc::clone(player.get_song());
        let superseded = Arc::new(SongCell::new(Song::with_tracks("superseded", 2)));
        let last = Arc::new(SongCell::new(Song::with_tracks("last", 2)));

        player.set_song(Arc::clone(&superseded));
        player.set_song(Arc::clone(&last));
        player.step();
        assert!(Arc::ptr_eq(player.get_song(), &last));
        assert_eq!(Arc::strong_count(&first), 2);
        assert_eq!(Arc::strong_count(&superseded), 2);

        assert_eq!(remote.release_retired(), 2);
        assert_eq!(Arc::strong_count(&first), 1);
        assert_eq!(Arc::strong_count(&superseded), 1);
    }

    #[test]
    fn cv_gate_moves_stopped_player() {
        let (mut player, _remote) = started(PlayerConfig::default().with_tracks(2));
        player.update_to_metric_time(0.25, Q, true);
        player.set_running_status(false);
        player.set_cv_input_mode(CvInputMode::Next);
        let gate = AtomicPort::new(2);
        player.set_ports(Ports { cv: Some(Box::new(gate.clone())), trigger: None });
        player.step();

        gate.set_voltage(1, 5.0);
        player.step();
        assert_eq!(player.get_section(0), 1);
        assert_eq!(player.get_section(1), 2);
        assert_eq!(player.get_next_section_request(1), 0);

        gate.set_voltage(1, 0.0);
        player.update_to_metric_time(0.5, Q, false);
        player.step();
        assert_eq!(player.get_section(1), 2);
    }

    #[test]
    fn running_flag_forwarded() {
        let (mut player, mut remote) = started(PlayerConfig::default());
        remote.set_running_status(false).unwrap();
        player.step();
        assert!(!player.running());
    }

    #[test]
    fn out_of_range_track_ignored() {
        let (mut player, _remote) = started(PlayerConfig::default().with_tracks(2));
        player.set_next_section_request(3, 1);
        player.set_num_voices(3, 1);
        assert_eq!(player.get_section(3), 0);
        assert_eq!(player.get_next_section_request(3), 0);
    }

    #[test]
    fn num_voices_limits_polyphony() {
        let mut song = Song::with_tracks("chord", 1);
        let mut clip = Clip::new(4.0).unwrap();
        for p in 0..3 {
            clip.insert_note(NoteEvent::new(0.0, 2.0, p as f32)).unwrap();
        }
        song.set_clip(0, 0, Some(clip)).unwrap();
        let (mut player, _remote) =
            Player::new(PlayerConfig::default().with_tracks(1), Arc::new(SongCell::new(song)), TestHost::default());
        player.set_num_voices(0, 2);
        player.set_running_status(true);
        player.step();
        player.update_to_metric_time(0.0, Q, true);
        // third note steals voice 0
        assert_eq!(player.host().cv(0, 0), 2.0);
        assert_eq!(player.host().cv(0, 1), 1.0);
        assert!(!player.host().gate(0, 2));
    }

    #[test]
    fn trigger_port_makes_requests_immediate() {
        let (mut player, _remote) = started(PlayerConfig::default().with_tracks(2));
        let trigger = AtomicPort::new(1);
        trigger.set_voltage(0, 1.0);
        player.set_ports(Ports { cv: None, trigger: Some(Box::new(trigger)) });
        player.update_to_metric_time(0.25, Q, true);

        player.set_next_section_request(0, 2);
        player.step();
        assert_eq!(player.get_section(0), 2);
        assert_eq!(player.get_section(1), 1);
    }
}
