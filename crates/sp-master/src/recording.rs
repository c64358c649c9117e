//! A host that remembers what the player told it.

use std::fmt;

use sp_engine::{Host, MAX_VOICES};
use sp_ir::{MetricTime, MAX_TRACKS};

/// One output change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Change {
    Gate(bool),
    Cv(f32),
}

/// An output change stamped with the metric time of the block it happened in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub time: MetricTime,
    pub track: usize,
    pub voice: usize,
    pub change: Change,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:9.3}  track {} voice {:2}  ", self.time, self.track + 1, self.voice)?;
        match self.change {
            Change::Gate(true) => write!(f, "gate on"),
            Change::Gate(false) => write!(f, "gate off"),
            Change::Cv(cv) => write!(f, "cv {cv:.3}"),
        }
    }
}

/// [`Host`] that tracks output state and keeps a transition log.
///
/// A bounded host reserves its log up front and stops logging when full, so
/// it can run on the real-time thread without allocating.
#[derive(Debug, Clone)]
pub struct RecordingHost {
    time: MetricTime,
    gates: [[bool; MAX_VOICES]; MAX_TRACKS],
    cvs: [[f32; MAX_VOICES]; MAX_TRACKS],
    gate_changes: usize,
    lock_failures: usize,
    clock_resets: usize,
    clock_reset_pending: bool,
    log: Vec<Transition>,
    log_limit: Option<usize>,
}

impl RecordingHost {
    /// Unbounded log, for offline rendering.
    pub fn new() -> Self {
        Self::with_log(Vec::new(), None)
    }

    /// Log at most `limit` transitions.
    pub fn bounded(limit: usize) -> Self {
        Self::with_log(Vec::with_capacity(limit), Some(limit))
    }

    fn with_log(log: Vec<Transition>, log_limit: Option<usize>) -> Self {
        Self {
            time: 0.0,
            gates: [[false; MAX_VOICES]; MAX_TRACKS],
            cvs: [[0.0; MAX_VOICES]; MAX_TRACKS],
            gate_changes: 0,
            lock_failures: 0,
            clock_resets: 0,
            clock_reset_pending: false,
            log,
            log_limit,
        }
    }

    /// Metric time stamped on subsequent transitions.
    pub fn set_time(&mut self, time: MetricTime) {
        self.time = time;
    }

    pub fn gate(&self, track: usize, voice: usize) -> bool {
        self.gates
            .get(track)
            .and_then(|t| t.get(voice))
            .copied()
            .unwrap_or(false)
    }

    pub fn cv(&self, track: usize, voice: usize) -> f32 {
        self.cvs
            .get(track)
            .and_then(|t| t.get(voice))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn any_gate_high(&self, track: usize) -> bool {
        self.gates.get(track).is_some_and(|t| t.iter().any(|g| *g))
    }

    /// Gate calls that actually flipped a gate.
    pub fn gate_changes(&self) -> usize {
        self.gate_changes
    }

    pub fn lock_failures(&self) -> usize {
        self.lock_failures
    }

    pub fn clock_resets(&self) -> usize {
        self.clock_resets
    }

    /// True once per `reset_clock` call.
    pub fn take_clock_reset(&mut self) -> bool {
        std::mem::take(&mut self.clock_reset_pending)
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.log
    }

    pub fn take_transitions(&mut self) -> Vec<Transition> {
        std::mem::take(&mut self.log)
    }

    fn record(&mut self, track: usize, voice: usize, change: Change) {
        if self.log_limit.is_some_and(|limit| self.log.len() >= limit) {
            return;
        }
        self.log.push(Transition { time: self.time, track, voice, change });
    }
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for RecordingHost {
    fn set_gate(&mut self, track: usize, voice: usize, gate: bool) {
        let Some(slot) = self.gates.get_mut(track).and_then(|t| t.get_mut(voice)) else {
            return;
        };
        if *slot != gate {
            *slot = gate;
            self.gate_changes += 1;
            self.record(track, voice, Change::Gate(gate));
        }
    }

    fn set_cv(&mut self, track: usize, voice: usize, cv: f32) {
        let Some(slot) = self.cvs.get_mut(track).and_then(|t| t.get_mut(voice)) else {
            return;
        };
        *slot = cv;
        self.record(track, voice, Change::Cv(cv));
    }

    fn on_lock_failed(&mut self) {
        self.lock_failures += 1;
    }

    fn reset_clock(&mut self) {
        self.clock_resets += 1;
        self.clock_reset_pending = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_real_gate_changes() {
        let mut host = RecordingHost::new();
        host.set_gate(0, 0, false);
        host.set_gate(0, 0, true);
        host.set_gate(0, 0, true);
        host.set_gate(0, 0, false);
        assert_eq!(host.gate_changes(), 2);
        assert_eq!(host.transitions().len(), 2);
    }

    #[test]
    fn stamps_transitions_with_time() {
        let mut host = RecordingHost::new();
        host.set_time(1.5);
        host.set_cv(2, 3, 0.25);
        assert_eq!(
            host.transitions(),
            &[Transition { time: 1.5, track: 2, voice: 3, change: Change::Cv(0.25) }]
        );
        assert_eq!(host.cv(2, 3), 0.25);
    }

    #[test]
    fn bounded_log_stops_when_full() {
        let mut host = RecordingHost::bounded(1);
        host.set_gate(0, 0, true);
        host.set_gate(0, 0, false);
        assert_eq!(host.transitions().len(), 1);
        assert_eq!(host.gate_changes(), 2);
    }

    #[test]
    fn out_of_range_outputs_ignored() {
        let mut host = RecordingHost::new();
        host.set_gate(9, 0, true);
        host.set_cv(0, 99, 1.0);
        assert!(host.transitions().is_empty());
        assert!(!host.gate(9, 0));
    }

    #[test]
    fn clock_reset_is_taken_once() {
        let mut host = RecordingHost::new();
        host.reset_clock();
        assert!(host.take_clock_reset());
        assert!(!host.take_clock_reset());
        assert_eq!(host.clock_resets(), 1);
    }

    #[test]
    fn display_is_readable() {
        let t = Transition { time: 0.5, track: 0, voice: 1, change: Change::Gate(true) };
        assert_eq!(t.to_string(), "    0.500  track 1 voice  1  gate on");
    }
}
