//! Host double for unit tests.

use crate::host::Host;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Call {
    Gate { track: usize, voice: usize, gate: bool },
    Cv { track: usize, voice: usize, cv: f32 },
    LockFailed,
    ResetClock,
}

#[derive(Default)]
pub struct TestHost {
    pub calls: Vec<Call>,
    gates: [[bool; 16]; 4],
    cvs: [[f32; 16]; 4],
}

impl TestHost {
    pub fn gate(&self, track: usize, voice: usize) -> bool {
        self.gates[track][voice]
    }

    pub fn cv(&self, track: usize, voice: usize) -> f32 {
        self.cvs[track][voice]
    }

    /// Number of gate calls that changed the gate.
    pub fn gate_changes(&self) -> usize {
        let mut state = [[false; 16]; 4];
        let mut changes = 0;
        for call in &self.calls {
            if let Call::Gate { track, voice, gate } = *call {
                if state[track][voice] != gate {
                    changes += 1;
                    state[track][voice] = gate;
                }
            }
        }
        changes
    }

    pub fn count(&self, wanted: Call) -> usize {
        self.calls.iter().filter(|c| **c == wanted).count()
    }

    pub fn any_gate_high(&self, track: usize) -> bool {
        self.gates[track].iter().any(|g| *g)
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl Host for TestHost {
    fn set_gate(&mut self, track: usize, voice: usize, gate: bool) {
        self.gates[track][voice] = gate;
        self.calls.push(Call::Gate { track, voice, gate });
    }

    fn set_cv(&mut self, track: usize, voice: usize, cv: f32) {
        self.cvs[track][voice] = cv;
        self.calls.push(Call::Cv { track, voice, cv });
    }

    fn on_lock_failed(&mut self) {
        self.calls.push(Call::LockFailed);
    }

    fn reset_clock(&mut self) {
        self.calls.push(Call::ResetClock);
    }
}
