//! Rising-edge detection on gate voltages.

/// Voltage at or above which a gate reads high.
pub const GATE_HIGH_VOLTS: f32 = 1.0;

/// Voltage at or below which a high gate reads low again.
pub const GATE_LOW_VOLTS: f32 = 0.25;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum GateState {
    #[default]
    Low,
    High,
}

/// Schmitt trigger that reports low→high transitions.
#[derive(Clone, Copy, Debug, Default)]
pub struct GateTrigger {
    state: GateState,
}

impl GateTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one reading. Returns true on a rising edge.
    pub fn process(&mut self, volts: f32) -> bool {
        match self.state {
            GateState::Low if volts >= GATE_HIGH_VOLTS => {
                self.state = GateState::High;
                true
            }
            GateState::High if volts <= GATE_LOW_VOLTS => {
                self.state = GateState::Low;
                false
            }
            _ => false,
        }
    }

    pub fn is_high(&self) -> bool {
        self.state == GateState::High
    }

    pub fn reset(&mut self) {
        self.state = GateState::Low;
    }
}
