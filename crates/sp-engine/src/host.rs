//! Seams to the outside world: output callbacks and CV input ports.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Maximum channels on a polyphonic port.
pub const MAX_PORT_CHANNELS: usize = 16;

/// Callbacks the player drives. Implemented by the host.
///
/// All calls happen on the real-time thread and must not block.
pub trait Host {
    /// Set the gate of `voice` on `track`.
    fn set_gate(&mut self, track: usize, voice: usize, gate: bool);
    /// Set the pitch CV of `voice` on `track`.
    fn set_cv(&mut self, track: usize, voice: usize, cv: f32);
    /// The song was locked by the editor during a tick.
    fn on_lock_failed(&mut self);
    /// Playback restarted from the top; the host should restart its clock.
    fn reset_clock(&mut self);
}

/// A (possibly polyphonic) voltage input.
pub trait Port {
    /// Number of connected channels. 0 means unpatched.
    fn channels(&self) -> usize;

    /// Voltage on `channel`.
    fn voltage(&self, channel: usize) -> f32;

    /// Voltage on `channel`, reading channel 0 when the port is mono.
    fn poly_voltage(&self, channel: usize) -> f32 {
        if self.channels() == 1 {
            self.voltage(0)
        } else {
            self.voltage(channel)
        }
    }
}

/// How the CV input drives section changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CvInputMode {
    /// Channel N carries the requested section for track N.
    #[default]
    Poly,
    /// Rising gate edge moves to the next section.
    Next,
    /// Rising gate edge moves to the previous section.
    Prev,
    /// Channel 0 voltage is the requested section for every track.
    Abs,
}

/// The two optional inputs the player polls.
#[derive(Default)]
pub struct Ports {
    /// Section-change CV/gate input
    pub cv: Option<Box<dyn Port + Send>>,
    /// "Apply immediately" parameter
    pub trigger: Option<Box<dyn Port + Send>>,
}

impl Ports {
    /// True while the immediate-trigger parameter is on.
    pub fn trigger_high(&self) -> bool {
        self.trigger.as_ref().is_some_and(|p| p.voltage(0) > 0.5)
    }
}

/// A port whose voltages can be written from another thread.
///
/// Clones share the same storage. Values are f32 bits in atomics, so reads
/// never block or allocate.
#[derive(Clone, Debug)]
pub struct AtomicPort {
    inner: Arc<AtomicPortInner>,
}

#[derive(Debug)]
struct AtomicPortInner {
    channels: AtomicUsize,
    values: [AtomicU32; MAX_PORT_CHANNELS],
}

impl AtomicPort {
    pub fn new(channels: usize) -> Self {
        Self {
            inner: Arc::new(AtomicPortInner {
                channels: AtomicUsize::new(channels.min(MAX_PORT_CHANNELS)),
                values: core::array::from_fn(|_| AtomicU32::new(0.0f32.to_bits())),
            }),
        }
    }

    pub fn set_voltage(&self, channel: usize, volts: f32) {
        if let Some(value) = self.inner.values.get(channel) {
            value.store(volts.to_bits(), Ordering::Relaxed);
        }
    }

    pub fn set_channels(&self, channels: usize) {
        self.inner
            .channels
            .store(channels.min(MAX_PORT_CHANNELS), Ordering::Relaxed);
    }
}

impl Port for AtomicPort {
    fn channels(&self) -> usize {
        self.inner.channels.load(Ordering::Relaxed)
    }

    fn voltage(&self, channel: usize) -> f32 {
        self.inner
            .values
            .get(channel)
            .map_or(0.0, |v| f32::from_bits(v.load(Ordering::Relaxed)))
    }
}
