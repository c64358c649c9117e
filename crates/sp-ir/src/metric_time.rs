//! Quarter-note based time.
//!
//! Metric time is a plain `f64` counting quarter notes from the start of the
//! transport: 1.0 is one quarter note. Event times inside a clip are relative
//! to the start of the clip's current loop iteration.

/// A position in metric time (quarter notes).
pub type MetricTime = f64;

/// Round `time` down to a multiple of `interval`.
///
/// `interval` must be non-zero; a zero interval returns `time` unchanged so a
/// misconfigured host degrades to unquantized playback.
pub fn quantize_down(time: MetricTime, interval: f32) -> MetricTime {
    if interval == 0.0 {
        return time;
    }
    let interval = interval as f64;
    libm::floor(time / interval) * interval
}

/// Convert a sample count to metric time at a given tempo.
pub fn samples_to_metric(samples: u64, sample_rate: u32, bpm: f64) -> MetricTime {
    if sample_rate == 0 {
        return 0.0;
    }
    let seconds = samples as f64 / sample_rate as f64;
    seconds * bpm / 60.0
}
