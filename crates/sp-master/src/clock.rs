//! Simulated audio clock: sample count + tempo → metric time.

use std::time::Duration;

use sp_ir::{samples_to_metric, MetricTime};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClockError {
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,
    #[error("tempo {0} bpm must be positive")]
    Tempo(f64),
    #[error("block size must be non-zero")]
    ZeroBlockSize,
    #[error("quantization interval {0} must be positive")]
    Quantization(f32),
}

/// Clock parameters for driving a player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockConfig {
    pub sample_rate: u32,
    pub bpm: f64,
    /// Samples per processing quantum
    pub block_size: usize,
    /// Quantization interval in quarter notes
    pub quantization: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bpm: 120.0,
            block_size: 64,
            quantization: 1.0 / 16.0,
        }
    }
}

impl ClockConfig {
    pub fn with_bpm(mut self, bpm: f64) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_quantization(mut self, quantization: f32) -> Self {
        self.quantization = quantization;
        self
    }

    pub fn validate(&self) -> Result<(), ClockError> {
        if self.sample_rate == 0 {
            return Err(ClockError::ZeroSampleRate);
        }
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(ClockError::Tempo(self.bpm));
        }
        if self.block_size == 0 {
            return Err(ClockError::ZeroBlockSize);
        }
        if !(self.quantization.is_finite() && self.quantization > 0.0) {
            return Err(ClockError::Quantization(self.quantization));
        }
        Ok(())
    }

    /// Samples needed to cover `beats` quarter notes, rounded up.
    pub fn samples_for_beats(&self, beats: f64) -> u64 {
        let seconds = beats * 60.0 / self.bpm;
        (seconds * self.sample_rate as f64).ceil() as u64
    }

    /// Wall-clock length of one block.
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate as f64)
    }
}

/// Counts rendered samples and converts them to metric time.
#[derive(Clone, Debug)]
pub struct SimClock {
    config: ClockConfig,
    samples: u64,
}

impl SimClock {
    pub fn new(config: ClockConfig) -> Self {
        Self { config, samples: 0 }
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn metric_time(&self) -> MetricTime {
        samples_to_metric(self.samples, self.config.sample_rate, self.config.bpm)
    }

    /// Move forward one block.
    pub fn advance(&mut self) {
        self.samples += self.config.block_size as u64;
    }

    pub fn reset(&mut self) {
        self.samples = 0;
    }
}
