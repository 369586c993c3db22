//! Basic oscillators

use std::f32::consts::TAU;
use std::str::FromStr;

use super::{GeneratorState, SignalGenerator};

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Noise,
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(Waveform::Sine),
            "saw" => Ok(Waveform::Saw),
            "square" => Ok(Waveform::Square),
            "noise" => Ok(Waveform::Noise),
            _ => Err(format!("unknown waveform '{}'", s)),
        }
    }
}

/// Free-running oscillator with a fixed frequency and gain
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    /// Phase in cycles, [0, 1)
    phase: f32,
    /// Cycles per sample
    increment: f32,
    gain: f32,
    rng_state: u64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32, gain: f32, sample_rate: u32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            increment: frequency / sample_rate.max(1) as f32,
            gain,
            rng_state: 0x853c_49e6_748f_ea9b,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        let value = match self.waveform {
            Waveform::Sine => (self.phase * TAU).sin(),
            Waveform::Saw => 2.0 * self.phase - 1.0,
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Noise => {
                self.rng_state = self
                    .rng_state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((self.rng_state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
            }
        };

        self.phase = (self.phase + self.increment).fract();
        value * self.gain
    }
}

impl SignalGenerator for Oscillator {
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
        GeneratorState::Running
    }
}
