//! Signal building blocks for the reference engine

pub mod osc;
pub mod ramp;

pub use osc::{Oscillator, Waveform};
pub use ramp::RampGenerator;

/// Represents the current state of a signal generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Generator is still producing samples
    Running,
    /// Generator has completed and will produce no more samples
    Complete,
}

/// Core trait for all signal generators
///
/// Generators produce mono samples frame by frame. The caller decides how
/// to spread them across output channels.
pub trait SignalGenerator {
    /// Fill `buffer` with the next samples
    ///
    /// Even when `Complete` is returned the buffer holds valid samples
    /// (typically the final held value) for the current frame.
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState;
}
