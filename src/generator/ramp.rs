use super::{GeneratorState, SignalGenerator};

/// Linear 0.0 → 1.0 ramp, then holds at 1.0
///
/// Used as a fade-in gain so newly admitted units don't click.
pub struct RampGenerator {
    /// Current sample position
    position: usize,
    /// Total duration in samples
    duration: usize,
}

impl RampGenerator {
    /// Create a ramp lasting `duration_samples` samples
    ///
    /// # Example
    /// ```
    /// use livehost::generator::RampGenerator;
    ///
    /// let fade = RampGenerator::new(64);
    /// assert_eq!(fade.duration(), 64);
    /// ```
    pub fn new(duration_samples: usize) -> Self {
        Self {
            position: 0,
            duration: duration_samples.max(1),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn duration(&self) -> usize {
        self.duration
    }

    /// Gain for the next sample, advancing the ramp
    #[inline]
    pub fn next_gain(&mut self) -> f32 {
        if self.position >= self.duration {
            return 1.0;
        }
        let gain = self.position as f32 / self.duration as f32;
        self.position += 1;
        gain
    }

    /// True once the ramp has reached full gain
    pub fn is_complete(&self) -> bool {
        self.position >= self.duration
    }
}

impl SignalGenerator for RampGenerator {
    fn process(&mut self, buffer: &mut [f32]) -> GeneratorState {
        for sample in buffer.iter_mut() {
            *sample = self.next_gain();
        }

        if self.is_complete() {
            GeneratorState::Complete
        } else {
            GeneratorState::Running
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_rises_then_holds() {
        let mut ramp = RampGenerator::new(4);
        let mut buffer = vec![0.0f32; 6];

        let state = ramp.process(&mut buffer);
        assert_eq!(state, GeneratorState::Complete);
        assert_eq!(buffer, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
    }

    #[test]
    fn test_ramp_across_frames() {
        let mut ramp = RampGenerator::new(8);
        let mut buffer = vec![0.0f32; 4];

        assert_eq!(ramp.process(&mut buffer), GeneratorState::Running);
        assert_eq!(ramp.position(), 4);
        assert_eq!(ramp.process(&mut buffer), GeneratorState::Complete);
        assert!(ramp.is_complete());
    }

    #[test]
    fn test_zero_duration_clamped() {
        let ramp = RampGenerator::new(0);
        assert_eq!(ramp.duration(), 1);
    }
}
