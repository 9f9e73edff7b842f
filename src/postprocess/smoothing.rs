use crate::error::{OverlayError, Result};

/// Per-pixel exponential moving average over filtered masks
///
/// `state = alpha * current + (1 - alpha) * state`. A higher alpha follows the newest
/// frame more closely, a lower alpha suppresses more flicker.
pub struct TemporalSmoother {
    alpha: f32,
    state: Vec<f32>,
}

impl TemporalSmoother {
    /// Create a smoother with an all-zero state of `len` cells
    pub fn new(len: usize, alpha: f32) -> Self {
        Self {
            alpha,
            state: vec![0.0; len],
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Current smoothed mask
    pub fn state(&self) -> &[f32] {
        &self.state
    }

    /// Blend a new frame into the state
    pub fn update(&mut self, current: &[f32]) -> Result<()> {
        if current.len() != self.state.len() {
            return Err(OverlayError::DimensionMismatch {
                expected: self.state.len(),
                actual: current.len(),
            });
        }

        // Same recurrence written as a step towards `current`; stays inside [0, 1] under
        // f32 rounding when both operands do.
        let a = self.alpha;
        for (s, &c) in self.state.iter_mut().zip(current.iter()) {
            *s += a * (c - *s);
        }
        Ok(())
    }

    /// Clear the state back to all zero
    pub fn reset(&mut self) {
        tracing::debug!("Resetting smoothed mask");
        self.state.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        let smoother = TemporalSmoother::new(4, 0.6);
        assert_eq!(smoother.state(), &[0.0; 4]);
    }

    #[test]
    fn test_single_update_weights_new_frame() {
        let mut smoother = TemporalSmoother::new(2, 0.6);
        smoother.update(&[1.0, 0.5]).unwrap();
        assert!((smoother.state()[0] - 0.6).abs() < 1e-6);
        assert!((smoother.state()[1] - 0.3).abs() < 1e-6);

        smoother.update(&[0.0, 0.5]).unwrap();
        assert!((smoother.state()[0] - 0.24).abs() < 1e-6);
        assert!((smoother.state()[1] - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_converges_to_constant_input() {
        let mut smoother = TemporalSmoother::new(3, 0.6);
        let ones = [1.0; 3];
        for _ in 0..6 {
            smoother.update(&ones).unwrap();
        }
        // 1 - 0.4^6 = 0.995904
        assert!(smoother.state().iter().all(|&v| v > 0.99 && v <= 1.0));
    }

    #[test]
    fn test_decays_on_empty_frames() {
        let mut smoother = TemporalSmoother::new(1, 0.6);
        smoother.update(&[1.0]).unwrap();
        let mut expected = 0.6f32;
        for _ in 0..5 {
            smoother.update(&[0.0]).unwrap();
            expected *= 0.4;
            assert!((smoother.state()[0] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stays_within_unit_interval() {
        for &alpha in &[0.05f32, 0.3, 0.6, 0.99, 1.0] {
            let mut smoother = TemporalSmoother::new(8, alpha);
            for frame in 0..50u32 {
                let input: Vec<f32> = (0..8u32)
                    .map(|i| if (frame * 7 + i * 3) % 5 < 2 { 1.0 } else { (i as f32) / 8.0 })
                    .collect();
                smoother.update(&input).unwrap();
                assert!(smoother.state().iter().all(|&v| (0.0..=1.0).contains(&v)));
            }
        }
    }

    #[test]
    fn test_alpha_one_tracks_input_exactly() {
        let mut smoother = TemporalSmoother::new(2, 1.0);
        smoother.update(&[0.25, 0.75]).unwrap();
        assert_eq!(smoother.state(), &[0.25, 0.75]);
    }

    #[test]
    fn test_reset_and_length_check() {
        let mut smoother = TemporalSmoother::new(2, 0.6);
        smoother.update(&[1.0, 1.0]).unwrap();
        smoother.reset();
        assert_eq!(smoother.state(), &[0.0, 0.0]);
        assert!(smoother.update(&[1.0]).is_err());
    }
}
