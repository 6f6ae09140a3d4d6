use rand::Rng;

/// Error bits a frame can absorb before the error-correcting code gives up
/// and the whole frame counts as lost.
pub const LOSS_THRESHOLD_BITS: u32 = 5;

/// What the channel did to a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Every bit arrived intact.
    Clean,
    /// One to four bits flipped: delivered, but flagged by the receiver's
    /// error detection.
    Corrupted(u32),
    /// Five or more bits flipped, which defeats the error code entirely.
    Lost,
}

impl FrameOutcome {
    pub fn is_lost(&self) -> bool {
        matches!(self, FrameOutcome::Lost)
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, FrameOutcome::Corrupted(_))
    }
}

/// Per-bit independent error injection for one direction of the link.
///
/// Generic over the draw source so tests can script individual bit errors;
/// production runs hold a seeded `StdRng`.
#[derive(Debug)]
pub struct Channel<R> {
    bit_error_rate: f64,
    rng: R,
}

impl<R: Rng> Channel<R> {
    pub fn new(bit_error_rate: f64, rng: R) -> Self {
        Self {
            bit_error_rate,
            rng,
        }
    }

    /// Push one frame through the channel, sampling an independent uniform
    /// draw per bit. Sampling stops as soon as the frame is beyond saving.
    pub fn transmit(&mut self, frame_bits: u64) -> FrameOutcome {
        let mut error_bits = 0u32;
        for _ in 0..frame_bits {
            if self.rng.random::<f64>() < self.bit_error_rate {
                error_bits += 1;
                if error_bits == LOSS_THRESHOLD_BITS {
                    return FrameOutcome::Lost;
                }
            }
        }
        match error_bits {
            0 => FrameOutcome::Clean,
            n => FrameOutcome::Corrupted(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedRng;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn zero_ber_is_always_clean() {
        let mut channel = Channel::new(0.0, StdRng::seed_from_u64(1));
        for _ in 0..10 {
            assert_eq!(channel.transmit(1000), FrameOutcome::Clean);
        }
    }

    #[test]
    fn certain_errors_lose_any_frame_of_five_bits() {
        let mut channel = Channel::new(1.0, StdRng::seed_from_u64(1));
        assert_eq!(channel.transmit(5), FrameOutcome::Lost);
        assert_eq!(channel.transmit(1000), FrameOutcome::Lost);
    }

    #[test]
    fn short_frames_survive_certain_errors_as_corrupted() {
        // Four bits can all flip without reaching the loss threshold.
        let mut channel = Channel::new(1.0, StdRng::seed_from_u64(1));
        assert_eq!(channel.transmit(4), FrameOutcome::Corrupted(4));
    }

    #[test]
    fn scripted_draws_count_error_bits() {
        // Draws below the rate flip a bit; 0.75 stays clean at rate 0.5.
        let mut rng = ScriptedRng::new([0.0, 0.75, 0.75, 0.0, 0.75, 0.75, 0.75, 0.75]);
        let mut channel = Channel::new(0.5, &mut rng);
        assert_eq!(channel.transmit(8), FrameOutcome::Corrupted(2));
    }

    #[test]
    fn loss_stops_sampling_early() {
        let mut rng = ScriptedRng::new([0.0; 10]);
        {
            let mut channel = Channel::new(0.5, &mut rng);
            assert_eq!(channel.transmit(10), FrameOutcome::Lost);
        }
        // Only the five draws needed to reach the threshold were consumed.
        assert_eq!(rng.remaining(), 5);
    }
}
