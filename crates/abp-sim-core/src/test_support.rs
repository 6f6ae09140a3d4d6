use rand::RngCore;
use std::collections::VecDeque;

/// Replays a fixed sequence of uniform draws, then repeats a fill value
/// forever. Lets tests place individual bit errors without seed hunting.
///
/// `StandardUniform` builds an `f64` from the top 53 bits of `next_u64`, so
/// each target draw is encoded into exactly those bits. Stick to dyadic
/// values (0.0, 0.25, 0.75, ...) so the encoding is exact.
pub struct ScriptedRng {
    draws: VecDeque<f64>,
    fill: f64,
}

impl ScriptedRng {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        // 0.75 reads as "no error" for any bit error rate up to 0.75.
        Self::with_fill(draws, 0.75)
    }

    pub fn with_fill(draws: impl IntoIterator<Item = f64>, fill: f64) -> Self {
        Self {
            draws: draws.into_iter().collect(),
            fill,
        }
    }

    /// Scripted draws not yet consumed.
    pub fn remaining(&self) -> usize {
        self.draws.len()
    }
}

impl RngCore for ScriptedRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let value = self.draws.pop_front().unwrap_or(self.fill);
        ((value * (1u64 << 53) as f64) as u64) << 11
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}
