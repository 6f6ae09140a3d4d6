use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Acknowledgment policy applied by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Anything that is not a clean, in-sequence acknowledgment is ignored;
    /// recovery relies on the retransmission timeout.
    #[default]
    Ack,
    /// A corrupted or out-of-sequence acknowledgment doubles as a NAK and
    /// triggers an immediate retransmission.
    AckNak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub ack_mode: AckMode,
    /// Frame header length in bits. Acknowledgment frames are header-only.
    pub header_bits: u64,
    /// Packet payload length in bits.
    pub packet_bits: u64,
    /// Retransmission timeout in milliseconds, counted from the end of the
    /// data frame transmission.
    pub timeout_ms: f64,
    /// Channel bitrate in bits per second.
    pub capacity_bps: u64,
    /// One-way propagation delay in milliseconds.
    pub propagation_delay_ms: f64,
    /// Independent per-bit corruption probability, in [0, 1].
    pub bit_error_rate: f64,
    /// Seed for the channel noise stream.
    pub seed: u64,
    /// Abort a run after this many consecutive rounds without a delivered
    /// packet. `None` lets a hopeless run spin forever.
    #[serde(default)]
    pub round_limit: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ack_mode: AckMode::Ack,
            header_bits: 64,
            packet_bits: 1024,
            timeout_ms: 100.0,
            capacity_bps: 1_000_000,
            propagation_delay_ms: 5.0,
            bit_error_rate: 0.0,
            seed: 0,
            round_limit: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("channel capacity must be positive")]
    ZeroCapacity,
    #[error("bit error rate {0} is outside [0, 1]")]
    BitErrorRateOutOfRange(f64),
    #[error("header length must be positive")]
    ZeroHeader,
    #[error("packet length must be positive")]
    ZeroPacket,
    #[error("timeout {0} ms must be finite and non-negative")]
    InvalidTimeout(f64),
    #[error("propagation delay {0} ms must be finite and non-negative")]
    InvalidPropagationDelay(f64),
}

impl SimConfig {
    /// Total length of a data frame on the wire.
    pub fn data_frame_bits(&self) -> u64 {
        self.header_bits + self.packet_bits
    }

    /// Every timing formula divides by the capacity, so a config is checked
    /// once before a simulator is built around it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_bps == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if !(0.0..=1.0).contains(&self.bit_error_rate) {
            return Err(ConfigError::BitErrorRateOutOfRange(self.bit_error_rate));
        }
        if self.header_bits == 0 {
            return Err(ConfigError::ZeroHeader);
        }
        if self.packet_bits == 0 {
            return Err(ConfigError::ZeroPacket);
        }
        if !self.timeout_ms.is_finite() || self.timeout_ms < 0.0 {
            return Err(ConfigError::InvalidTimeout(self.timeout_ms));
        }
        if !self.propagation_delay_ms.is_finite() || self.propagation_delay_ms < 0.0 {
            return Err(ConfigError::InvalidPropagationDelay(self.propagation_delay_ms));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = SimConfig {
            capacity_bps: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn rejects_bit_error_rate_outside_unit_interval() {
        for ber in [-0.1, 1.5, f64::NAN] {
            let config = SimConfig {
                bit_error_rate: ber,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::BitErrorRateOutOfRange(_))
            ));
        }
    }

    #[test]
    fn rejects_empty_frames() {
        let config = SimConfig {
            header_bits: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroHeader)));

        let config = SimConfig {
            packet_bits: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPacket)));
    }

    #[test]
    fn rejects_bad_delays() {
        let config = SimConfig {
            timeout_ms: f64::INFINITY,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(_))));

        let config = SimConfig {
            propagation_delay_ms: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPropagationDelay(_))
        ));
    }

    #[test]
    fn boundary_bit_error_rates_are_accepted() {
        for ber in [0.0, 1.0] {
            let config = SimConfig {
                bit_error_rate: ber,
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }
    }
}
