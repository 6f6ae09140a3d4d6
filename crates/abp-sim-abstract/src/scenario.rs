use crate::config::{AckMode, SimConfig};
use serde::Deserialize;

/// A named experiment loaded from a TOML file: config overrides, optional
/// deterministic faults, and assertions over the finished run.
#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    /// Number of packets that must be delivered for the run to finish.
    pub target_packets: u32,
    #[serde(default)]
    pub faults: Vec<LinkFault>,
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub ack_mode: Option<AckMode>,
    pub header_bits: Option<u64>,
    pub packet_bits: Option<u64>,
    pub timeout_ms: Option<f64>,
    pub capacity_bps: Option<u64>,
    pub propagation_delay_ms: Option<f64>,
    pub bit_error_rate: Option<f64>,
    pub seed: Option<u64>,
    pub round_limit: Option<u64>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.ack_mode {
            config.ack_mode = v;
        }
        if let Some(v) = self.header_bits {
            config.header_bits = v;
        }
        if let Some(v) = self.packet_bits {
            config.packet_bits = v;
        }
        if let Some(v) = self.timeout_ms {
            config.timeout_ms = v;
        }
        if let Some(v) = self.capacity_bps {
            config.capacity_bps = v;
        }
        if let Some(v) = self.propagation_delay_ms {
            config.propagation_delay_ms = v;
        }
        if let Some(v) = self.bit_error_rate {
            config.bit_error_rate = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.round_limit {
            config.round_limit = Some(v);
        }
    }
}

/// A deterministic link intervention, applied in place of the random error
/// model for the first frame it matches. Faults never consume channel
/// randomness, so a faulted run and a fault-free run with the same seed see
/// identical draw streams.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkFault {
    /// Swallow the next data frame, as if the error code had given up on it.
    LoseNextData,
    /// Swallow the acknowledgment of the next data frame that produces one.
    LoseNextAck,
    /// Deliver the acknowledgment of the next data frame that produces one,
    /// but flagged as corrupted.
    CorruptNextAck,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// The run delivered exactly this many packets.
    DeliveredPackets { count: u32 },
    /// Useful throughput is at least this many bits per second.
    ThroughputAtLeast { bps: f64 },
    /// Useful throughput is at most this many bits per second.
    ThroughputAtMost { bps: f64 },
    /// Simulated completion time stays under this bound.
    MaxElapsedMs { ms: f64 },
    /// Total data frame transmissions fall in this range.
    DataFramesSent { min: u64, max: Option<u64> },
    /// The run must hit its round ceiling instead of finishing.
    Stalled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_only_touches_present_fields() {
        let mut config = SimConfig::default();
        let expected_capacity = config.capacity_bps;

        let over = SimConfigOverride {
            bit_error_rate: Some(0.25),
            seed: Some(7),
            ..Default::default()
        };
        over.apply_to(&mut config);

        assert_eq!(config.bit_error_rate, 0.25);
        assert_eq!(config.seed, 7);
        assert_eq!(config.capacity_bps, expected_capacity);
        assert_eq!(config.round_limit, None);
    }

    #[test]
    fn scenario_parses_from_toml() {
        let text = r#"
            name = "lossy-ack"
            description = "one corrupted acknowledgment, then a clean link"
            target_packets = 3

            [config]
            ack_mode = "ack_nak"
            bit_error_rate = 0.0
            seed = 11

            [[faults]]
            type = "corrupt_next_ack"

            [[assertions]]
            type = "delivered_packets"
            count = 3

            [[assertions]]
            type = "max_elapsed_ms"
            ms = 500.0
        "#;

        let scenario: TestScenario = toml::from_str(text).unwrap();
        assert_eq!(scenario.name, "lossy-ack");
        assert_eq!(scenario.target_packets, 3);
        assert_eq!(scenario.config.ack_mode, Some(AckMode::AckNak));
        assert_eq!(scenario.faults, vec![LinkFault::CorruptNextAck]);
        assert_eq!(scenario.assertions.len(), 2);
    }
}
