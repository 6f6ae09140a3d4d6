use abp_sim_abstract::SimConfig;
use serde::Serialize;

/// A compact textual summary of one link-layer event, for offline inspection
/// of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEvent {
    pub time_ms: f64,
    pub description: String,
}

/// Per-run frame accounting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelStats {
    /// Data frame transmissions, retransmissions included.
    pub data_frames_sent: u64,
    pub data_frames_lost: u64,
    pub data_frames_corrupted: u64,
    /// Clean data frames the receiver ignored as out of sequence.
    pub duplicate_frames: u64,
    pub acks_lost: u64,
    pub acks_corrupted: u64,
    pub acks_accepted: u64,
    /// Acknowledgments dropped by the plain-ACK drain loop.
    pub acks_discarded: u64,
    /// Rounds cut short by a NAK-interpreted acknowledgment.
    pub nak_retransmits: u64,
    /// Rounds resolved by reaching the retransmission deadline.
    pub timeouts: u64,
}

impl ChannelStats {
    /// Fraction of data frame transmissions that never produced a delivery,
    /// loss and corruption combined.
    pub fn data_frame_error_rate(&self) -> f64 {
        if self.data_frames_sent == 0 {
            return 0.0;
        }
        (self.data_frames_lost + self.data_frames_corrupted) as f64
            / self.data_frames_sent as f64
    }
}

/// Snapshot handed to the reporting layer when a run completes.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub elapsed_ms: f64,
    pub delivered_packets: u32,
    pub throughput_bps: f64,
    pub stats: ChannelStats,
    /// Empty unless event recording was enabled before the run.
    pub link_events: Vec<LinkEvent>,
}
