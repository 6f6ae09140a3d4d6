use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info};

use abp_sim_abstract::{AckMode, ConfigError, LinkFault, SimConfig};

use crate::channel::{Channel, FrameOutcome};
use crate::timing;
use crate::trace::{ChannelStats, LinkEvent, SimulationReport};

/// A scheduled, possibly corrupted acknowledgment on its way back to the
/// sender.
#[derive(Debug, Clone, Copy)]
struct AckEvent {
    /// The receiver's next expected frame at the moment the ACK left.
    rn: u8,
    /// The acknowledgment itself took bit errors in flight.
    corrupted: bool,
    arrival_ms: f64,
}

#[derive(Debug)]
struct SenderState {
    sn: u8,
    next_expected_ack: u8,
    now_ms: f64,
}

#[derive(Debug)]
struct ReceiverState {
    next_expected_frame: u8,
}

/// Why a run ended without delivering its target.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no packet delivered in {rounds} consecutive rounds ({delivered} delivered before stalling)")]
    Stalled { rounds: u64, delivered: u32 },
}

/// Stop-and-wait sender, receiver, and the lossy channel between them, all
/// driven by one discrete-event loop.
///
/// Generic over the channel's draw source; production uses a `StdRng` seeded
/// from the config so runs are reproducible.
pub struct Simulator<R = StdRng> {
    config: SimConfig,
    channel: Channel<R>,
    sender: SenderState,
    receiver: ReceiverState,
    pending_acks: VecDeque<AckEvent>,
    faults: VecDeque<LinkFault>,
    delivered: u32,
    stats: ChannelStats,
    /// `Some` while event recording is enabled.
    link_events: Option<Vec<LinkEvent>>,
}

impl Simulator<StdRng> {
    /// Build a simulator whose channel noise is derived from `config.seed`.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let rng = StdRng::seed_from_u64(config.seed);
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> Simulator<R> {
    /// Build a simulator around an explicit draw source.
    pub fn with_rng(config: SimConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let channel = Channel::new(config.bit_error_rate, rng);
        Ok(Self {
            config,
            channel,
            sender: SenderState {
                sn: 0,
                next_expected_ack: 1,
                now_ms: 0.0,
            },
            receiver: ReceiverState {
                next_expected_frame: 0,
            },
            pending_acks: VecDeque::new(),
            faults: VecDeque::new(),
            delivered: 0,
            stats: ChannelStats::default(),
            link_events: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Queue a deterministic link fault. Faults are consumed in order by the
    /// first transmission stage each one applies to.
    pub fn inject_fault(&mut self, fault: LinkFault) {
        self.faults.push_back(fault);
    }

    /// Keep a human-readable event trace for the next run. Off by default:
    /// a noisy run can span millions of rounds.
    pub fn record_link_events(&mut self, enabled: bool) {
        self.link_events = enabled.then(Vec::new);
    }

    /// Drive rounds until `target` packets have been delivered.
    ///
    /// With a `round_limit` configured, that many consecutive rounds without
    /// a delivery abort the run; without one, a channel that loses every
    /// frame spins forever, as the protocol itself would.
    pub fn run(&mut self, target: u32) -> Result<SimulationReport, SimulationError> {
        self.reset();
        debug!(target_packets = target, "starting run");

        let mut idle_rounds = 0u64;
        while self.delivered < target {
            if let Some(limit) = self.config.round_limit {
                if idle_rounds >= limit {
                    return Err(SimulationError::Stalled {
                        rounds: idle_rounds,
                        delivered: self.delivered,
                    });
                }
            }
            let before = self.delivered;
            self.round();
            idle_rounds = if self.delivered > before {
                0
            } else {
                idle_rounds + 1
            };
        }

        let report = self.report();
        info!(
            delivered = report.delivered_packets,
            elapsed_ms = report.elapsed_ms,
            throughput_bps = report.throughput_bps,
            "simulation finished"
        );
        Ok(report)
    }

    fn reset(&mut self) {
        self.sender = SenderState {
            sn: 0,
            next_expected_ack: 1,
            now_ms: 0.0,
        };
        self.receiver = ReceiverState {
            next_expected_frame: 0,
        };
        self.pending_acks.clear();
        self.delivered = 0;
        self.stats = ChannelStats::default();
        if let Some(events) = &mut self.link_events {
            events.clear();
        }
    }

    /// One sender round: transmit, then race the pending acknowledgments
    /// against the retransmission deadline.
    fn round(&mut self) {
        let deadline = timing::timeout_deadline_ms(
            self.sender.now_ms,
            self.config.data_frame_bits(),
            self.config.capacity_bps,
            self.config.timeout_ms,
        );

        if let Some(event) = self.attempt() {
            self.enqueue(event);
        }

        loop {
            // Timeout wins any tie with the head acknowledgment.
            let head = match self.pending_acks.front().copied() {
                Some(head) if head.arrival_ms < deadline => head,
                _ => {
                    self.sender.now_ms = deadline;
                    self.stats.timeouts += 1;
                    debug!(sn = self.sender.sn, deadline_ms = deadline, "timeout");
                    self.emit(deadline, |s| format!("TIMEOUT sn={} retransmitting", s.sender.sn));
                    return;
                }
            };

            self.pending_acks.pop_front();
            self.sender.now_ms = head.arrival_ms;

            if head.rn == self.sender.next_expected_ack && !head.corrupted {
                self.sender.sn ^= 1;
                self.sender.next_expected_ack ^= 1;
                debug_assert_eq!(self.sender.next_expected_ack, 1 - self.sender.sn);
                self.delivered += 1;
                self.stats.acks_accepted += 1;
                debug!(rn = head.rn, at_ms = head.arrival_ms, "ack accepted");
                self.emit(head.arrival_ms, |s| {
                    format!("ACK rn={} accepted, {} delivered", head.rn, s.delivered)
                });
                return;
            }

            if self.config.ack_mode == AckMode::AckNak {
                // Anything not a clean, in-sequence ACK doubles as a NAK.
                self.stats.nak_retransmits += 1;
                debug!(rn = head.rn, corrupted = head.corrupted, "nak, fast retransmit");
                self.emit(head.arrival_ms, |s| {
                    format!("NAK rn={} sn={} fast retransmit", head.rn, s.sender.sn)
                });
                return;
            }

            self.stats.acks_discarded += 1;
            debug!(rn = head.rn, corrupted = head.corrupted, "stale ack discarded");
            self.emit(head.arrival_ms, |_| {
                format!("ACK rn={} corrupted={} discarded", head.rn, head.corrupted)
            });
        }
    }

    /// One transmission attempt: the data frame rides the channel, the
    /// receiver reacts, and the acknowledgment rides back.
    ///
    /// `None` means one of the two frames was swallowed; the sender can only
    /// recover through its timeout.
    fn attempt(&mut self) -> Option<AckEvent> {
        let data_bits = self.config.data_frame_bits();
        let send_ms = self.sender.now_ms;
        let sn = self.sender.sn;
        self.stats.data_frames_sent += 1;

        let data_outcome = if self.take_data_fault() {
            FrameOutcome::Lost
        } else {
            self.channel.transmit(data_bits)
        };

        match data_outcome {
            FrameOutcome::Lost => {
                self.stats.data_frames_lost += 1;
                debug!(sn, at_ms = send_ms, "data frame lost");
                self.emit(send_ms, |_| format!("DATA sn={sn} lost"));
                return None;
            }
            FrameOutcome::Corrupted(bits) => {
                // Delivered but flagged: the receiver stays put and still
                // answers with its current expectation.
                self.stats.data_frames_corrupted += 1;
                self.emit(send_ms, |_| format!("DATA sn={sn} corrupted ({bits} bits)"));
            }
            FrameOutcome::Clean => {
                if self.receiver.next_expected_frame == sn {
                    self.receiver.next_expected_frame ^= 1;
                    self.emit(send_ms, |_| format!("DATA sn={sn} accepted"));
                } else {
                    self.stats.duplicate_frames += 1;
                    self.emit(send_ms, |_| format!("DATA sn={sn} duplicate ignored"));
                }
            }
        }

        let ack_outcome = match self.take_ack_fault() {
            Some(LinkFault::LoseNextAck) => FrameOutcome::Lost,
            Some(LinkFault::CorruptNextAck) => FrameOutcome::Corrupted(1),
            _ => self.channel.transmit(self.config.header_bits),
        };

        if ack_outcome.is_lost() {
            self.stats.acks_lost += 1;
            debug!(sn, at_ms = send_ms, "ack frame lost");
            self.emit(send_ms, |s| {
                format!("ACK rn={} lost", s.receiver.next_expected_frame)
            });
            return None;
        }
        if ack_outcome.is_corrupted() {
            self.stats.acks_corrupted += 1;
        }

        Some(AckEvent {
            rn: self.receiver.next_expected_frame,
            corrupted: ack_outcome.is_corrupted(),
            arrival_ms: timing::ack_arrival_ms(
                send_ms,
                data_bits,
                self.config.header_bits,
                self.config.capacity_bps,
                self.config.propagation_delay_ms,
            ),
        })
    }

    fn enqueue(&mut self, event: AckEvent) {
        // Constant frame sizes and channel parameters keep the per-attempt
        // delay fixed, so arrival times are non-decreasing and FIFO order is
        // arrival order. Variable-size frames would need a time-ordered
        // queue instead.
        debug_assert!(
            self.pending_acks
                .back()
                .is_none_or(|back| back.arrival_ms <= event.arrival_ms)
        );
        self.pending_acks.push_back(event);
    }

    fn take_data_fault(&mut self) -> bool {
        match self.faults.front() {
            Some(LinkFault::LoseNextData) => {
                self.faults.pop_front();
                true
            }
            _ => false,
        }
    }

    fn take_ack_fault(&mut self) -> Option<LinkFault> {
        match self.faults.front() {
            Some(LinkFault::LoseNextAck) | Some(LinkFault::CorruptNextAck) => {
                self.faults.pop_front()
            }
            _ => None,
        }
    }

    fn emit(&mut self, time_ms: f64, message: impl FnOnce(&Self) -> String) {
        if self.link_events.is_some() {
            let description = message(self);
            if let Some(events) = &mut self.link_events {
                events.push(LinkEvent {
                    time_ms,
                    description,
                });
            }
        }
    }

    fn report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            elapsed_ms: self.sender.now_ms,
            delivered_packets: self.delivered,
            throughput_bps: timing::throughput_bps(
                self.delivered,
                self.config.packet_bits,
                self.sender.now_ms,
            ),
            stats: self.stats.clone(),
            link_events: self.link_events.clone().unwrap_or_default(),
        }
    }
}
