//! Link timing arithmetic shared by the engine and its tests. All times are
//! simulated milliseconds as `f64`.

/// Time needed to clock `frame_bits` onto a link of `capacity_bps`.
pub fn transmission_delay_ms(frame_bits: u64, capacity_bps: u64) -> f64 {
    1000.0 * frame_bits as f64 / capacity_bps as f64
}

/// Arrival time of the acknowledgment for a data frame sent at
/// `send_time_ms`. Both transmissions are charged serially on the shared
/// half-duplex link before the two propagation legs are added.
pub fn ack_arrival_ms(
    send_time_ms: f64,
    data_bits: u64,
    ack_bits: u64,
    capacity_bps: u64,
    propagation_delay_ms: f64,
) -> f64 {
    send_time_ms
        + transmission_delay_ms(data_bits + ack_bits, capacity_bps)
        + 2.0 * propagation_delay_ms
}

/// Sender-side deadline after which an unacknowledged frame is retransmitted.
/// The clock starts once the frame has fully left the sender.
pub fn timeout_deadline_ms(
    send_time_ms: f64,
    data_bits: u64,
    capacity_bps: u64,
    timeout_ms: f64,
) -> f64 {
    send_time_ms + transmission_delay_ms(data_bits, capacity_bps) + timeout_ms
}

/// Useful throughput in bits per second. Only payload bits count toward the
/// numerator; header overhead shows up through the elapsed time.
pub fn throughput_bps(delivered_packets: u32, packet_bits: u64, elapsed_ms: f64) -> f64 {
    if elapsed_ms == 0.0 {
        return 0.0;
    }
    (delivered_packets as u64 * packet_bits) as f64 / (elapsed_ms / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn transmission_delay_scales_with_frame_size() {
        assert!(approx(transmission_delay_ms(96, 1000), 96.0));
        assert!(approx(transmission_delay_ms(1000, 1000), 1000.0));
        assert!(approx(transmission_delay_ms(1, 1_000_000), 0.001));
    }

    #[test]
    fn ack_arrival_charges_both_frames_and_two_legs() {
        // 88-bit data frame + 8-bit ack at 1000 bps, 5 ms one-way.
        assert!(approx(ack_arrival_ms(0.0, 88, 8, 1000, 5.0), 106.0));
        assert!(approx(ack_arrival_ms(100.0, 88, 8, 1000, 5.0), 206.0));
    }

    #[test]
    fn timeout_starts_after_the_frame_leaves() {
        assert!(approx(timeout_deadline_ms(0.0, 96, 1000, 1000.0), 1096.0));
    }

    #[test]
    fn throughput_counts_payload_only() {
        let bps = throughput_bps(1, 80, 106.0);
        assert!(approx(bps, 80.0 / 0.106));
    }

    #[test]
    fn throughput_of_an_empty_run_is_zero() {
        assert_eq!(throughput_bps(0, 80, 0.0), 0.0);
    }
}
