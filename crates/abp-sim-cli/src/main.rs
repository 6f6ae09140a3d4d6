use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use abp_sim_abstract::{AckMode, SimConfig};
use abp_sim_core::scenario_runner::{self, ScenarioOutcome};
use abp_sim_core::{SimulationReport, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Alternating Bit Protocol link simulator")]
struct Args {
    /// Treat corrupted or out-of-sequence acknowledgments as NAKs.
    #[arg(long, default_value_t = false)]
    ack_nak: bool,

    /// Frame header length in bits.
    #[arg(long, default_value_t = 64)]
    header_bits: u64,

    /// Packet payload length in bits.
    #[arg(long, default_value_t = 1024)]
    packet_bits: u64,

    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 100.0)]
    timeout_ms: f64,

    /// Channel capacity in bits per second.
    #[arg(short = 'C', long, default_value_t = 1_000_000)]
    capacity: u64,

    /// One-way propagation delay in milliseconds.
    #[arg(short = 'p', long, default_value_t = 5.0)]
    propagation_delay_ms: f64,

    /// Per-bit error probability.
    #[arg(short = 'b', long, default_value_t = 0.0)]
    ber: f64,

    /// Number of packets to deliver before reporting.
    #[arg(short = 'n', long, default_value_t = 1000)]
    packets: u32,

    /// Channel noise seed.
    #[arg(short = 's', long, default_value_t = 0)]
    seed: u64,

    /// Abort after this many consecutive rounds without a delivery.
    #[arg(long)]
    round_limit: Option<u64>,

    /// Run a scenario file instead of the parameters above.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let report = if let Some(path) = &args.scenario {
        let path = path.to_str().context("scenario path contains invalid UTF-8")?;
        match scenario_runner::run_scenario_file(path)? {
            ScenarioOutcome::Completed(report) => report,
            ScenarioOutcome::Stalled { rounds, delivered } => {
                info!(rounds, delivered, "scenario stalled, as asserted");
                return Ok(());
            }
        }
    } else {
        run_from_args(&args)?
    };

    print_report(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

fn run_from_args(args: &Args) -> Result<SimulationReport> {
    let config = SimConfig {
        ack_mode: if args.ack_nak {
            AckMode::AckNak
        } else {
            AckMode::Ack
        },
        header_bits: args.header_bits,
        packet_bits: args.packet_bits,
        timeout_ms: args.timeout_ms,
        capacity_bps: args.capacity,
        propagation_delay_ms: args.propagation_delay_ms,
        bit_error_rate: args.ber,
        seed: args.seed,
        round_limit: args.round_limit,
    };

    let mut sim = Simulator::new(config)?;
    if args.trace_out.is_some() {
        sim.record_link_events(true);
    }
    Ok(sim.run(args.packets)?)
}

fn print_report(report: &SimulationReport) {
    let config = &report.config;
    println!("ABP simulator");
    println!("  {:<24} {:?}", "ack mode:", config.ack_mode);
    println!("Sender-side parameters");
    println!("  {:<24} {}", "H, header (bits):", config.header_bits);
    println!("  {:<24} {}", "l, packet (bits):", config.packet_bits);
    println!("  {:<24} {}", "DELTA, timeout (ms):", config.timeout_ms);
    println!("Channel parameters");
    println!("  {:<24} {}", "C, capacity (bps):", config.capacity_bps);
    println!("  {:<24} {}", "TAU, propagation (ms):", config.propagation_delay_ms);
    println!("  {:<24} {:e}", "BER:", config.bit_error_rate);
    println!("Results");
    println!("  {:<24} {}", "packets delivered:", report.delivered_packets);
    println!("  {:<24} {}", "data frames sent:", report.stats.data_frames_sent);
    println!("  {:<24} {}", "timeouts:", report.stats.timeouts);
    println!(
        "  {:<24} {:.4}",
        "frame error rate:",
        report.stats.data_frame_error_rate()
    );
    println!("Time to complete (ms): {:.3}", report.elapsed_ms);
    println!("Throughput (bps): {:.3}", report.throughput_bps);
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing trace")?;
    fs::write(path, json).with_context(|| format!("writing trace to {}", path.display()))?;
    info!("Wrote simulation trace to {}", path.display());
    Ok(())
}
