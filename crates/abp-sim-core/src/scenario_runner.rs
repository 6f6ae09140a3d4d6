use anyhow::{Context, Result, bail};
use std::fs;
use tracing::info;

use abp_sim_abstract::{SimConfig, TestAssertion, TestScenario};

use crate::engine::{SimulationError, Simulator};
use crate::trace::SimulationReport;

/// How a scenario run ended. A stall is a legitimate outcome a scenario can
/// assert on, not an error in itself.
#[derive(Debug)]
pub enum ScenarioOutcome {
    Completed(SimulationReport),
    Stalled { rounds: u64, delivered: u32 },
}

pub fn run_scenario_file(path: &str) -> Result<ScenarioOutcome> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading scenario {path}"))?;
    run_scenario_str(&text)
}

pub fn run_scenario_str(text: &str) -> Result<ScenarioOutcome> {
    let scenario: TestScenario = toml::from_str(text).context("parsing scenario")?;
    info!("Running scenario '{}': {}", scenario.name, scenario.description);

    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);

    let mut sim = Simulator::new(config)?;
    for fault in &scenario.faults {
        sim.inject_fault(*fault);
    }
    sim.record_link_events(true);

    let outcome = match sim.run(scenario.target_packets) {
        Ok(report) => ScenarioOutcome::Completed(report),
        Err(SimulationError::Stalled { rounds, delivered }) => {
            ScenarioOutcome::Stalled { rounds, delivered }
        }
    };

    check_assertions(&scenario, &outcome)?;
    info!("Scenario '{}' passed", scenario.name);
    Ok(outcome)
}

fn check_assertions(scenario: &TestScenario, outcome: &ScenarioOutcome) -> Result<()> {
    for assertion in &scenario.assertions {
        match (assertion, outcome) {
            (TestAssertion::Stalled, ScenarioOutcome::Stalled { .. }) => {}
            (TestAssertion::Stalled, ScenarioOutcome::Completed(report)) => bail!(
                "scenario '{}': expected a stall but {} packets were delivered",
                scenario.name,
                report.delivered_packets
            ),
            (assertion, ScenarioOutcome::Stalled { rounds, delivered }) => bail!(
                "scenario '{}': stalled after {rounds} idle rounds ({delivered} delivered) \
                 before {assertion:?} could hold",
                scenario.name
            ),
            (assertion, ScenarioOutcome::Completed(report)) => {
                check_report(&scenario.name, assertion, report)?
            }
        }
    }
    Ok(())
}

fn check_report(name: &str, assertion: &TestAssertion, report: &SimulationReport) -> Result<()> {
    match assertion {
        TestAssertion::DeliveredPackets { count } => {
            if report.delivered_packets != *count {
                bail!(
                    "scenario '{name}': delivered {} packets, expected {count}",
                    report.delivered_packets
                );
            }
        }
        TestAssertion::ThroughputAtLeast { bps } => {
            if report.throughput_bps < *bps {
                bail!(
                    "scenario '{name}': throughput {:.3} bps is below {bps}",
                    report.throughput_bps
                );
            }
        }
        TestAssertion::ThroughputAtMost { bps } => {
            if report.throughput_bps > *bps {
                bail!(
                    "scenario '{name}': throughput {:.3} bps is above {bps}",
                    report.throughput_bps
                );
            }
        }
        TestAssertion::MaxElapsedMs { ms } => {
            if report.elapsed_ms > *ms {
                bail!(
                    "scenario '{name}': finished at {:.3} ms, past the {ms} ms bound",
                    report.elapsed_ms
                );
            }
        }
        TestAssertion::DataFramesSent { min, max } => {
            let sent = report.stats.data_frames_sent;
            if sent < *min || max.is_some_and(|max| sent > max) {
                bail!(
                    "scenario '{name}': {sent} data frames sent, expected [{min}, {}]",
                    max.map_or_else(|| "∞".to_string(), |max| max.to_string())
                );
            }
        }
        TestAssertion::Stalled => unreachable!("handled against the outcome"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_scenario_passes_its_assertions() {
        let outcome = run_scenario_str(
            r#"
                name = "clean"
                description = "teaching parameters, no noise"
                target_packets = 1

                [config]
                header_bits = 8
                packet_bits = 80
                timeout_ms = 1000.0
                capacity_bps = 1000
                propagation_delay_ms = 5.0
                bit_error_rate = 0.0

                [[assertions]]
                type = "delivered_packets"
                count = 1

                [[assertions]]
                type = "max_elapsed_ms"
                ms = 106.5

                [[assertions]]
                type = "throughput_at_least"
                bps = 754.0
            "#,
        )
        .unwrap();

        match outcome {
            ScenarioOutcome::Completed(report) => {
                assert_eq!(report.delivered_packets, 1);
                assert!(!report.link_events.is_empty());
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn dead_link_scenario_asserts_its_stall() {
        let outcome = run_scenario_str(
            r#"
                name = "dead-link"
                description = "every frame exceeds the error threshold"
                target_packets = 1

                [config]
                bit_error_rate = 1.0
                round_limit = 32

                [[assertions]]
                type = "stalled"
            "#,
        )
        .unwrap();

        assert!(matches!(
            outcome,
            ScenarioOutcome::Stalled {
                rounds: 32,
                delivered: 0
            }
        ));
    }

    #[test]
    fn violated_assertion_names_the_scenario() {
        let err = run_scenario_str(
            r#"
                name = "impossible"
                description = "asks for more than the link can carry"
                target_packets = 1

                [config]
                header_bits = 8
                packet_bits = 80
                capacity_bps = 1000
                bit_error_rate = 0.0

                [[assertions]]
                type = "throughput_at_least"
                bps = 1000000.0
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("impossible"));
    }

    #[test]
    fn invalid_config_is_rejected_before_running() {
        let err = run_scenario_str(
            r#"
                name = "broken"
                description = "zero capacity cannot carry a frame"
                target_packets = 1

                [config]
                capacity_bps = 0

                [[assertions]]
                type = "delivered_packets"
                count = 1
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("capacity"));
    }
}
