pub mod config;
pub mod scenario;

pub use config::{AckMode, ConfigError, SimConfig};
pub use scenario::{LinkFault, SimConfigOverride, TestAssertion, TestScenario};
