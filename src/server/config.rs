//! Construction-time server configuration.

use crate::simulation::{ScenarioConfig, ScenarioKind};
use std::time::Duration;

/// Configuration for the server binary.
///
/// Nothing here persists across restarts; the server is stateless.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub listen_addr: String,
    /// Wall-clock duration of one simulation tick.
    pub tick_period: Duration,
    /// Seed for the scenario's random source. `None` seeds from entropy;
    /// set it to make a run replayable.
    pub seed: Option<u64>,
    /// Which order-flow scenario to run.
    pub kind: ScenarioKind,
    /// Scenario parameters.
    pub scenario: ScenarioConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8765".to_string(),
            tick_period: Duration::from_millis(250),
            seed: None,
            kind: ScenarioKind::Biotech,
            scenario: ScenarioConfig::default(),
        }
    }
}
