//! File-level configuration: one JSON document with a `network` and an
//! `engine` section. Missing fields fall back to their defaults.
//!
//! ```json
//! {
//!   "network": { "max_neurons": 32, "seed": 7 },
//!   "engine": { "period_ms": 60, "mode": "DecisionDemo", "curiosity_rate": 0.1 }
//! }
//! ```

#[cfg(feature = "serde")]
use std::fs;
#[cfg(feature = "serde")]
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{EngineConfig, SimulationEngine};
use crate::error::{ConfigError, EngineError};
use crate::network::{NeuralNetwork, NetworkConfig};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    pub network: NetworkConfig,
    pub engine: EngineConfig,
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.validate()?;
        self.engine.validate()
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    #[cfg(feature = "serde")]
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Seed both random streams from one value.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.network.seed = Some(seed);
        // Offset so the two streams don't start identical.
        self.engine.seed = Some(seed.wrapping_add(0x9E37_79B9_7F4A_7C15));
        self
    }

    /// Build a seeded network and an engine around it.
    pub fn build(&self) -> Result<SimulationEngine, EngineError> {
        self.validate()?;
        let mut net = NeuralNetwork::new(self.network)?;
        net.seed();
        SimulationEngine::new(net.into_shared(), self.engine)
    }
}
