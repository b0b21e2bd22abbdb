//! # neurogenesis
//!
//! A small self-organizing spiking network that grows, learns and forgets
//! while it runs.
//!
//! Each tick every live neuron integrates its incoming synapses, adds noise
//! and bias, and fires when the squashed sum clears its threshold. Synapses
//! between co-firing neurons strengthen, idle ones decay and eventually get
//! pruned, and new neurons and synapses appear stochastically up to a cap.
//! An optional decision layer turns three labelled OUTPUT neurons into a
//! "pick the cheapest door" game with curiosity-driven exploration and
//! reinforcement of the chosen neuron.
//!
//! ## Quick Start
//!
//! ```
//! use neurogenesis::prelude::*;
//!
//! let mut net = NeuralNetwork::new(NetworkConfig::default().with_seed(42)).unwrap();
//! net.seed();
//!
//! let engine = SimulationEngine::new(
//!     net.into_shared(),
//!     EngineConfig::default().with_seed(42).with_mode(Mode::DecisionDemo),
//! )
//! .unwrap();
//!
//! let summary = engine.step_once();
//! assert!(summary.contains("t=1"));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): config files and JSON snapshots
//!
//! ## Modules
//!
//! - [`network`]: neuron store and the tick pipeline
//! - [`decision`]: curiosity chooser, doors scenario, feedback
//! - [`engine`]: cadence, modes and the decision round
//! - [`observer`]: read-only snapshots for inspectors

#[path = "core/rng.rs"]
pub mod rng;

#[path = "core/neuron.rs"]
pub mod neuron;

#[path = "core/connection.rs"]
pub mod connection;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/ticker.rs"]
pub mod ticker;

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod observer;

/// Common imports.
pub mod prelude {
    pub use crate::config::SimulationConfig;
    pub use crate::connection::Connection;
    pub use crate::decision::{CuriosityEngine, DecisionType, DoorsScenario, FeedbackLoop};
    pub use crate::engine::{EngineConfig, LogSink, Mode, SimulationEngine, TracingSink};
    pub use crate::error::{ConfigError, EngineError};
    pub use crate::network::{
        LastDecision, NeuralNetwork, NetworkConfig, SharedNetwork, TickReport,
    };
    pub use crate::neuron::{Neuron, NeuronId, Role};
    pub use crate::observer::{EngineAdapter, NetworkAdapter, NetworkSnapshot};
}
