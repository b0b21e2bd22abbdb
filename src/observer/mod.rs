use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{Mode, SimulationEngine};
use crate::network::{LastDecision, NeuralNetwork, SharedNetwork};
use crate::neuron::{NeuronId, Role};

/// A read-only copy of the network for renderers and inspectors.
///
/// Design intent:
/// - Observers cannot mutate or steer the network.
/// - Snapshotting is *on-demand* and allocates; the tick loop stays unchanged.
/// - A snapshot taken through [`SharedAdapter`] is built under the read lock,
///   so it never mixes two ticks.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkSnapshot {
    pub tick: u64,
    pub neurons: Vec<NeuronView>,
    pub connections: Vec<ConnectionView>,
    pub last_decision: Option<LastDecision>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeuronView {
    pub id: NeuronId,
    pub role: Role,
    pub label: Option<String>,
    pub activation: f64,
    pub fired: bool,
    pub last_fired_tick: Option<u64>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConnectionView {
    pub from: NeuronId,
    pub to: NeuronId,
    pub weight: f64,
    pub usage: u64,
    pub last_used_tick: Option<u64>,
}

impl NetworkSnapshot {
    pub fn fired_count(&self) -> usize {
        self.neurons.iter().filter(|n| n.fired).count()
    }

    pub fn avg_weight(&self) -> f64 {
        if self.connections.is_empty() {
            return 0.0;
        }
        self.connections.iter().map(|c| c.weight).sum::<f64>() / self.connections.len() as f64
    }
}

pub struct NetworkAdapter<'a> {
    net: &'a NeuralNetwork,
}

impl<'a> NetworkAdapter<'a> {
    pub fn new(net: &'a NeuralNetwork) -> Self {
        Self { net }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let neurons = self
            .net
            .neurons()
            .map(|n| NeuronView {
                id: n.id(),
                role: n.role(),
                label: n.label().map(str::to_string),
                activation: n.activation(),
                fired: n.is_fired(),
                last_fired_tick: n.last_fired_tick(),
                weight: n.weight(),
            })
            .collect();

        let connections = self
            .net
            .connections()
            .iter()
            .map(|c| ConnectionView {
                from: c.from(),
                to: c.to(),
                weight: c.weight(),
                usage: c.usage(),
                last_used_tick: c.last_used_tick(),
            })
            .collect();

        NetworkSnapshot {
            tick: self.net.tick_count(),
            neurons,
            connections,
            last_decision: self.net.last_decision(),
        }
    }
}

/// Snapshots a shared network, holding the read lock only while copying.
pub struct SharedAdapter<'a> {
    net: &'a SharedNetwork,
}

impl<'a> SharedAdapter<'a> {
    pub fn new(net: &'a SharedNetwork) -> Self {
        Self { net }
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        let guard = self.net.read();
        NetworkAdapter::new(&guard).snapshot()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineSnapshot {
    pub running: bool,
    pub mode: Mode,
    pub curiosity_rate: f64,
    pub door_costs: BTreeMap<String, u8>,
    pub network: NetworkSnapshot,
}

pub struct EngineAdapter<'a> {
    engine: &'a SimulationEngine,
}

impl<'a> EngineAdapter<'a> {
    pub fn new(engine: &'a SimulationEngine) -> Self {
        Self { engine }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let network = self.engine.network();
        EngineSnapshot {
            running: self.engine.is_running(),
            mode: self.engine.mode(),
            curiosity_rate: self.engine.curiosity_rate(),
            door_costs: self.engine.scenario_costs(),
            network: SharedAdapter::new(&network).snapshot(),
        }
    }
}
