use core::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::Connection;
use crate::decision::DecisionType;
use crate::error::ConfigError;
use crate::neuron::{Neuron, NeuronId, Role};
use crate::rng::{gaussian, seeded, SimRng};

/// A network shared between the engine, its ticker thread and readers.
///
/// Ticks and neuron removal take the write lock, so they never interleave.
pub type SharedNetwork = Arc<RwLock<NeuralNetwork>>;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NetworkConfig {
    /// Std-dev of the gaussian noise added to every potential.
    pub noise_std: f64,
    /// Chance per tick that a neuron fires regardless of its input.
    pub spontaneous_rate: f64,

    /// Hebbian pull toward 1.0 when both endpoints fire together.
    pub hebb_rate: f64,
    /// Multiplicative weight decay for every edge that was not co-active.
    pub decay_rate: f64,
    pub w_min: f64,
    pub w_max: f64,

    /// Per-tick multiplier of the visualization glow of silent neurons.
    pub glow_decay: f64,

    /// An edge must be idle for more than this many ticks before it can be pruned.
    pub prune_grace: u64,
    /// ...and weaker than this.
    pub prune_below: f64,

    // Growth limits.
    pub max_neurons: usize,
    pub neuron_growth_chance: f64,
    /// Synapse growth stops once `connections >= synapses_per_neuron * neurons`.
    pub synapses_per_neuron: usize,
    pub synapse_growth_chance: f64,
    /// Half-open weight range for the edge wiring a newly grown neuron.
    pub grown_neuron_weight: (f64, f64),
    /// Half-open weight range for a spontaneously grown synapse.
    pub grown_synapse_weight: (f64, f64),

    // If set, makes behavior reproducible for evaluation.
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            noise_std: 0.35,
            spontaneous_rate: 0.03,
            hebb_rate: 0.10,
            decay_rate: 0.01,
            w_min: 0.03,
            w_max: 1.8,
            glow_decay: 0.90,
            prune_grace: 80,
            prune_below: 0.08,
            max_neurons: 24,
            neuron_growth_chance: 0.12,
            synapses_per_neuron: 3,
            synapse_growth_chance: 0.20,
            grown_neuron_weight: (0.25, 0.55),
            grown_synapse_weight: (0.15, 0.45),
            seed: None,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(ConfigError::Invalid("noise_std must be finite and >= 0"));
        }
        if !is_probability(self.spontaneous_rate) {
            return Err(ConfigError::Invalid("spontaneous_rate must be in [0, 1]"));
        }
        if !is_probability(self.hebb_rate) {
            return Err(ConfigError::Invalid("hebb_rate must be in [0, 1]"));
        }
        if !is_probability(self.decay_rate) {
            return Err(ConfigError::Invalid("decay_rate must be in [0, 1]"));
        }
        if !self.w_min.is_finite() || !self.w_max.is_finite() || self.w_min > self.w_max {
            return Err(ConfigError::Invalid("w_min/w_max must be finite with w_min <= w_max"));
        }
        if !is_probability(self.glow_decay) {
            return Err(ConfigError::Invalid("glow_decay must be in [0, 1]"));
        }
        if !self.prune_below.is_finite() || self.prune_below < 0.0 {
            return Err(ConfigError::Invalid("prune_below must be finite and >= 0"));
        }
        if !is_probability(self.neuron_growth_chance) {
            return Err(ConfigError::Invalid("neuron_growth_chance must be in [0, 1]"));
        }
        if !is_probability(self.synapse_growth_chance) {
            return Err(ConfigError::Invalid("synapse_growth_chance must be in [0, 1]"));
        }
        if !is_range(self.grown_neuron_weight) {
            return Err(ConfigError::Invalid("grown_neuron_weight must be a finite range lo < hi"));
        }
        if !is_range(self.grown_synapse_weight) {
            return Err(ConfigError::Invalid("grown_synapse_weight must be a finite range lo < hi"));
        }
        Ok(())
    }

    /// Set the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Cap on neurons created by growth. Explicit `add_neuron` calls ignore it.
    pub fn with_max_neurons(mut self, max_neurons: usize) -> Self {
        self.max_neurons = max_neurons;
        self
    }

    /// Turn both growth processes off (handy for isolating plasticity).
    pub fn without_growth(mut self) -> Self {
        self.neuron_growth_chance = 0.0;
        self.synapse_growth_chance = 0.0;
        self
    }

    pub fn with_noise(mut self, noise_std: f64, spontaneous_rate: f64) -> Self {
        self.noise_std = noise_std;
        self.spontaneous_rate = spontaneous_rate;
        self
    }
}

fn is_probability(p: f64) -> bool {
    p.is_finite() && (0.0..=1.0).contains(&p)
}

fn is_range((lo, hi): (f64, f64)) -> bool {
    lo.is_finite() && hi.is_finite() && lo < hi
}

/// What the decision layer did on its latest iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LastDecision {
    pub chosen: Option<NeuronId>,
    pub kind: DecisionType,
    pub success: bool,
}

/// Counts and growth events of one tick.
///
/// `Display` renders the human-readable summary handed to log sinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub fired: usize,
    pub strengthened: usize,
    pub decayed: usize,
    pub pruned: usize,
    pub grown_neurons: Vec<NeuronId>,
    pub grown_synapses: Vec<(NeuronId, NeuronId)>,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in &self.grown_neurons {
            writeln!(f, "[+] {id} added")?;
        }
        for (a, b) in &self.grown_synapses {
            writeln!(f, "[+] synapse {a}→{b}")?;
        }
        write!(
            f,
            "[*] t={} fired={} strengthened={} decayed={} pruned={}",
            self.tick, self.fired, self.strengthened, self.decayed, self.pruned
        )
    }
}

/// Firing probability of a potential. Saturates instead of overflowing.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x < -12.0 {
        0.0
    } else if x > 12.0 {
        1.0
    } else {
        1.0 / (1.0 + (-x).exp())
    }
}

pub struct NeuralNetwork {
    cfg: NetworkConfig,

    // Dense slot store indexed by `NeuronId`; removed neurons leave `None`.
    neurons: Vec<Option<Neuron>>,
    live: usize,
    connections: Vec<Connection>,

    tick: u64,
    last_decision: Option<LastDecision>,

    rng: SimRng,
}

impl NeuralNetwork {
    pub fn new(cfg: NetworkConfig) -> Result<Self, ConfigError> {
        let rng = seeded(cfg.seed);
        Self::with_rng(cfg, rng)
    }

    /// Build an empty network drawing all randomness from `rng`.
    pub fn with_rng(cfg: NetworkConfig, rng: SimRng) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            neurons: Vec::new(),
            live: 0,
            connections: Vec::new(),
            tick: 0,
            last_decision: None,
            rng,
        })
    }

    /// Wrap into the shared handle used by the engine and readers.
    pub fn into_shared(self) -> SharedNetwork {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.cfg
    }

    /// Populate the initial topology. No-op if any neuron already exists.
    pub fn seed(&mut self) {
        if self.live > 0 {
            return;
        }

        // Small regular core.
        let n1 = self.add_neuron();
        let n2 = self.add_neuron();
        let n3 = self.add_neuron();
        let n4 = self.add_neuron();

        self.connect(n1, n2, 0.4);
        self.connect(n2, n3, 0.5);
        self.connect(n3, n4, 0.6);
        self.connect(n1, n3, 0.2);
        self.connect(n2, n4, 0.3);

        // Readout doors for the decision demo.
        let door_a = self.add_output_neuron("Door A");
        let door_b = self.add_output_neuron("Door B");
        let door_c = self.add_output_neuron("Door C");
        for (src, door) in [(n2, door_a), (n3, door_b), (n4, door_c)] {
            let w = self.rng.gen::<f64>();
            self.connect(src, door, w);
        }

        debug!(
            neurons = self.live,
            connections = self.connections.len(),
            "seeded network"
        );
    }

    pub fn add_neuron(&mut self) -> NeuronId {
        let id = NeuronId(self.neurons.len() as u32);
        let neuron = Neuron::new(id, &mut self.rng);
        self.neurons.push(Some(neuron));
        self.live += 1;
        id
    }

    pub fn add_output_neuron(&mut self, label: impl Into<String>) -> NeuronId {
        let id = self.add_neuron();
        if let Some(n) = self.neuron_mut(id) {
            n.set_role(Role::Output);
            n.set_label(label);
        }
        id
    }

    /// Destroy a neuron and every connection touching it.
    ///
    /// Returns the dead neuron, or `None` if the id is unknown.
    pub fn remove_neuron(&mut self, id: NeuronId) -> Option<Neuron> {
        let mut neuron = self.neurons.get_mut(id.index())?.take()?;
        neuron.alive = false;
        self.live -= 1;

        let before = self.connections.len();
        self.connections.retain(|c| !c.touches(id));
        debug!(
            neuron = %id,
            dropped_connections = before - self.connections.len(),
            "removed neuron"
        );
        Some(neuron)
    }

    /// Add the edge `a → b`.
    ///
    /// Self-loops and unknown endpoints are silently ignored; returns whether
    /// an edge was added.
    pub fn connect(&mut self, a: NeuronId, b: NeuronId, weight: f64) -> bool {
        if self.neuron(a).is_none() || self.neuron(b).is_none() {
            return false;
        }
        match Connection::new(a, b, weight, self.cfg.w_min, self.cfg.w_max) {
            Some(c) => {
                self.connections.push(c);
                true
            }
            None => false,
        }
    }

    pub fn neuron(&self, id: NeuronId) -> Option<&Neuron> {
        self.neurons.get(id.index()).and_then(Option::as_ref)
    }

    pub fn neuron_mut(&mut self, id: NeuronId) -> Option<&mut Neuron> {
        self.neurons.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Living neurons in creation order.
    pub fn neurons(&self) -> impl Iterator<Item = &Neuron> + '_ {
        self.neurons.iter().flatten()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// OUTPUT-role neurons in creation order.
    pub fn output_neurons(&self) -> Vec<&Neuron> {
        self.neurons().filter(|n| n.role == Role::Output).collect()
    }

    pub fn neuron_count(&self) -> usize {
        self.live
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn last_decision(&self) -> Option<LastDecision> {
        self.last_decision
    }

    pub fn set_last_decision(&mut self, decision: LastDecision) {
        self.last_decision = Some(decision);
    }

    /// Advance every neuron and connection by exactly one step.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let now = self.tick;
        let cfg = self.cfg;
        let mut report = TickReport {
            tick: now,
            ..TickReport::default()
        };

        // (A) Aggregate input from neurons that fired last tick.
        let mut input = vec![0.0; self.neurons.len()];
        for c in &mut self.connections {
            let src_fired = self.neurons[c.from.index()]
                .as_ref()
                .is_some_and(|n| n.fired);
            if src_fired {
                input[c.to.index()] += c.weight;
                c.mark_used(now);
            }
        }

        // (B) Stage firing decisions. Only `next_fired` is written here, so
        // no neuron sees a decision made earlier in the same tick.
        // Removed neurons leave their slot empty, so every `Some` is alive.
        for n in self.neurons.iter_mut().flatten() {
            let potential = input[n.id.index()] + n.bias + gaussian(&mut self.rng, cfg.noise_std);
            let will_fire =
                sigmoid(potential) > n.threshold || self.rng.gen::<f64>() < cfg.spontaneous_rate;
            n.next_fired = will_fire;
            if will_fire {
                report.fired += 1;
            }
        }

        // (C) Commit.
        for n in self.neurons.iter_mut().flatten() {
            n.commit(now, cfg.glow_decay);
        }

        // (D) Hebbian plasticity.
        let fired: Vec<bool> = self
            .neurons
            .iter()
            .map(|slot| slot.as_ref().is_some_and(|n| n.fired))
            .collect();
        for c in &mut self.connections {
            let w = c.weight;
            let w = if fired[c.from.index()] && fired[c.to.index()] {
                report.strengthened += 1;
                w + cfg.hebb_rate * (1.0 - w)
            } else {
                report.decayed += 1;
                w * (1.0 - cfg.decay_rate)
            };
            c.set_weight(w, cfg.w_min, cfg.w_max);
        }

        // (E) Prune stale, weak edges.
        report.pruned = self.prune();

        // (F) Growth.
        self.grow(&mut report);

        report
    }

    /// Drop edges that are both weak and idle past the grace period.
    ///
    /// Edges into OUTPUT neurons are kept no matter what.
    pub(crate) fn prune(&mut self) -> usize {
        let now = self.tick;
        let grace = self.cfg.prune_grace;
        let below = self.cfg.prune_below;
        let neurons = &self.neurons;

        let before = self.connections.len();
        self.connections.retain(|c| {
            let into_output = neurons
                .get(c.to.index())
                .and_then(Option::as_ref)
                .is_some_and(|n| n.role == Role::Output);
            into_output || !(c.weight < below && c.idle_for(now) > grace)
        });
        let pruned = before - self.connections.len();
        if pruned > 0 {
            debug!(tick = now, pruned, "pruned connections");
        }
        pruned
    }

    fn grow(&mut self, report: &mut TickReport) {
        let cfg = self.cfg;

        if self.live < cfg.max_neurons && self.rng.gen_bool(cfg.neuron_growth_chance) {
            // Pick the source before the newcomer exists so it can't wire to itself.
            let fired: Vec<NeuronId> = self.neurons().filter(|n| n.fired).map(|n| n.id).collect();
            let src = match fired.choose(&mut self.rng) {
                Some(&id) => Some(id),
                None => self.random_neuron(),
            };

            let id = self.add_neuron();
            if let Some(src) = src {
                let (lo, hi) = cfg.grown_neuron_weight;
                let w = self.rng.gen_range(lo..hi);
                self.connect(src, id, w);
            }
            debug!(tick = self.tick, neuron = %id, "grew neuron");
            report.grown_neurons.push(id);
        }

        if self.live >= 2
            && self.connections.len() < cfg.synapses_per_neuron.saturating_mul(self.live)
            && self.rng.gen_bool(cfg.synapse_growth_chance)
        {
            let ids: Vec<NeuronId> = self.neurons().map(|n| n.id).collect();
            let i = self.rng.gen_range(0..ids.len());
            // Second draw skips `i` so the pair is always distinct.
            let mut j = self.rng.gen_range(0..ids.len() - 1);
            if j >= i {
                j += 1;
            }
            let (a, b) = (ids[i], ids[j]);
            let (lo, hi) = cfg.grown_synapse_weight;
            let w = self.rng.gen_range(lo..hi);
            if self.connect(a, b, w) {
                debug!(tick = self.tick, from = %a, to = %b, "grew synapse");
                report.grown_synapses.push((a, b));
            }
        }
    }

    fn random_neuron(&mut self) -> Option<NeuronId> {
        let ids: Vec<NeuronId> = self.neurons().map(|n| n.id).collect();
        ids.choose(&mut self.rng).copied()
    }
}
