use core::fmt;

use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable handle of a neuron inside one network.
///
/// Handles are slot indices: they are handed out in increasing order and never
/// reused, so a removed neuron's id cannot alias a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct NeuronId(pub u32);

impl NeuronId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NeuronId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 1-based for humans; slot 0 is "N1".
        write!(f, "N{}", self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Role {
    #[default]
    Regular,
    /// Readout unit; candidates for the decision layer. Incoming edges are
    /// never pruned.
    Output,
}

/// Half-width of the symmetric range a neuron's bias is drawn from.
pub const BIAS_SPREAD: f64 = 0.15;
pub const DEFAULT_THRESHOLD: f64 = 0.6;
pub const DEFAULT_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct Neuron {
    pub(crate) id: NeuronId,

    // Visualization glow, 0..1. Not used by the spiking rule itself.
    pub(crate) activation: f64,
    pub(crate) alive: bool,

    pub(crate) role: Role,
    pub(crate) label: Option<String>,

    // Reinforcement scalar for the decision layer, 0..1.
    // Unrelated to connection weights.
    pub(crate) weight: f64,

    // Two-phase spiking: `next_fired` is staged during a tick and copied
    // into `fired` at commit.
    pub(crate) fired: bool,
    pub(crate) next_fired: bool,
    pub(crate) last_fired_tick: Option<u64>,

    pub(crate) bias: f64,
    pub(crate) threshold: f64,

    pub(crate) visits: u32,
}

impl Neuron {
    /// Create a regular neuron. Bias and initial glow come from `rng`.
    pub fn new<R: Rng + ?Sized>(id: NeuronId, rng: &mut R) -> Self {
        Self {
            id,
            activation: rng.gen::<f64>(),
            alive: true,
            role: Role::Regular,
            label: None,
            weight: DEFAULT_WEIGHT,
            fired: false,
            next_fired: false,
            last_fired_tick: None,
            bias: rng.gen_range(-BIAS_SPREAD..BIAS_SPREAD),
            threshold: DEFAULT_THRESHOLD,
            visits: 0,
        }
    }

    pub fn id(&self) -> NeuronId {
        self.id
    }

    pub fn activation(&self) -> f64 {
        self.activation
    }

    pub fn set_activation(&mut self, a: f64) {
        self.activation = clamp_unit(a);
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, w: f64) {
        self.weight = clamp_unit(w);
    }

    /// Shift the reinforcement weight by `delta`, staying inside [0, 1].
    pub fn adjust_weight(&mut self, delta: f64) {
        self.weight = clamp_unit(self.weight + delta);
    }

    pub fn is_fired(&self) -> bool {
        self.fired
    }

    pub fn last_fired_tick(&self) -> Option<u64> {
        self.last_fired_tick
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, t: f64) {
        self.threshold = clamp_unit(t);
    }

    pub fn visits(&self) -> u32 {
        self.visits
    }

    pub fn bump_visit(&mut self) {
        self.visits = self.visits.saturating_add(1);
    }

    /// 1.0 for a neuron never visited, falling toward 0 with each visit.
    pub fn novelty(&self) -> f64 {
        1.0 / (1.0 + self.visits as f64)
    }

    /// Copy the staged flag into the live one and update the glow.
    pub(crate) fn commit(&mut self, tick: u64, glow_decay: f64) {
        self.fired = self.next_fired;
        if self.fired {
            self.last_fired_tick = Some(tick);
            self.activation = 1.0;
        } else {
            self.activation = (self.activation * glow_decay).max(0.0);
        }
    }
}

// NaN collapses to 0 so a bad input can never leave the domain.
#[inline]
fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
