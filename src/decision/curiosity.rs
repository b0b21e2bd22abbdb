use rand::Rng;

use super::DecisionType;
use crate::neuron::{Neuron, NeuronId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub neuron: NeuronId,
    pub kind: DecisionType,
}

/// Epsilon-greedy policy over a candidate set.
///
/// Holds no state; the random source is passed in on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct CuriosityEngine;

impl CuriosityEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pick a candidate, or `None` when there is nothing to pick from.
    ///
    /// With probability `curiosity_rate` (clamped to [0, 1]) a uniformly
    /// random candidate is returned as [`DecisionType::Curious`]; otherwise
    /// the most active one as [`DecisionType::Logical`], earliest wins ties.
    pub fn choose<R: Rng + ?Sized>(
        &self,
        candidates: &[&Neuron],
        curiosity_rate: f64,
        rng: &mut R,
    ) -> Option<Choice> {
        if candidates.is_empty() {
            return None;
        }
        let rate = if curiosity_rate.is_nan() {
            0.0
        } else {
            curiosity_rate.clamp(0.0, 1.0)
        };

        if rng.gen::<f64>() < rate {
            let pick = candidates[rng.gen_range(0..candidates.len())];
            return Some(Choice {
                neuron: pick.id(),
                kind: DecisionType::Curious,
            });
        }

        let mut best = candidates[0];
        for &n in &candidates[1..] {
            // Strict comparison keeps the first of equal maxima.
            if n.activation() > best.activation() {
                best = n;
            }
        }
        Some(Choice {
            neuron: best.id(),
            kind: DecisionType::Logical,
        })
    }
}
