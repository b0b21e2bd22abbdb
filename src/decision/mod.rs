//! Decision layer for the doors demo.
//!
//! Sits on top of the spiking network: each step the OUTPUT neurons are the
//! candidates, [`CuriosityEngine`] picks one, [`DoorsScenario`] scores it and
//! [`FeedbackLoop`] nudges the chosen neuron's reinforcement weight.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod curiosity;
mod doors;
mod feedback;

pub use curiosity::{Choice, CuriosityEngine};
pub use doors::{door_key, DoorsScenario, Evaluation, DOOR_LABELS, UNKNOWN_COST};
pub use feedback::FeedbackLoop;

/// How a choice was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DecisionType {
    /// Greedy: the most active candidate.
    #[default]
    Logical,
    /// Exploratory: a uniformly random candidate.
    Curious,
}

impl DecisionType {
    /// Short tag used in log lines.
    pub fn tag(self) -> &'static str {
        match self {
            DecisionType::Logical => "[L]",
            DecisionType::Curious => "[C]",
        }
    }
}
