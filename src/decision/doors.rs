use std::collections::BTreeMap;

use rand::Rng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::neuron::Neuron;

pub const DOOR_LABELS: [&str; 3] = ["A", "B", "C"];

/// Cost charged for a choice whose label is not in the table.
pub const UNKNOWN_COST: u8 = 10;

const MIN_COST: u8 = 1;
const MAX_COST: u8 = 10;

/// Map a neuron label onto a door key: "Door A" and "A" both mean door "A".
pub fn door_key(label: &str) -> &str {
    label.strip_prefix("Door ").unwrap_or(label).trim()
}

/// Outcome of scoring one choice against the reward table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Evaluation {
    pub success: bool,
    /// Cheapest door; `None` when there was no choice to score.
    pub best: Option<String>,
    pub chosen_cost: u8,
}

impl Evaluation {
    pub fn unresolved() -> Self {
        Self {
            success: false,
            best: None,
            chosen_cost: UNKNOWN_COST,
        }
    }
}

/// Three doors, each with a cost in [1, 10]; lower is better.
#[derive(Debug, Clone)]
pub struct DoorsScenario {
    // Sorted map: iteration order is the tie-break order.
    costs: BTreeMap<String, u8>,
}

impl DoorsScenario {
    /// New table with freshly drawn costs.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut scenario = Self {
            costs: BTreeMap::new(),
        };
        scenario.shuffle(rng);
        scenario
    }

    /// Fixed costs for doors A, B, C (clamped into [1, 10]).
    pub fn with_costs(costs: [u8; 3]) -> Self {
        Self {
            costs: DOOR_LABELS
                .iter()
                .zip(costs)
                .map(|(label, c)| (label.to_string(), c.clamp(MIN_COST, MAX_COST)))
                .collect(),
        }
    }

    /// Redraw every cost independently. Duplicates are allowed.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for label in DOOR_LABELS {
            self.costs
                .insert(label.to_string(), rng.gen_range(MIN_COST..=MAX_COST));
        }
    }

    pub fn costs(&self) -> &BTreeMap<String, u8> {
        &self.costs
    }

    pub fn cost(&self, label: &str) -> u8 {
        self.costs
            .get(door_key(label))
            .copied()
            .unwrap_or(UNKNOWN_COST)
    }

    /// Cheapest door; equal costs resolve to the lexicographically lowest label.
    pub fn best_label(&self) -> Option<&str> {
        self.costs
            .iter()
            .min_by_key(|(_, cost)| **cost)
            .map(|(label, _)| label.as_str())
    }

    pub fn evaluate(&self, chosen: Option<&Neuron>) -> Evaluation {
        let Some(chosen) = chosen else {
            return Evaluation::unresolved();
        };

        let key = chosen.label().map(door_key);
        let chosen_cost = key.map_or(UNKNOWN_COST, |k| self.cost(k));
        let best = self.best_label();
        let success = matches!((key, best), (Some(k), Some(b)) if k == b);

        Evaluation {
            success,
            best: best.map(str::to_string),
            chosen_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron::NeuronId;
    use crate::rng::seeded;

    fn labeled(label: &str) -> Neuron {
        let mut rng = seeded(Some(1));
        let mut n = Neuron::new(NeuronId(0), &mut rng);
        n.set_label(label);
        n
    }

    #[test]
    fn cheapest_door_wins() {
        let scenario = DoorsScenario::with_costs([3, 7, 5]);
        let eval = scenario.evaluate(Some(&labeled("A")));
        assert!(eval.success);
        assert_eq!(eval.best.as_deref(), Some("A"));
        assert_eq!(eval.chosen_cost, 3);
    }

    #[test]
    fn door_prefixed_labels_resolve() {
        let scenario = DoorsScenario::with_costs([3, 7, 5]);
        assert!(scenario.evaluate(Some(&labeled("Door A"))).success);

        let eval = scenario.evaluate(Some(&labeled("Door C")));
        assert!(!eval.success);
        assert_eq!(eval.chosen_cost, 5);
        assert_eq!(eval.best.as_deref(), Some("A"));
    }

    #[test]
    fn ties_resolve_to_lowest_label() {
        let scenario = DoorsScenario::with_costs([6, 2, 2]);
        assert_eq!(scenario.best_label(), Some("B"));
        assert!(scenario.evaluate(Some(&labeled("B"))).success);
        assert!(!scenario.evaluate(Some(&labeled("C"))).success);
    }

    #[test]
    fn unknown_or_missing_label_costs_ten() {
        let scenario = DoorsScenario::with_costs([3, 7, 5]);
        let eval = scenario.evaluate(Some(&labeled("Window")));
        assert!(!eval.success);
        assert_eq!(eval.chosen_cost, UNKNOWN_COST);

        let mut rng = seeded(Some(2));
        let unlabeled = Neuron::new(NeuronId(1), &mut rng);
        let eval = scenario.evaluate(Some(&unlabeled));
        assert!(!eval.success);
        assert_eq!(eval.chosen_cost, UNKNOWN_COST);
    }

    #[test]
    fn absent_choice_is_unresolved() {
        let scenario = DoorsScenario::with_costs([3, 7, 5]);
        assert_eq!(scenario.evaluate(None), Evaluation::unresolved());
    }

    #[test]
    fn shuffle_keeps_costs_in_range() {
        let mut rng = seeded(Some(9));
        let mut scenario = DoorsScenario::new(&mut rng);
        for _ in 0..200 {
            scenario.shuffle(&mut rng);
            assert_eq!(scenario.costs().len(), 3);
            assert!(scenario.costs().values().all(|&c| (1..=10).contains(&c)));
        }
    }
}
