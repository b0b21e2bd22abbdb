use crate::neuron::Neuron;

const LEARN_RATE: f64 = 0.1;

/// Reinforces the chosen neuron's scalar weight after each decision.
///
/// Works only on `Neuron::weight`; connection weights belong to the Hebbian
/// rule and are never touched here.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackLoop {
    rate: f64,
}

impl Default for FeedbackLoop {
    fn default() -> Self {
        Self { rate: LEARN_RATE }
    }
}

impl FeedbackLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(rate: f64) -> Self {
        Self {
            rate: if rate.is_finite() { rate.abs() } else { LEARN_RATE },
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// `+rate` on success, `-rate` on failure; the neuron clamps to [0, 1].
    pub fn apply(&self, chosen: Option<&mut Neuron>, success: bool) {
        let Some(neuron) = chosen else {
            return;
        };
        let delta = if success { self.rate } else { -self.rate };
        neuron.adjust_weight(delta);
    }
}
