use crate::neuron::NeuronId;

/// Directed synapse between two distinct neurons.
///
/// Endpoints are handles, not references, so removing a neuron can never
/// leave a dangling edge behind; the network drops touching edges instead.
#[derive(Debug, Clone)]
pub struct Connection {
    pub(crate) from: NeuronId,
    pub(crate) to: NeuronId,
    pub(crate) weight: f64,

    pub(crate) usage: u64,
    // `None` until the source first fires through this edge.
    pub(crate) last_used_tick: Option<u64>,
}

impl Connection {
    /// Build an edge with `weight` clamped into `[w_min, w_max]`.
    ///
    /// Returns `None` for a self-loop.
    pub fn new(from: NeuronId, to: NeuronId, weight: f64, w_min: f64, w_max: f64) -> Option<Self> {
        if from == to {
            return None;
        }
        Some(Self {
            from,
            to,
            weight: clamp_weight(weight, w_min, w_max),
            usage: 0,
            last_used_tick: None,
        })
    }

    pub fn from(&self) -> NeuronId {
        self.from
    }

    pub fn to(&self) -> NeuronId {
        self.to
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn usage(&self) -> u64 {
        self.usage
    }

    pub fn last_used_tick(&self) -> Option<u64> {
        self.last_used_tick
    }

    pub fn touches(&self, id: NeuronId) -> bool {
        self.from == id || self.to == id
    }

    /// Record that the source fired through this edge at `tick`.
    pub(crate) fn mark_used(&mut self, tick: u64) {
        self.usage = self.usage.saturating_add(1);
        self.last_used_tick = Some(tick);
    }

    /// Ticks since last use; a never-used edge is infinitely stale.
    pub fn idle_for(&self, now: u64) -> u64 {
        match self.last_used_tick {
            Some(t) => now.saturating_sub(t),
            None => u64::MAX,
        }
    }

    pub(crate) fn set_weight(&mut self, w: f64, w_min: f64, w_max: f64) {
        self.weight = clamp_weight(w, w_min, w_max);
    }
}

#[inline]
fn clamp_weight(w: f64, lo: f64, hi: f64) -> f64 {
    if w.is_nan() {
        lo
    } else {
        w.clamp(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_loop_is_refused() {
        assert!(Connection::new(NeuronId(2), NeuronId(2), 0.5, 0.03, 1.8).is_none());
    }

    #[test]
    fn weight_is_clamped_on_creation() {
        let c = Connection::new(NeuronId(0), NeuronId(1), 5.0, 0.03, 1.8).unwrap();
        assert_eq!(c.weight(), 1.8);
        let c = Connection::new(NeuronId(0), NeuronId(1), 0.0, 0.03, 1.8).unwrap();
        assert_eq!(c.weight(), 0.03);
    }

    #[test]
    fn usage_tracking() {
        let mut c = Connection::new(NeuronId(0), NeuronId(1), 0.4, 0.03, 1.8).unwrap();
        assert_eq!(c.idle_for(10), u64::MAX);
        c.mark_used(10);
        c.mark_used(12);
        assert_eq!(c.usage(), 2);
        assert_eq!(c.last_used_tick(), Some(12));
        assert_eq!(c.idle_for(95), 83);
        assert!(c.touches(NeuronId(1)));
        assert!(!c.touches(NeuronId(2)));
    }
}
