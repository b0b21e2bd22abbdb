//! Orchestration: step cadence, mode dispatch, decision feedback.
//!
//! [`SimulationEngine`] owns the decision layer and a handle to the shared
//! network. Every iteration ticks the network; in
//! [`Mode::DecisionDemo`] it also runs one round of the doors game on the
//! OUTPUT neurons and writes the outcome back into the network.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::decision::{CuriosityEngine, DecisionType, DoorsScenario, FeedbackLoop};
use crate::error::{ConfigError, EngineError};
use crate::network::{LastDecision, NeuralNetwork, SharedNetwork};
use crate::neuron::{Neuron, NeuronId};
use crate::rng::{seeded, SimRng};
use crate::ticker::Ticker;

pub const NO_CANDIDATES_LINE: &str = "[!] No OUTPUT neurons";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    /// Spiking, plasticity, pruning and growth only.
    #[default]
    BiologicalOnly,
    /// Biological dynamics plus one doors decision per step.
    DecisionDemo,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::BiologicalOnly => "bio",
            Mode::DecisionDemo => "doors",
        })
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bio" | "biological" | "biological-only" | "neuron-only" => Ok(Mode::BiologicalOnly),
            "doors" | "demo" | "decision" | "decision-demo" => Ok(Mode::DecisionDemo),
            other => Err(format!("unknown mode '{other}' (expected 'bio' or 'doors')")),
        }
    }
}

/// Receives one summary per iteration.
///
/// Lines from [`SimulationEngine::start`] arrive on the ticker thread; lines
/// from [`SimulationEngine::step`] arrive on the caller's thread. A summary may
/// span several `\n`-separated rows (growth events, decision line).
pub trait LogSink {
    fn deliver(&mut self, line: &str);
}

impl<F: FnMut(&str)> LogSink for F {
    fn deliver(&mut self, line: &str) {
        self(line)
    }
}

/// Forwards every row to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn deliver(&mut self, line: &str) {
        for row in line.lines() {
            info!(target: "neurogenesis::sim", "{row}");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Period of the background cadence.
    pub period_ms: u64,
    /// Probability of an exploratory choice in decision-demo mode.
    pub curiosity_rate: f64,
    pub mode: Mode,
    /// Seed of the decision layer's random stream.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            period_ms: 120,
            curiosity_rate: 0.25,
            mode: Mode::BiologicalOnly,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::Invalid("period_ms must be >= 1"));
        }
        if !self.curiosity_rate.is_finite() || !(0.0..=1.0).contains(&self.curiosity_rate) {
            return Err(ConfigError::Invalid("curiosity_rate must be in [0, 1]"));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    mode: Mode,
    curiosity_rate: f64,
}

struct DecisionState {
    chooser: CuriosityEngine,
    scenario: DoorsScenario,
    feedback: FeedbackLoop,
    rng: SimRng,
}

impl DecisionState {
    /// One doors round on an already-ticked network. Returns the log line.
    fn run(&mut self, net: &mut NeuralNetwork, curiosity_rate: f64) -> String {
        let candidates = net.output_neurons();
        let Some(choice) = self.chooser.choose(&candidates, curiosity_rate, &mut self.rng) else {
            net.set_last_decision(LastDecision {
                chosen: None,
                kind: DecisionType::Logical,
                success: false,
            });
            return NO_CANDIDATES_LINE.to_string();
        };

        let chosen = net.neuron(choice.neuron);
        let eval = self.scenario.evaluate(chosen);
        let label = chosen.and_then(Neuron::label).unwrap_or("?").to_string();

        let neuron = net.neuron_mut(choice.neuron);
        if let Some(n) = neuron {
            n.bump_visit();
            self.feedback.apply(Some(n), eval.success);
        }
        net.set_last_decision(LastDecision {
            chosen: Some(choice.neuron),
            kind: choice.kind,
            success: eval.success,
        });

        format!(
            "{} Chose {} | best={} | success={}",
            choice.kind.tag(),
            label,
            eval.best.as_deref().unwrap_or("?"),
            eval.success
        )
    }
}

// State reachable from the ticker thread.
struct Core {
    network: SharedNetwork,
    settings: Mutex<Settings>,
    decision: Mutex<DecisionState>,
}

impl Core {
    fn iterate(&self) -> String {
        // Settings are sampled once so a concurrent change only affects the
        // next iteration.
        let settings = *self.settings.lock();

        // Lock order: network, then decision.
        let mut net = self.network.write();
        let report = net.tick();
        match settings.mode {
            Mode::BiologicalOnly => report.to_string(),
            Mode::DecisionDemo => {
                let line = self.decision.lock().run(&mut net, settings.curiosity_rate);
                format!("{report}\n{line}")
            }
        }
    }
}

pub struct SimulationEngine {
    core: Arc<Core>,
    ticker: Mutex<Option<Ticker>>,
    shut_down: AtomicBool,
}

impl SimulationEngine {
    /// Wrap an existing network. The engine does not seed it.
    pub fn new(network: SharedNetwork, cfg: EngineConfig) -> Result<Self, EngineError> {
        cfg.validate()?;
        let mut rng = seeded(cfg.seed);
        let scenario = DoorsScenario::new(&mut rng);
        Ok(Self::with_parts(network, cfg, scenario, rng))
    }

    /// Like [`SimulationEngine::new`] but with a fixed reward table.
    pub fn with_scenario(
        network: SharedNetwork,
        cfg: EngineConfig,
        scenario: DoorsScenario,
    ) -> Result<Self, EngineError> {
        cfg.validate()?;
        let rng = seeded(cfg.seed);
        Ok(Self::with_parts(network, cfg, scenario, rng))
    }

    fn with_parts(
        network: SharedNetwork,
        cfg: EngineConfig,
        scenario: DoorsScenario,
        rng: SimRng,
    ) -> Self {
        let core = Core {
            network,
            settings: Mutex::new(Settings {
                mode: cfg.mode,
                curiosity_rate: cfg.curiosity_rate,
            }),
            decision: Mutex::new(DecisionState {
                chooser: CuriosityEngine::new(),
                scenario,
                feedback: FeedbackLoop::new(),
                rng,
            }),
        };
        Self {
            core: Arc::new(core),
            ticker: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Shared handle for readers and for explicit topology edits.
    pub fn network(&self) -> SharedNetwork {
        Arc::clone(&self.core.network)
    }

    /// Start the background cadence, replacing any running one.
    ///
    /// The first iteration runs immediately on the ticker thread.
    pub fn start<S>(&self, period: Duration, sink: S) -> Result<(), EngineError>
    where
        S: LogSink + Send + 'static,
    {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(EngineError::ShutDown);
        }
        if period.is_zero() || Instant::now().checked_add(period).is_none() {
            warn!(?period, "rejected start with out-of-range period");
            return Err(EngineError::InvalidPeriod(period));
        }

        self.stop();

        let core = Arc::clone(&self.core);
        let mut sink = sink;

        // Hold the slot while spawning so a sink calling `stop` from the very
        // first iteration waits until there is a ticker to stop.
        let mut slot = self.ticker.lock();
        let ticker = Ticker::start("neurogenesis-ticker", period, move || {
            let line = core.iterate();
            sink.deliver(&line);
        })
        .map_err(EngineError::Spawn)?;
        let previous = slot.replace(ticker);
        drop(slot);
        // A concurrent `start` may have slipped in; retire it outside the lock.
        drop(previous);

        info!(period_ms = period.as_millis() as u64, "simulation started");
        Ok(())
    }

    pub fn start_ms<S>(&self, period_ms: u64, sink: S) -> Result<(), EngineError>
    where
        S: LogSink + Send + 'static,
    {
        self.start(Duration::from_millis(period_ms), sink)
    }

    /// Stop the cadence; no-op when already stopped.
    ///
    /// Must not be called while holding the network lock: an in-flight
    /// iteration needs it to finish.
    pub fn stop(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.stop();
            info!("simulation stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker.lock().is_some()
    }

    /// Run exactly one iteration on this thread. Does not touch the cadence.
    pub fn step<S: LogSink>(&self, mut sink: S) {
        let line = self.core.iterate();
        sink.deliver(&line);
    }

    /// One iteration, returning its summary instead of delivering it.
    pub fn step_once(&self) -> String {
        self.core.iterate()
    }

    pub fn mode(&self) -> Mode {
        self.core.settings.lock().mode
    }

    pub fn set_mode(&self, mode: Mode) {
        self.core.settings.lock().mode = mode;
        info!(%mode, "mode changed");
    }

    pub fn curiosity_rate(&self) -> f64 {
        self.core.settings.lock().curiosity_rate
    }

    /// Set the exploration probability, clamped to [0, 1].
    ///
    /// Returns the applied value; NaN is rejected and leaves the rate unchanged.
    pub fn set_curiosity_rate(&self, rate: f64) -> Result<f64, EngineError> {
        if rate.is_nan() {
            warn!("rejected NaN curiosity rate");
            return Err(EngineError::InvalidCuriosityRate);
        }
        let applied = rate.clamp(0.0, 1.0);
        self.core.settings.lock().curiosity_rate = applied;
        Ok(applied)
    }

    /// Redraw the door costs.
    pub fn shuffle_scenario(&self) {
        let mut decision = self.core.decision.lock();
        let DecisionState { scenario, rng, .. } = &mut *decision;
        scenario.shuffle(rng);
    }

    pub fn scenario_costs(&self) -> BTreeMap<String, u8> {
        self.core.decision.lock().scenario.costs().clone()
    }

    /// Add a regular neuron between ticks.
    pub fn add_neuron(&self) -> NeuronId {
        self.core.network.write().add_neuron()
    }

    /// Remove a neuron under the same lock a tick holds.
    pub fn remove_neuron(&self, id: NeuronId) -> bool {
        self.core.network.write().remove_neuron(id).is_some()
    }

    /// Stop and refuse any further `start`.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.stop();
        info!("simulation shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.get_mut().take() {
            ticker.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkConfig;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn seeded_engine(mode: Mode) -> SimulationEngine {
        let mut net = NeuralNetwork::new(NetworkConfig::default().with_seed(21)).unwrap();
        net.seed();
        let cfg = EngineConfig::default().with_seed(22).with_mode(mode);
        SimulationEngine::new(net.into_shared(), cfg).unwrap()
    }

    #[test]
    fn biological_step_reports_tick() {
        let engine = seeded_engine(Mode::BiologicalOnly);
        let mut lines = Vec::new();
        engine.step(|l: &str| lines.push(l.to_string()));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[*] t=1 "));
        assert!(!lines[0].contains("Chose"));
        assert!(engine.network().read().last_decision().is_none());
    }

    #[test]
    fn decision_step_records_choice() {
        let engine = seeded_engine(Mode::DecisionDemo);
        let line = engine.step_once();
        assert!(line.contains("[L] Chose Door") || line.contains("[C] Chose Door"));
        assert!(line.contains("| best="));

        let net = engine.network();
        let net = net.read();
        let decision = net.last_decision().unwrap();
        let chosen = net.neuron(decision.chosen.unwrap()).unwrap();
        assert!(chosen.label().unwrap().starts_with("Door "));
        assert_eq!(chosen.visits(), 1);
        let expected = if decision.success { 0.6 } else { 0.4 };
        assert!((chosen.weight() - expected).abs() < 1e-12);
    }

    #[test]
    fn greedy_demo_against_fixed_table() {
        let mut net = NeuralNetwork::new(NetworkConfig::default().with_seed(4).without_growth()).unwrap();
        net.seed();
        let cfg = EngineConfig {
            curiosity_rate: 0.0,
            ..EngineConfig::default().with_seed(1).with_mode(Mode::DecisionDemo)
        };
        let engine =
            SimulationEngine::with_scenario(net.into_shared(), cfg, DoorsScenario::with_costs([3, 7, 5]))
                .unwrap();

        for _ in 0..20 {
            let line = engine.step_once();
            assert!(line.contains("[L] Chose"));
            assert!(line.contains("| best=A |"));
            let success = line.ends_with("success=true");
            assert_eq!(line.contains("Chose Door A"), success);
        }
    }

    #[test]
    fn no_outputs_means_no_feedback() {
        let mut net = NeuralNetwork::new(NetworkConfig::default().with_seed(6).without_growth()).unwrap();
        for _ in 0..4 {
            net.add_neuron();
        }
        let engine = SimulationEngine::new(
            net.into_shared(),
            EngineConfig::default().with_seed(6).with_mode(Mode::DecisionDemo),
        )
        .unwrap();

        let before: Vec<f64> = engine.network().read().neurons().map(Neuron::weight).collect();
        let line = engine.step_once();
        assert!(line.ends_with(NO_CANDIDATES_LINE));

        let net = engine.network();
        let net = net.read();
        let after: Vec<f64> = net.neurons().map(Neuron::weight).collect();
        assert_eq!(before, after);
        let decision = net.last_decision().unwrap();
        assert_eq!(decision.chosen, None);
        assert!(!decision.success);
    }

    #[test]
    fn curiosity_rate_is_clamped() {
        let engine = seeded_engine(Mode::DecisionDemo);
        assert_eq!(engine.set_curiosity_rate(3.0).unwrap(), 1.0);
        assert_eq!(engine.curiosity_rate(), 1.0);
        assert_eq!(engine.set_curiosity_rate(-0.5).unwrap(), 0.0);
        assert!(matches!(
            engine.set_curiosity_rate(f64::NAN),
            Err(EngineError::InvalidCuriosityRate)
        ));
        assert_eq!(engine.curiosity_rate(), 0.0);

        engine.set_curiosity_rate(1.0).unwrap();
        for _ in 0..10 {
            assert!(engine.step_once().contains("[C] Chose"));
        }
    }

    #[test]
    fn mode_switch_applies_to_next_step() {
        let engine = seeded_engine(Mode::BiologicalOnly);
        assert!(!engine.step_once().contains("Chose"));
        engine.set_mode(Mode::DecisionDemo);
        assert_eq!(engine.mode(), Mode::DecisionDemo);
        assert!(engine.step_once().contains("Chose"));
    }

    #[test]
    fn shuffle_redraws_costs_in_range() {
        let engine = seeded_engine(Mode::DecisionDemo);
        for _ in 0..20 {
            engine.shuffle_scenario();
            let costs = engine.scenario_costs();
            assert_eq!(costs.keys().map(String::as_str).collect::<Vec<_>>(), ["A", "B", "C"]);
            assert!(costs.values().all(|&c| (1..=10).contains(&c)));
        }
    }

    #[test]
    fn zero_period_is_rejected() {
        let engine = seeded_engine(Mode::BiologicalOnly);
        let err = engine.start(Duration::ZERO, |_: &str| {}).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPeriod(_)));
        assert!(!engine.is_running());
        assert_eq!(engine.network().read().tick_count(), 0);
    }

    #[test]
    fn unrepresentable_period_is_rejected() {
        let engine = seeded_engine(Mode::BiologicalOnly);
        let err = engine.start(Duration::MAX, |_: &str| {}).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPeriod(_)));
        assert!(!engine.is_running());
        assert_eq!(engine.network().read().tick_count(), 0);
    }

    #[test]
    fn tracing_sink_accepts_multi_row_summaries() {
        let engine = seeded_engine(Mode::DecisionDemo);
        engine.step(TracingSink);
        let mut sink = TracingSink;
        sink.deliver("[+] N8 added\n[*] t=2 fired=0 strengthened=0 decayed=0 pruned=0");
        assert_eq!(engine.network().read().tick_count(), 1);
    }

    #[test]
    fn start_then_stop_halts_delivery() {
        let engine = seeded_engine(Mode::BiologicalOnly);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        engine
            .start_ms(5, move |_: &str| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert!(engine.is_running());

        thread::sleep(Duration::from_millis(60));
        engine.stop();
        assert!(!engine.is_running());
        let delivered = count.load(Ordering::SeqCst);
        assert!(delivered >= 1);
        assert_eq!(engine.network().read().tick_count() as usize, delivered);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), delivered);

        // Stopping twice is harmless.
        engine.stop();
    }

    #[test]
    fn restart_keeps_a_single_cadence() {
        let engine = seeded_engine(Mode::BiologicalOnly);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let c = Arc::clone(&count);
            engine
                .start_ms(20, move |_: &str| {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        thread::sleep(Duration::from_millis(200));
        engine.stop();
        // One cadence gives ~11 deliveries; two would give ~20.
        assert!(count.load(Ordering::SeqCst) <= 15);
    }

    #[test]
    fn sink_can_stop_the_engine() {
        let engine = Arc::new(seeded_engine(Mode::BiologicalOnly));
        let weak = Arc::downgrade(&engine);
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        engine
            .start_ms(2, move |_: &str| {
                if c.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                    if let Some(engine) = weak.upgrade() {
                        engine.stop();
                    }
                }
            })
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!engine.is_running());
    }

    #[test]
    fn manual_step_while_running() {
        let engine = seeded_engine(Mode::DecisionDemo);
        engine.start_ms(3, |_: &str| {}).unwrap();
        for _ in 0..20 {
            engine.step(|_: &str| {});
        }
        engine.stop();
        let net = engine.network();
        let net = net.read();
        assert!(net.tick_count() >= 20);
        for c in net.connections() {
            assert!(c.weight() >= 0.03 && c.weight() <= 1.8);
        }
    }

    #[test]
    fn shutdown_refuses_restart() {
        let engine = seeded_engine(Mode::BiologicalOnly);
        engine.start_ms(10, |_: &str| {}).unwrap();
        assert!(!engine.is_shut_down());
        engine.shutdown();
        assert!(engine.is_shut_down());
        assert!(!engine.is_running());
        assert!(matches!(
            engine.start_ms(10, |_: &str| {}),
            Err(EngineError::ShutDown)
        ));
        // Single steps still work after shutdown.
        engine.step_once();
    }

    #[test]
    fn removal_goes_through_the_same_lock() {
        let engine = seeded_engine(Mode::BiologicalOnly);
        engine.step_once();
        assert!(engine.remove_neuron(NeuronId(0)));
        assert!(!engine.remove_neuron(NeuronId(0)));
        let id = engine.add_neuron();
        assert!(engine.network().read().neuron(id).is_some());
    }

    #[test]
    fn topology_edits_while_running() {
        let engine = seeded_engine(Mode::DecisionDemo);
        engine.start_ms(1, |_: &str| {}).unwrap();

        let mut removed = Vec::new();
        for i in 0..20u32 {
            let id = engine.add_neuron();
            // Alternate between fresh neurons and the seeded core.
            let victim = if i % 2 == 0 { id } else { NeuronId(i / 2 % 4) };
            if engine.remove_neuron(victim) {
                removed.push(victim);
            }
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(10));
        engine.stop();

        let net = engine.network();
        let net = net.read();
        assert!(net.tick_count() >= 1);
        for id in &removed {
            assert!(net.neuron(*id).is_none());
        }
        for c in net.connections() {
            assert!(net.neuron(c.from()).is_some());
            assert!(net.neuron(c.to()).is_some());
            assert!(!removed.contains(&c.from()) && !removed.contains(&c.to()));
        }
    }

    #[test]
    fn same_seeds_same_story() {
        let run = || {
            let engine = seeded_engine(Mode::DecisionDemo);
            (0..60).map(|_| engine.step_once()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("bio".parse::<Mode>().unwrap(), Mode::BiologicalOnly);
        assert_eq!("Doors".parse::<Mode>().unwrap(), Mode::DecisionDemo);
        assert!("chaos".parse::<Mode>().is_err());
        assert_eq!(Mode::DecisionDemo.to_string(), "doors");
    }
}
