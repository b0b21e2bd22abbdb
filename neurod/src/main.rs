//! neurod - background host for a neurogenesis simulation
//!
//! Runs one engine and serves a JSON-lines control protocol on
//! 127.0.0.1:9877 (override with `--addr`). Each request is one line; each
//! reply is one line.
//!
//! Config: `--config PATH`, else `<config dir>/neurogenesis/neurod.json` if
//! it exists, else defaults.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use neurogenesis::config::SimulationConfig;
use neurogenesis::engine::{LogSink, Mode, SimulationEngine};
use neurogenesis::neuron::{NeuronId, Role};
use neurogenesis::observer::{EngineAdapter, NetworkSnapshot};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod paths;

use paths::AppPaths;

const DEFAULT_ADDR: &str = "127.0.0.1:9877";
const LOG_CAPACITY: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetState,
    /// Start the cadence; `period_ms` falls back to the configured period.
    Start {
        #[serde(default)]
        period_ms: Option<u64>,
    },
    Stop,
    Step,
    SetMode { mode: String },
    SetCuriosityRate { rate: f64 },
    ShuffleScenario,
    AddNeuron,
    /// `id` is the number shown in logs: `N5` is 5.
    RemoveNeuron { id: u32 },
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    State(StateSnapshot),
    Success { message: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateSnapshot {
    running: bool,
    mode: String,
    curiosity_rate: f64,
    tick: u64,
    neuron_count: usize,
    output_count: usize,
    connection_count: usize,
    fired: usize,
    avg_weight: f64,
    door_costs: Vec<(String, u8)>,
    last_decision: Option<String>,
    #[serde(default)]
    log: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Log Ring
// ═══════════════════════════════════════════════════════════════════════════

/// Keeps the most recent summary rows for `GetState`.
#[derive(Debug, Clone, Default)]
struct LogRing {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogRing {
    fn push_rows(&self, text: &str) {
        let mut lines = self.lines.lock();
        for row in text.lines() {
            if lines.len() == LOG_CAPACITY {
                lines.pop_front();
            }
            lines.push_back(row.to_string());
        }
    }

    fn recent(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }
}

impl LogSink for LogRing {
    fn deliver(&mut self, line: &str) {
        self.push_rows(line);
        for row in line.lines() {
            info!(target: "neurod::sim", "{row}");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Daemon State
// ═══════════════════════════════════════════════════════════════════════════

/// The engine synchronizes itself, so the state is shared without an outer lock.
struct DaemonState {
    engine: SimulationEngine,
    log: LogRing,
    period_ms: u64,
}

impl DaemonState {
    fn new(cfg: SimulationConfig) -> Result<Self, neurogenesis::error::EngineError> {
        let engine = cfg.build()?;
        Ok(Self {
            engine,
            log: LogRing::default(),
            period_ms: cfg.engine.period_ms,
        })
    }

    fn snapshot(&self) -> StateSnapshot {
        let snap = EngineAdapter::new(&self.engine).snapshot();
        let net = &snap.network;
        StateSnapshot {
            running: snap.running,
            mode: snap.mode.to_string(),
            curiosity_rate: snap.curiosity_rate,
            tick: net.tick,
            neuron_count: net.neurons.len(),
            output_count: net.neurons.iter().filter(|n| n.role == Role::Output).count(),
            connection_count: net.connections.len(),
            fired: net.fired_count(),
            avg_weight: net.avg_weight(),
            door_costs: snap.door_costs.into_iter().collect(),
            last_decision: describe_decision(net),
            log: self.log.recent(),
        }
    }

    fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetState => Response::State(self.snapshot()),
            Request::Start { period_ms } => {
                let period_ms = period_ms.unwrap_or(self.period_ms);
                match self.engine.start_ms(period_ms, self.log.clone()) {
                    Ok(()) => success(format!("Started ({period_ms} ms)")),
                    Err(e) => failure(e),
                }
            }
            Request::Stop => {
                self.engine.stop();
                success("Stopped")
            }
            Request::Step => {
                self.engine.step(self.log.clone());
                success("Stepped")
            }
            Request::SetMode { mode } => match mode.parse::<Mode>() {
                Ok(mode) => {
                    self.engine.set_mode(mode);
                    success(format!("Mode set to {mode}"))
                }
                Err(e) => failure(e),
            },
            Request::SetCuriosityRate { rate } => match self.engine.set_curiosity_rate(rate) {
                Ok(applied) => success(format!("Curiosity rate set to {applied:.2}")),
                Err(e) => failure(e),
            },
            Request::ShuffleScenario => {
                self.engine.shuffle_scenario();
                let costs = self
                    .engine
                    .scenario_costs()
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                success(format!("Doors shuffled: {costs}"))
            }
            Request::AddNeuron => {
                let id = self.engine.add_neuron();
                self.log.push_rows(&format!("[+] {id} added"));
                success(format!("{id} added"))
            }
            Request::RemoveNeuron { id } => {
                let Some(index) = id.checked_sub(1) else {
                    return failure("neuron ids start at 1");
                };
                let id = NeuronId(index);
                if self.engine.remove_neuron(id) {
                    self.log.push_rows(&format!("[-] {id} removed"));
                    success(format!("{id} removed"))
                } else {
                    failure(format!("{id} does not exist"))
                }
            }
            Request::Shutdown => {
                self.engine.shutdown();
                success("Shutting down")
            }
        }
    }
}

fn success(message: impl Into<String>) -> Response {
    Response::Success {
        message: message.into(),
    }
}

fn failure(message: impl ToString) -> Response {
    let message = message.to_string();
    warn!("request rejected: {message}");
    Response::Error { message }
}

fn describe_decision(net: &NetworkSnapshot) -> Option<String> {
    let decision = net.last_decision?;
    let chosen = decision
        .chosen
        .map(|id| {
            net.neurons
                .iter()
                .find(|n| n.id == id)
                .and_then(|n| n.label.clone())
                .unwrap_or_else(|| id.to_string())
        })
        .unwrap_or_else(|| "-".to_string());
    Some(format!(
        "{} {} success={}",
        decision.kind.tag(),
        chosen,
        decision.success
    ))
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

/// Run a request off the async workers: `Step` ticks the network and
/// `Start`/`Stop`/`Shutdown` may join the ticker thread.
async fn dispatch(
    state: Arc<DaemonState>,
    request: Request,
) -> Result<Response, tokio::task::JoinError> {
    tokio::task::spawn_blocking(move || state.handle(request)).await
}

async fn handle_client(
    stream: TcpStream,
    state: Arc<DaemonState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let shutting_down = matches!(request, Request::Shutdown);
                let response = dispatch(Arc::clone(&state), request).await?;
                if shutting_down {
                    info!("Shutdown requested");
                    tokio::spawn(async {
                        // Give the response a moment to flush before exiting.
                        time::sleep(Duration::from_millis(50)).await;
                        std::process::exit(0);
                    });
                }
                response
            }
            Err(e) => Response::Error {
                message: format!("Invalid request: {e}"),
            },
        };

        writer
            .write_all(serde_json::to_string(&response)?.as_bytes())
            .await?;
        writer.write_all(b"\n").await?;
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

struct Args {
    addr: String,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        addr: DEFAULT_ADDR.to_string(),
        config: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(flag) = it.next() {
        let value = it.next().ok_or_else(|| format!("{flag} needs a value"))?;
        match flag.as_str() {
            "--addr" => args.addr = value,
            "--config" => args.config = Some(PathBuf::from(value)),
            other => return Err(format!("Unknown option: {other}")),
        }
    }
    Ok(args)
}

fn load_config(explicit: Option<PathBuf>) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    if let Some(path) = explicit {
        info!("Config file: {:?}", path);
        return Ok(SimulationConfig::load(path)?);
    }
    match AppPaths::new() {
        Ok(paths) if paths.config_file().exists() => {
            info!("Config file: {:?}", paths.config_file());
            Ok(SimulationConfig::load(paths.config_file())?)
        }
        Ok(_) => {
            info!("No config file; using defaults");
            Ok(SimulationConfig::default())
        }
        Err(e) => {
            warn!("{e}; using defaults");
            Ok(SimulationConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!("Usage: neurod [--addr host:port] [--config PATH]");
            std::process::exit(2);
        }
    };

    let cfg = load_config(args.config)?;
    let state = Arc::new(DaemonState::new(cfg)?);

    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                state.engine.shutdown();
                info!("Ctrl-C: simulation stopped");
                std::process::exit(0);
            }
        });
    }

    let listener = TcpListener::bind(&args.addr).await?;
    info!("neurod listening on {}", args.addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}
