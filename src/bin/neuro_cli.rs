//! CLI client for the `neurod` daemon.
//!
//! Examples:
//!   neuro-cli status
//!   neuro-cli start 80
//!   neuro-cli mode doors
//!   neuro-cli curiosity 0.1
//!   neuro-cli remove 5
//!
//! By default it talks to 127.0.0.1:9877; override with `--addr host:port`.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetState,
    Start { period_ms: Option<u64> },
    Stop,
    Step,
    SetMode { mode: String },
    SetCuriosityRate { rate: f64 },
    ShuffleScenario,
    AddNeuron,
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

fn usage() -> ! {
    eprintln!("neuro-cli (talks to neurod @ 127.0.0.1:9877 by default)");
    eprintln!("Usage: neuro-cli [--addr host:port] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  status                      Show daemon state");
    eprintln!("  log                         Show the recent summary lines");
    eprintln!("  start [period_ms] | stop    Control the cadence");
    eprintln!("  step                        Run one iteration");
    eprintln!("  mode <bio|doors>            Switch mode");
    eprintln!("  curiosity <0..1>            Set the exploration rate");
    eprintln!("  shuffle                     Redraw door costs");
    eprintln!("  add | remove <n>            Add a neuron / remove neuron Nn");
    eprintln!("  shutdown                    Stop and exit daemon");
    process::exit(1);
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let mut addr = "127.0.0.1:9877".to_string();
    if args.len() >= 2 && args[0] == "--addr" {
        addr = args[1].clone();
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }

    (addr, args)
}

fn send_request(addr: &str, req: &Request) -> Result<Response, String> {
    let mut stream = TcpStream::connect(addr).map_err(|e| format!("connect: {e}"))?;
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .map_err(|e| format!("set_read_timeout: {e}"))?;
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| format!("clone: {e}"))?);

    let line = serde_json::to_string(req).map_err(|e| format!("serialize: {e}"))?;
    stream
        .write_all(line.as_bytes())
        .and_then(|_| stream.write_all(b"\n"))
        .map_err(|e| format!("send: {e}"))?;

    let mut resp_line = String::new();
    reader
        .read_line(&mut resp_line)
        .map_err(|e| format!("recv: {e}"))?;
    serde_json::from_str(&resp_line).map_err(|e| format!("parse response: {e}"))
}

fn print_state(s: &StateSnapshot) {
    println!(
        "mode={:<5} running={} curiosity={:.2} tick={}",
        s.mode, s.running, s.curiosity_rate, s.tick,
    );
    println!(
        "network: neurons={} outputs={} synapses={} fired={} avg_w={:.3}",
        s.neuron_count, s.output_count, s.connection_count, s.fired, s.avg_weight,
    );
    let doors = s
        .door_costs
        .iter()
        .map(|(label, cost)| format!("{label}={cost}"))
        .collect::<Vec<_>>()
        .join(" ");
    println!(
        "doors: {doors}  last={}",
        s.last_decision.as_deref().unwrap_or("-")
    );
}

fn main() {
    let (addr, args) = parse_args();
    let cmd = &args[0];
    let mut show_log = false;

    let make_error = |msg: &str| -> ! {
        eprintln!("{}", msg);
        process::exit(1);
    };

    let req = match cmd.as_str() {
        "status" => Request::GetState,
        "log" => {
            show_log = true;
            Request::GetState
        }
        "start" => {
            let period_ms = args.get(1).map(|raw| {
                raw.parse()
                    .unwrap_or_else(|_| make_error("period must be a number of milliseconds"))
            });
            Request::Start { period_ms }
        }
        "stop" => Request::Stop,
        "step" => Request::Step,
        "mode" => {
            if args.len() < 2 {
                usage();
            }
            Request::SetMode {
                mode: args[1].clone(),
            }
        }
        "curiosity" => {
            if args.len() < 2 {
                usage();
            }
            let rate: f64 = args[1]
                .parse()
                .unwrap_or_else(|_| make_error("curiosity must be a number in [0, 1]"));
            Request::SetCuriosityRate { rate }
        }
        "shuffle" => Request::ShuffleScenario,
        "add" => Request::AddNeuron,
        "remove" => {
            if args.len() < 2 {
                usage();
            }
            let raw = args[1].trim_start_matches(|c: char| c == 'N' || c == 'n');
            let id: u32 = raw
                .parse()
                .unwrap_or_else(|_| make_error("remove expects a neuron number, e.g. 5 or N5"));
            Request::RemoveNeuron { id }
        }
        "shutdown" => Request::Shutdown,
        _ => usage(),
    };

    match send_request(&addr, &req) {
        Ok(Response::State(s)) if show_log => {
            for line in &s.log {
                println!("{line}");
            }
        }
        Ok(Response::State(s)) => print_state(&s),
        Ok(Response::Success { message }) => println!("{message}"),
        Ok(Response::Error { message }) => {
            eprintln!("Error: {message}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed: {e}");
            process::exit(1);
        }
    }
}
