use std::error::Error;
use std::process;
use std::thread;
use std::time::Duration;

use neurogenesis::config::SimulationConfig;
use neurogenesis::engine::{Mode, TracingSink};
use neurogenesis::observer::EngineAdapter;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (cmd, rest) = match args.split_first() {
        Some((cmd, rest)) => (cmd.as_str(), rest),
        None => ("run", &[][..]),
    };

    if matches!(cmd, "--help" | "-h" | "help") {
        print_help();
        return Ok(());
    }

    let opts = match Options::parse(rest) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("{msg}");
            print_help();
            process::exit(2);
        }
    };

    match cmd {
        "run" => run(&opts),
        "live" => live(&opts),
        "snapshot" => snapshot(&opts),
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            process::exit(2);
        }
    }
}

fn print_help() {
    println!("neurogenesis (self-organizing spiking network)");
    println!("usage:");
    println!("  neurogenesis run      [--ticks N] [options]   step N times, print every summary");
    println!("  neurogenesis live     [--period MS] [--seconds S] [options]");
    println!("  neurogenesis snapshot [--ticks N] [options]   JSON state after N steps");
    println!("  neurogenesis help");
    println!();
    println!("options:");
    println!("  --config PATH       JSON config with `network` and `engine` sections");
    println!("  --seed S            seed both random streams");
    println!("  --mode bio|doors    biological-only or decision-demo");
    println!("  --curiosity R       exploration probability in [0, 1]");
    println!();
    println!("RUST_LOG controls log verbosity (default: info).");
}

#[derive(Debug, Default)]
struct Options {
    config: Option<String>,
    ticks: Option<u64>,
    seed: Option<u64>,
    mode: Option<Mode>,
    curiosity: Option<f64>,
    period_ms: Option<u64>,
    seconds: Option<u64>,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut opts = Options::default();
        let mut it = args.iter();
        while let Some(flag) = it.next() {
            let mut value = || {
                it.next()
                    .cloned()
                    .ok_or_else(|| format!("{flag} needs a value"))
            };
            match flag.as_str() {
                "--config" => opts.config = Some(value()?),
                "--ticks" => opts.ticks = Some(parse_num(flag, &value()?)?),
                "--seed" => opts.seed = Some(parse_num(flag, &value()?)?),
                "--mode" => opts.mode = Some(value()?.parse()?),
                "--curiosity" => opts.curiosity = Some(parse_num(flag, &value()?)?),
                "--period" => opts.period_ms = Some(parse_num(flag, &value()?)?),
                "--seconds" => opts.seconds = Some(parse_num(flag, &value()?)?),
                other => return Err(format!("Unknown option: {other}")),
            }
        }
        Ok(opts)
    }

    fn simulation_config(&self) -> Result<SimulationConfig, Box<dyn Error>> {
        let mut cfg = match &self.config {
            Some(path) => SimulationConfig::load(path)?,
            None => SimulationConfig::default(),
        };
        if let Some(seed) = self.seed {
            cfg = cfg.with_seed(seed);
        }
        if let Some(mode) = self.mode {
            cfg.engine.mode = mode;
        }
        if let Some(rate) = self.curiosity {
            cfg.engine.curiosity_rate = rate;
        }
        if let Some(ms) = self.period_ms {
            cfg.engine.period_ms = ms;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_num<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("{flag} expects a number, got '{raw}'"))
}

fn run(opts: &Options) -> Result<(), Box<dyn Error>> {
    let engine = opts.simulation_config()?.build()?;
    let ticks = opts.ticks.unwrap_or(100);
    info!(ticks, mode = %engine.mode(), "running headless");

    for _ in 0..ticks {
        engine.step(|line: &str| println!("{line}"));
    }

    let net = engine.network();
    let net = net.read();
    println!(
        "done: neurons={} synapses={} ticks={}",
        net.neuron_count(),
        net.connection_count(),
        net.tick_count()
    );
    Ok(())
}

fn live(opts: &Options) -> Result<(), Box<dyn Error>> {
    let cfg = opts.simulation_config()?;
    let engine = cfg.build()?;
    let seconds = opts.seconds.unwrap_or(5);
    info!(period_ms = cfg.engine.period_ms, seconds, "running live");

    engine.start_ms(cfg.engine.period_ms, TracingSink)?;
    thread::sleep(Duration::from_secs(seconds));
    engine.stop();

    let net = engine.network();
    let net = net.read();
    println!(
        "stopped: neurons={} synapses={} ticks={}",
        net.neuron_count(),
        net.connection_count(),
        net.tick_count()
    );
    Ok(())
}

fn snapshot(opts: &Options) -> Result<(), Box<dyn Error>> {
    let engine = opts.simulation_config()?.build()?;
    for _ in 0..opts.ticks.unwrap_or(20) {
        engine.step_once();
    }
    let snap = EngineAdapter::new(&engine).snapshot();
    println!("{}", serde_json::to_string_pretty(&snap)?);
    Ok(())
}
