use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::{info, warn};
use worldbus_core::{CycleOrchestrator, DefaultArrayAdapter, WorldAdapter};
use worldbus_timeseries::{TimeSeriesConfig, TimeSeriesWorld};

#[derive(Parser, Debug)]
#[command(
    name = "worldbus",
    version,
    about = "Drive WorldBus adapters from the command line"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play back a time-series archive through a runner agent.
    Play {
        /// JSON archive with `data`, `ids`, `startdate` and `enddate`.
        #[arg(long, env = "WORLDBUS_DATASET")]
        dataset: Option<PathBuf>,
        /// JSON `TimeSeriesConfig`; flags given on the command line win.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of world steps to run.
        #[arg(long, default_value_t = 10)]
        ticks: u64,
        /// Shuffle the order of presentation within each pass.
        #[arg(long, conflicts_with = "no_shuffle")]
        shuffle: bool,
        /// Present time offsets in order.
        #[arg(long)]
        no_shuffle: bool,
        /// Seed for the shuffle permutation.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Tick the built-in array adapter and report its buffers.
    Demo {
        /// Number of ticks to run.
        #[arg(long, default_value_t = 5)]
        ticks: u64,
        /// Adapter options as a JSON object, e.g. '{"rng_seed": 7}'.
        #[arg(long)]
        options: Option<String>,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Play {
            dataset,
            config,
            ticks,
            shuffle,
            no_shuffle,
            seed,
        } => {
            let shuffle = match (shuffle, no_shuffle) {
                (true, _) => Some(true),
                (false, true) => Some(false),
                (false, false) => None,
            };
            play(dataset, config, ticks, shuffle, seed)
        }
        Command::Demo { ticks, options } => demo(ticks, options.as_deref()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn play(
    dataset: Option<PathBuf>,
    config_path: Option<PathBuf>,
    ticks: u64,
    shuffle: Option<bool>,
    seed: Option<u64>,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => TimeSeriesConfig::from_path(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => TimeSeriesConfig::default(),
    };
    if let Some(dataset) = dataset {
        config.dataset = Some(dataset);
    }
    if let Some(shuffle) = shuffle {
        config.shuffle = shuffle;
    }
    if seed.is_some() {
        config.rng_seed = seed;
    }
    if config.dataset.is_none() {
        bail!("no dataset given; pass --dataset or set `dataset` in the config file");
    }

    let mut world = TimeSeriesWorld::from_config(&config).context("failed to build world")?;
    let runner = world.spawn_runner().context("failed to spawn runner")?;
    info!(ids = world.ids().len(), ticks, shuffle = config.shuffle, "starting playback");

    for _ in 0..ticks {
        let summary = world.step().context("world step failed")?;
        let Some(agent) = world.agent(runner) else {
            warn!(step = summary.step, "runner no longer attached");
            break;
        };
        let sources = agent.adapter().channels().all_sources();
        let (mean, undefined) = summarize(&sources);
        info!(
            step = summary.step,
            agents = summary.ticked,
            mean,
            undefined,
            "step complete"
        );
    }
    Ok(())
}

fn demo(ticks: u64, options: Option<&str>) -> Result<()> {
    let options = match options {
        Some(raw) => match serde_json::from_str::<Value>(raw).context("invalid --options JSON")? {
            Value::Object(map) => map,
            other => bail!("--options must be a JSON object, got {other}"),
        },
        None => Map::new(),
    };
    let adapter = DefaultArrayAdapter::new(options).context("failed to build demo adapter")?;
    for (key, value) in adapter.config().extras() {
        warn!(key = key.as_str(), %value, "ignoring unknown adapter option");
    }
    let mut cycle = CycleOrchestrator::new(adapter);
    cycle.reset().context("failed to initialize demo adapter")?;

    for _ in 0..ticks {
        let report = cycle.tick().context("demo tick failed")?;
        let channels = cycle.adapter().channels();
        let vision = channels
            .get_source_group("vision", None)
            .context("vision group missing")?;
        let (mean, _) = summarize(vision.as_slice().unwrap_or_default());
        let test = channels.get_source("test").context("test source missing")?;
        info!(
            tick = report.tick.0,
            kind = report.kind,
            test,
            vision_mean = mean,
            feedback = ?channels.all_feedback(),
            "tick complete"
        );
    }
    let sources = cycle.adapter().channels().available_sources();
    info!(sources = sources.len(), "demo finished");
    Ok(())
}

fn summarize(values: &[f64]) -> (f64, usize) {
    let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let undefined = values.len() - defined.len();
    if defined.is_empty() {
        return (f64::NAN, undefined);
    }
    (defined.iter().sum::<f64>() / defined.len() as f64, undefined)
}
