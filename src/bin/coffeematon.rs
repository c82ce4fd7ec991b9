//! `coffeematon`: run a coffee automaton and record its complexity trajectory.

use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use log::LevelFilter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use coffeematon::analysis::{sweep, TrajectorySummary};
use coffeematon::observability::init_logging;
use coffeematon::{
    Backend, BackendRegistry, CoffeeError, InitialState, PayloadEncoding, Resolution,
    ResolutionCatalogue, SimulationConfig, TrajectoryEngine, VariantRegistry,
};

// ═══════════════════════════════════════════════════════════════════════════════
// CLI
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(name = "coffeematon", version)]
#[command(about = "Coffee automaton simulator with compression-based complexity estimates")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Append log output to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simulate one lattice and record its complexity trajectory
    Run(RunArgs),
    /// Run to convergence for a range of lattice sizes and collect statistics
    Sweep(SweepArgs),
    /// List compression backends and whether this build provides them
    Backends,
}

#[derive(Args)]
struct SimArgs {
    /// Automaton variant (int, nonint)
    #[arg(short = 'a', long = "automaton")]
    variant: String,

    /// JSON config file; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial state (updown, circular)
    #[arg(long)]
    init: Option<String>,

    /// Requested worker threads; zero or negative means one
    #[arg(long, allow_negative_numbers = true)]
    workers: Option<i64>,

    /// Compression backend (gzip, bzip, zstd)
    #[arg(long)]
    compression: Option<String>,

    /// Payload serialization (binary, text)
    #[arg(long)]
    encoding: Option<String>,

    /// Resolution to sample, repeatable (fine, coarse_<k>)
    #[arg(long = "resolution")]
    resolutions: Vec<String>,

    /// RNG seed for a reproducible trajectory
    #[arg(long)]
    seed: Option<u64>,

    /// Upper bound on recorded rows per run
    #[arg(long)]
    max_samples: Option<usize>,

    /// Transition cap for runs that wait for convergence
    #[arg(long)]
    step_cap: Option<u64>,

    /// Mixing tolerance (absolute density per cell)
    #[arg(long)]
    mix_tolerance: Option<f64>,

    /// Directory for trajectory files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Do not write a trajectory file
    #[arg(long)]
    no_save: bool,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    sim: SimArgs,

    /// Lattice side length (defaults to the config file, then 100)
    #[arg(short = 'n')]
    n: Option<usize>,

    /// Apply exactly this many transitions instead of running until mixed
    #[arg(long)]
    steps: Option<u64>,
}

#[derive(Args)]
struct SweepArgs {
    #[command(flatten)]
    sim: SimArgs,

    /// First lattice size
    #[arg(long)]
    start: usize,

    /// Lattice size to stop before
    #[arg(long)]
    stop: usize,

    /// Increment between lattice sizes
    #[arg(long, default_value = "1")]
    step: usize,

    /// Statistics file (default: stats_<variant>_<first>_<last>.json)
    #[arg(long)]
    output: Option<PathBuf>,
}

impl SimArgs {
    /// Builds the run configuration: config file (or defaults), then flags.
    fn to_config(&self, n: Option<usize>) -> Result<SimulationConfig, CoffeeError> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)?,
            None => SimulationConfig::default(),
        };
        if let Some(n) = n {
            config.n = n;
        }
        if let Some(init) = &self.init {
            config.initial_state = init.parse::<InitialState>()?;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(compression) = &self.compression {
            config.compression = compression.parse::<Backend>()?;
        }
        if let Some(encoding) = &self.encoding {
            config.encoding = encoding.parse::<PayloadEncoding>()?;
        }
        if !self.resolutions.is_empty() {
            let entries = self
                .resolutions
                .iter()
                .map(|r| r.parse::<Resolution>())
                .collect::<Result<Vec<_>, _>>()?;
            config.resolutions = ResolutionCatalogue::new(entries)?;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(cap) = self.step_cap {
            config.step_cap = cap;
        }
        if let Some(tolerance) = self.mix_tolerance {
            config.mix_tolerance = tolerance;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if self.no_save {
            config.save = false;
        }
        config.validate()?;
        Ok(config)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Commands
// ═══════════════════════════════════════════════════════════════════════════════

fn variants() -> VariantRegistry {
    VariantRegistry::builtin().with_unavailable(
        "fluid",
        "the fluid-dynamics solver is not part of this build",
    )
}

fn run(args: RunArgs) -> Result<(), CoffeeError> {
    let config = args.sim.to_config(args.n)?;
    let backends = Arc::new(BackendRegistry::detect());
    backends.resolve(config.compression)?;
    let automaton = variants().create(&args.sim.variant, &config)?;

    let mut engine = TrajectoryEngine::new(config, automaton, backends)?;
    let started = Instant::now();
    let location = engine.run(args.steps, args.sim.max_samples)?;
    let elapsed = started.elapsed();

    let summary = TrajectorySummary::from_engine(&engine);
    println!(
        "{} {} n={} stopped at step {} ({:?}) in {:.2?} using {} worker(s)",
        "done:".green().bold(),
        summary.variant,
        summary.n,
        summary.final_step,
        summary.stop_reason,
        elapsed,
        engine.workers().effective
    );
    if let Some(mixing_time) = summary.mixing_time {
        println!("  mixing time: {}", mixing_time);
    }
    for peak in &summary.peaks {
        println!(
            "  peak {:<10} {:>8} at step {}",
            peak.resolution, peak.value, peak.step
        );
    }
    if let Some(path) = location {
        println!("  trajectory: {}", path.display().to_string().cyan());
    }
    Ok(())
}

fn run_sweep(args: SweepArgs) -> Result<(), CoffeeError> {
    if args.step == 0 {
        return Err(CoffeeError::Configuration(
            "sweep step must be positive".to_string(),
        ));
    }
    let template = args.sim.to_config(None)?;
    let backends = Arc::new(BackendRegistry::detect());
    backends.resolve(template.compression)?;

    let sizes: Vec<usize> = (args.start..args.stop).step_by(args.step).collect();
    if sizes.is_empty() {
        return Err(CoffeeError::Configuration(format!(
            "empty sweep range {}..{}",
            args.start, args.stop
        )));
    }

    let started = Instant::now();
    let stats = sweep(
        &template,
        &args.sim.variant,
        &variants(),
        backends,
        sizes,
        args.sim.max_samples,
    )?;
    log::info!("sweep finished in {:.2?}", started.elapsed());

    let path = args.output.unwrap_or_else(|| PathBuf::from(stats.file_name()));
    std::fs::write(&path, serde_json::to_string_pretty(&stats)?)?;
    println!(
        "{} {} runs written to {}",
        "done:".green().bold(),
        stats.ns.len(),
        path.display().to_string().cyan()
    );
    Ok(())
}

fn list_backends() {
    let registry = BackendRegistry::detect();
    for backend in Backend::ALL {
        let status = if registry.is_available(backend) {
            "available".green()
        } else {
            "unavailable".red()
        };
        println!("{:<6} {}", backend.as_str(), status);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    let result = init_logging(level, cli.log_file.as_deref()).and_then(|()| match cli.command {
        Command::Run(args) => run(args),
        Command::Sweep(args) => run_sweep(args),
        Command::Backends => {
            list_backends();
            Ok(())
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", format!("{}:", err.kind()).red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
