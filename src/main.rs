use std::process::{self, ExitCode};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use wait_stress::config::DEFAULT_WORKERS;
use wait_stress::fault::FaultyProcesses;
use wait_stress::{
    logging, shutdown, HarnessResult, Orchestrator, RunSummary, StressConfig, SystemProcesses,
};

/// Saturates the stop/continue/exit notification path with forked lineages
#[derive(Parser, Debug)]
#[command(name = "wait-stress")]
struct Args {
    /// Number of worker lineages to spawn
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Seconds to run before shutting the tree down (0 = until signalled)
    #[arg(short, long, default_value_t = 0)]
    duration: u64,

    /// Make killers stop once their runner no longer exists
    #[arg(long)]
    verify_target: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Fail the orchestrator spawn call with this 0-based index
    #[arg(long, hide = true)]
    fail_spawn: Option<usize>,
}

impl From<&Args> for StressConfig {
    fn from(args: &Args) -> Self {
        StressConfig::default()
            .with_workers(args.workers)
            .with_duration(Duration::from_secs(args.duration))
            .with_verify_target(args.verify_target)
            .with_fail_spawn(args.fail_spawn)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.log_level);

    match run(StressConfig::from(&args)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: StressConfig) -> HarnessResult<RunSummary> {
    shutdown::install()?;

    info!(
        "Starting wait stress test with {} lineages on {} CPUs...",
        config.workers,
        num_cpus::get()
    );
    if config.indefinite() {
        info!(
            "Running wait stress test indefinitely. To stop, use: kill {}",
            process::id()
        );
    } else {
        info!("Running wait stress test for {} seconds", config.duration.as_secs());
        shutdown::schedule(config.duration);
    }

    let processes = SystemProcesses::new(config);
    match config.fail_spawn {
        Some(index) => Orchestrator::new(FaultyProcesses::new(processes, index), config.workers).run(),
        None => Orchestrator::new(processes, config.workers).run(),
    }
}
