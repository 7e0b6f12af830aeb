//! Command-line surface of the simulator binary.

use crate::config::Configuration;
use crate::error::Error;
use crate::simulation::{Dpws, RunOptions};
use clap::Parser;
use dpws_core::Time;
use std::fs::{create_dir_all, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Subscriber;
use tracing_subscriber::{fmt, prelude::*, Registry};

/// Runs distributed pulse-wave DDoS scenarios on a deterministic
/// discrete-event internet.
#[derive(Parser, Debug)]
#[command(name = "dpws", version)]
pub struct Args {
    /// The scenario configuration file (including file extension)
    #[arg(long = "configFile")]
    pub config_file: String,
    /// Log the parsed configuration to the console before running
    #[arg(long = "printConfiguration", default_value_t = false, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub print_configuration: bool,
    /// Log the randomized central network topology after the run
    #[arg(long = "printTopology", default_value_t = true, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true")]
    pub print_topology: bool,
    /// Interval in simulation seconds between progress reports; 0 disables
    #[arg(long = "progressLogInterval", default_value_t = 15)]
    pub progress_log_interval: u64,
    /// Total number of workers in the deployment
    #[arg(long = "workers", default_value_t = 1)]
    pub workers: u32,
    /// This process's worker rank; only the owning rank materializes an
    /// AS's traffic sources
    #[arg(long = "workerRank", default_value_t = 0)]
    pub worker_rank: u32,
    /// Directory capture files are written into
    #[arg(long = "captureDirectory", default_value = ".")]
    pub capture_directory: PathBuf,
    /// Enable logging to a file under ./logs
    #[arg(short, long)]
    pub log: bool,
    /// Enable logging to stdout
    #[arg(short, long)]
    pub stdout: bool,
}

/// Parses arguments, runs the scenario, and returns the process exit code.
pub fn run() -> i32 {
    let args = Args::parse();
    if args.log || args.stdout {
        initialize_logging(args.stdout, args.log);
    }
    if args.worker_rank >= args.workers {
        eprintln!(
            "dpws: --workerRank {} is out of range for --workers {}",
            args.worker_rank, args.workers
        );
        return 2;
    }
    match execute(&args) {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("dpws: {error}");
            1
        }
    }
}

fn execute(args: &Args) -> Result<(), Error> {
    let script_started = Instant::now();

    let config = Configuration::load(Path::new(&args.config_file))?;
    let on_primary_rank = args.worker_rank == 0;
    if args.print_configuration && on_primary_rank {
        config.print();
    }
    tracing::info!("configuration parsing done");

    let options = RunOptions {
        workers: args.workers,
        worker_rank: args.worker_rank,
        progress_interval: (args.progress_log_interval > 0)
            .then(|| Time::from_secs(args.progress_log_interval)),
        capture_directory: args.capture_directory.clone(),
        record_arrivals: false,
    };
    let mut dpws = Dpws::assemble(&config, options)?;

    if on_primary_rank {
        println!("Started simulation run. Please be patient.");
    }
    let sim_started = Instant::now();
    let summary = dpws.run()?;
    tracing::info!(events = summary.events, "simulation run done");

    if on_primary_rank {
        println!(
            "total running time of the simulation (s): {:.3}",
            sim_started.elapsed().as_secs_f64()
        );
        println!(
            "total running time of the entire script (s): {:.3}",
            script_started.elapsed().as_secs_f64()
        );
        dpws.print_outputs(args.print_topology);
    }
    Ok(())
}

/// Installs the global tracing subscriber: a pretty layer on stdout, a JSON
/// layer into a timestamped file under ./logs, or both.
fn initialize_logging(stdout: bool, file: bool) {
    let file_layer = file.then(|| {
        let main_path = "./logs";
        create_dir_all(main_path).expect("failed to create log directory");
        let file_path = format!(
            "{}/dpws-{}.log",
            main_path,
            chrono::offset::Local::now().format("%y-%m-%d_%H-%M-%S")
        );
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(file_path)
            .expect("failed to open log file")
    });

    let subscriber: Box<dyn Subscriber + Send + Sync> = match (stdout, file_layer) {
        (true, Some(file)) => Box::new(
            Registry::default()
                .with(fmt::Layer::default().json().with_writer(Arc::new(file)))
                .with(
                    fmt::Layer::default()
                        .pretty()
                        .without_time()
                        .with_file(false)
                        .with_writer(std::io::stdout),
                ),
        ),
        (true, None) => Box::new(
            Registry::default().with(
                fmt::Layer::default()
                    .pretty()
                    .without_time()
                    .with_file(false)
                    .with_writer(std::io::stdout),
            ),
        ),
        (false, Some(file)) => Box::new(
            Registry::default().with(fmt::Layer::default().json().with_writer(Arc::new(file))),
        ),
        (false, None) => Box::new(Registry::default()),
    };
    tracing::subscriber::set_global_default(subscriber)
        .expect("logging was initialized twice");
}
