//! osim: run an OS simulation from a configuration file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;

use osim::{SimError, Simulation};

/// Operating-system scheduling and resource simulator.
///
/// Reads a simulator configuration file, synthesizes processes from the
/// program metadata it references, and runs them through the configured
/// scheduler, logging every scheduling and resource event to the monitor
/// and/or a log file.
#[derive(Debug, Parser)]
#[command(name = "osim")]
struct Cli {
    /// Path to the simulator configuration file.
    config: Option<PathBuf>,

    /// Increase diagnostic verbosity (-v: debug, -vv: trace). Diagnostics
    /// go to stderr and never mix with the simulation log.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        match e.downcast_ref::<SimError>() {
            Some(sim_err) => eprintln!("Simulation error: {sim_err}"),
            None => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli
        .config
        .as_ref()
        .ok_or_else(|| anyhow!("supply a configuration file as the first argument"))?;

    let sim = Arc::new(Simulation::new(config)?);
    sim.run()?;
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        level,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
    .unwrap();
}
