mod analysis;
mod config;
mod engine;
mod initial;
mod insect;
mod manager;
mod model;
mod observer;
mod population;
mod release;
mod sampler;
mod spatial;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Create {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        random_release: Option<u64>,
    },

    Analyze {
        #[arg(long)]
        past_len: usize,

        #[arg(long)]
        future_len: usize,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Create {
            seed,
            random_release,
        } => mgr.create_run(seed, random_release)?,
        Command::Analyze {
            past_len,
            future_len,
        } => mgr.analyze_sim(past_len, future_len)?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
