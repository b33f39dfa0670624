use std::error::Error;
use std::io;

use clap::{Parser, Subcommand};
use commands::{
    descs::{self, DescsArgs},
    dispatch::{self, DispatchArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "doc-ctl", about = "DNS-over-CoAP experiment description tooling")]
struct Cli {
    /// Log level, used unless RUST_LOG is set.
    #[arg(short, long, global = true, default_value = "info")]
    verbosity: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the experiment description of a preset.
    Descs(DescsArgs),
    /// Print the per-run resolver configuration and commands of a description.
    Dispatch(DispatchArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.verbosity)?;
    match cli.command {
        Command::Descs(args) => descs::run(&args),
        Command::Dispatch(args) => dispatch::run(&args),
    }
}

fn init_tracing(verbosity: &str) -> Result<(), Box<dyn Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(verbosity)?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}
