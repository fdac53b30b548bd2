mod poll;
mod timer;

use anyhow::{Context, Result};
use chardev_kernel::{ModuleConfig, logger};
use clap::*;
use log::LevelFilter;

/// Loads a driver module in-process and exercises it from several threads.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML module configuration
    #[arg(short, long)]
    config: Option<String>,
    /// Overrides the log level of the configuration
    #[arg(short, long)]
    log_level: Option<LevelFilter>,
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Subcommand, Debug)]
enum SubCommands {
    /// Writer threads feed the mailboxes, the main thread selects and reads.
    Poll(poll::PollArgs),
    /// Sets a period on every timer instance and prints the pending counts.
    Timer(timer::TimerArgs),
}

fn load_config(path: Option<&str>, name: &str) -> Result<ModuleConfig> {
    match path {
        Some(path) => {
            let content =
                std::fs::read_to_string(path).with_context(|| format!("read config {path}"))?;
            let config = content
                .parse()
                .with_context(|| format!("parse config {path}"))?;
            Ok(config)
        }
        None => Ok(ModuleConfig::named(name)),
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let name = match args.command {
        SubCommands::Poll(_) => "poll",
        SubCommands::Timer(_) => "timer",
    };
    let config = load_config(args.config.as_deref(), name)?;
    logger::init(args.log_level.unwrap_or(config.log_level.into()));

    match args.command {
        SubCommands::Poll(a) => poll::run(config, a),
        SubCommands::Timer(a) => timer::run(config, a),
    }
}
