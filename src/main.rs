//! flashraid - Dual-host, dual-flash redundancy controller simulator
//!
//! Runs TOML scenarios against a cycle-level model of the controller wired
//! to two in-memory SPI flashes, prints the management register map, and
//! replays the bring-up checks through the packed ports.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Run { scenario } => commands::run_scenario(&scenario),
        Commands::Regs { control } => {
            commands::print_register_map(control);
            Ok(())
        }
        Commands::Demo {
            sync_stages,
            switch_guard_cycles,
        } => commands::run_demo(sync_stages, switch_guard_cycles),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
