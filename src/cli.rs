//! CLI argument parsing

use clap::{Parser, Subcommand};
use flashraid_core::arbiter::DEFAULT_SWITCH_GUARD_CYCLES;
use flashraid_core::cdc::DEFAULT_SYNC_STAGES;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u8
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "flashraid")]
#[command(author, version, about = "Dual-host flash redundancy controller simulator", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a TOML scenario against a simulated board
    Run {
        /// Scenario file
        scenario: PathBuf,
    },

    /// Print the management register map
    Regs {
        /// Decode this control register value
        #[arg(long, value_parser = parse_hex_u8)]
        control: Option<u8>,
    },

    /// Run the built-in bring-up checks (basic access and host switching)
    Demo {
        /// Flops per synchronizer chain
        #[arg(long, default_value_t = DEFAULT_SYNC_STAGES)]
        sync_stages: usize,

        /// Cycles without grants after a host switch
        #[arg(long, default_value_t = DEFAULT_SWITCH_GUARD_CYCLES)]
        switch_guard_cycles: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u8() {
        assert_eq!(parse_hex_u8("0x42"), Ok(0x42));
        assert_eq!(parse_hex_u8("6"), Ok(6));
        assert!(parse_hex_u8("0x100").is_err());
    }

    #[test]
    fn test_regs_control_arg() {
        let cli = Cli::try_parse_from(["flashraid", "regs", "--control", "0x06"]).unwrap();
        assert!(matches!(cli.command, Commands::Regs { control: Some(0x06) }));
    }

    #[test]
    fn test_global_verbose() {
        let cli = Cli::try_parse_from(["flashraid", "demo", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
