//! TOML scenario files
//!
//! ```toml
//! [controller]
//! sync_stages = 2
//! switch_guard_cycles = 8
//! reset_cycles = 10
//!
//! [board]
//! half_period_cycles = 25
//!
//! [flash]
//! size = "1 MiB"
//!
//! [registers]
//! control = 0x06
//! [[registers.range]]
//! index = 0
//! start = 0x000000
//! end = "0x7FFFFF"
//!
//! [[step]]
//! kind = "host-write"
//! host = "main"
//! address = 0x001000
//! data = [0xDE, 0xAD]
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use flashraid_core::arbiter::DEFAULT_SWITCH_GUARD_CYCLES;
use flashraid_core::cdc::DEFAULT_SYNC_STAGES;
use flashraid_core::controller::ControllerConfig;
use flashraid_core::pins::HostId;
use flashraid_core::regs::{AddressRange, RANGE_COUNT};
use flashraid_dummy::DummyConfig;

use crate::board::{BoardConfig, DEFAULT_HALF_PERIOD_CYCLES};
use crate::error::{Result, SimError};

/// Recommended reset length in cycles
pub const DEFAULT_RESET_CYCLES: u32 = 10;

/// Whole scenario file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Controller parameters
    pub controller: ControllerSection,
    /// Host and management driver timing
    pub board: BoardSection,
    /// Flash model parameters
    pub flash: FlashSection,
    /// Registers programmed before the first step
    pub registers: RegisterSection,
    /// Steps, run in order
    #[serde(rename = "step")]
    pub steps: Vec<Step>,
}

/// `[controller]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerSection {
    /// Flops per synchronizer chain
    pub sync_stages: usize,
    /// Cycles without grants after a host switch
    pub switch_guard_cycles: u16,
    /// Cycles reset is held at the start
    pub reset_cycles: u32,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            sync_stages: DEFAULT_SYNC_STAGES,
            switch_guard_cycles: DEFAULT_SWITCH_GUARD_CYCLES,
            reset_cycles: DEFAULT_RESET_CYCLES,
        }
    }
}

/// `[board]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardSection {
    /// SPI half period in data-plane cycles
    pub half_period_cycles: u32,
    /// Record chip-select levels and check for glitches
    pub trace: bool,
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            half_period_cycles: DEFAULT_HALF_PERIOD_CYCLES,
            trace: false,
        }
    }
}

/// `[flash]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlashSection {
    /// Capacity of each flash, e.g. `"1 MiB"` or `0x100000`
    #[serde(deserialize_with = "deserialize_size")]
    pub size: u32,
    /// Replace both flashes by fixed MISO levels
    pub miso_pattern: Option<[bool; 2]>,
}

impl Default for FlashSection {
    fn default() -> Self {
        Self {
            size: 1024 * 1024,
            miso_pattern: None,
        }
    }
}

/// `[registers]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegisterSection {
    /// Control register value
    pub control: Option<u8>,
    /// Address ranges
    pub range: Vec<RangeSection>,
}

/// `[[registers.range]]`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeSection {
    /// Range index (0 or 1)
    pub index: usize,
    /// First address
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub start: u32,
    /// Last address (inclusive)
    #[serde(deserialize_with = "deserialize_hex_u32")]
    pub end: u32,
}

/// One scenario step
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Step {
    /// Program bytes through a host port
    HostWrite {
        /// Issuing host
        host: HostId,
        /// Flash address
        #[serde(deserialize_with = "deserialize_hex_u32")]
        address: u32,
        /// Bytes to program
        data: Vec<u8>,
    },
    /// Read bytes through a host port
    HostRead {
        /// Issuing host
        host: HostId,
        /// Flash address
        #[serde(deserialize_with = "deserialize_hex_u32")]
        address: u32,
        /// Number of bytes
        len: usize,
        /// Expected bytes
        #[serde(default)]
        expect: Option<Vec<u8>>,
    },
    /// Erase the 4 KiB sector holding an address through a host port
    HostErase {
        /// Issuing host
        host: HostId,
        /// Flash address
        #[serde(deserialize_with = "deserialize_hex_u32")]
        address: u32,
    },
    /// Hold a host select asserted or released without clocking
    HostSelect {
        /// Host
        host: HostId,
        /// Asserted
        selected: bool,
    },
    /// Check which flash selects are asserted
    ExpectSelect {
        /// Expected select state (flash0, flash1)
        selected: [bool; 2],
    },
    /// Write a register over the management channel
    MgmtWrite {
        /// Register address
        address: u8,
        /// Value
        value: u8,
    },
    /// Read a register over the management channel
    MgmtRead {
        /// Register address
        address: u8,
        /// Expected value
        #[serde(default)]
        expect: Option<u8>,
    },
    /// Let the data plane run
    Wait {
        /// Cycles
        cycles: u64,
    },
    /// Pulse reset
    Reset {
        /// Cycles held in reset
        #[serde(default = "default_reset_cycles")]
        cycles: u32,
    },
    /// Check flash contents directly
    ExpectFlash {
        /// Flash index (0 or 1)
        flash: usize,
        /// Flash address
        #[serde(deserialize_with = "deserialize_hex_u32")]
        address: u32,
        /// Expected bytes
        data: Vec<u8>,
    },
}

fn default_reset_cycles() -> u32 {
    DEFAULT_RESET_CYCLES
}

impl Step {
    /// Kind name as written in scenario files
    pub fn kind(&self) -> &'static str {
        match self {
            Step::HostWrite { .. } => "host-write",
            Step::HostRead { .. } => "host-read",
            Step::HostErase { .. } => "host-erase",
            Step::HostSelect { .. } => "host-select",
            Step::ExpectSelect { .. } => "expect-select",
            Step::MgmtWrite { .. } => "mgmt-write",
            Step::MgmtRead { .. } => "mgmt-read",
            Step::Wait { .. } => "wait",
            Step::Reset { .. } => "reset",
            Step::ExpectFlash { .. } => "expect-flash",
        }
    }
}

impl SimConfig {
    /// Load a scenario from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a scenario from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.controller_config().validate()?;

        for range in &self.registers.range {
            if range.index >= RANGE_COUNT {
                return Err(flashraid_core::Error::NoSuchRange(range.index).into());
            }
            AddressRange::new(range.start, range.end)?;
        }

        for (index, step) in self.steps.iter().enumerate() {
            if let Step::ExpectFlash { flash, .. } = step {
                if *flash > 1 {
                    return Err(SimError::InvalidConfig(format!(
                        "step {}: flash index {} out of range",
                        index, flash
                    )));
                }
            }
        }
        Ok(())
    }

    /// Controller parameters
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            sync_stages: self.controller.sync_stages,
            switch_guard_cycles: self.controller.switch_guard_cycles,
        }
    }

    /// Board parameters
    pub fn board_config(&self) -> BoardConfig {
        BoardConfig {
            controller: self.controller_config(),
            flash: DummyConfig::with_size(self.flash.size as usize),
            half_period_cycles: self.board.half_period_cycles,
            miso_pattern: self.flash.miso_pattern,
            trace: self.board.trace,
        }
    }
}

/// Deserialize a u32 that can be hex (0x...) or decimal
fn deserialize_hex_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    // Try to deserialize as a number first, then as a string
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom),
    }
}

/// Deserialize a size that can be a number or a string like "16 MiB"
fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrInt {
        Int(u32),
        Str(String),
    }

    match SizeOrInt::deserialize(deserializer)? {
        SizeOrInt::Int(n) => Ok(n),
        SizeOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "16 MiB" or "4096"
pub fn parse_size(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x7FFFFF"), Ok(0x7FFFFF));
        assert_eq!(parse_number("4096"), Ok(4096));
        assert!(parse_number("0xZZ").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1 MiB"), Ok(1024 * 1024));
        assert_eq!(parse_size("64KiB"), Ok(64 * 1024));
        assert_eq!(parse_size("0x1000"), Ok(0x1000));
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = SimConfig::from_toml_str("").unwrap();
        assert_eq!(config.controller.sync_stages, 2);
        assert_eq!(config.controller.switch_guard_cycles, 8);
        assert_eq!(config.controller.reset_cycles, 10);
        assert_eq!(config.board.half_period_cycles, 25);
        assert_eq!(config.flash.size, 1024 * 1024);
        assert!(config.steps.is_empty());
    }

    #[test]
    fn test_full_scenario() {
        let config = SimConfig::from_toml_str(
            r#"
            [flash]
            size = "64 KiB"

            [registers]
            control = 0x06
            [[registers.range]]
            index = 0
            start = 0
            end = "0x7FFFFF"

            [[step]]
            kind = "host-write"
            host = "main"
            address = "0x1000"
            data = [0xDE, 0xAD]

            [[step]]
            kind = "mgmt-read"
            address = 0x0C
            expect = 0x06

            [[step]]
            kind = "reset"

            [[step]]
            kind = "expect-flash"
            flash = 1
            address = 0x1000
            data = [0xDE, 0xAD]
            "#,
        )
        .unwrap();

        assert_eq!(config.flash.size, 64 * 1024);
        assert_eq!(config.registers.control, Some(0x06));
        assert_eq!(config.registers.range[0].end, 0x7FFFFF);
        assert_eq!(config.steps.len(), 4);
        assert!(matches!(
            config.steps[0],
            Step::HostWrite {
                host: HostId::Main,
                address: 0x1000,
                ..
            }
        ));
        assert!(matches!(config.steps[2], Step::Reset { cycles: 10 }));
        assert_eq!(config.steps[3].kind(), "expect-flash");
    }

    #[test]
    fn test_rejects_bad_range() {
        let err = SimConfig::from_toml_str(
            r#"
            [[registers.range]]
            index = 0
            start = 0x2000
            end = 0x1000
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SimError::Core(flashraid_core::Error::InvalidRange { start: 0x2000, end: 0x1000 })
        ));
    }

    #[test]
    fn test_rejects_second_range() {
        let err = SimConfig::from_toml_str(
            r#"
            [[registers.range]]
            index = 1
            start = 0
            end = 1
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SimError::Core(flashraid_core::Error::NoSuchRange(1))));
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(SimConfig::from_toml_str("[controller]\nstages = 3\n").is_err());
    }

    #[test]
    fn test_rejects_bad_sync_stages() {
        let err = SimConfig::from_toml_str("[controller]\nsync_stages = 7\n").unwrap_err();
        assert!(matches!(err, SimError::Core(flashraid_core::Error::InvalidConfig)));
    }
}
