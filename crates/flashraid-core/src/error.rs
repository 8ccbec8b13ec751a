//! Error types for flashraid-core
//!
//! The controller itself never fails: unmapped register accesses, unknown
//! management opcodes and ungranted hosts are all silently ignored. The
//! errors below belong to the surrounding API (building configurations,
//! driving the model from a host-side SPI master, the flash model).

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Configuration errors
    /// Range start lies above range end
    InvalidRange {
        /// Programmed start address
        start: u32,
        /// Programmed end address
        end: u32,
    },
    /// Address does not fit in 24 bits
    AddressOutOfBounds,
    /// Range index beyond the number of ranges the controller carries
    NoSuchRange(usize),
    /// Controller configuration is out of bounds
    InvalidConfig,

    // SPI errors
    /// Opcode is not supported by the flash model
    OpcodeNotSupported,
    /// Flash write attempted without the write enable latch set
    WriteProtected,
    /// Host transfer was not granted by the arbiter
    NotGranted,
    /// Operation timed out
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange { start, end } => write!(
                f,
                "invalid address range: start 0x{:06X} is above end 0x{:06X}",
                start, end
            ),
            Self::AddressOutOfBounds => write!(f, "address does not fit in 24 bits"),
            Self::NoSuchRange(index) => write!(f, "no address range with index {}", index),
            Self::InvalidConfig => write!(f, "invalid controller configuration"),
            Self::OpcodeNotSupported => write!(f, "SPI opcode not supported"),
            Self::WriteProtected => write!(f, "flash write enable latch not set"),
            Self::NotGranted => write!(f, "host access not granted"),
            Self::Timeout => write!(f, "operation timed out"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
