//! Address ranges

use super::map::ByteLane;
use crate::error::{Error, Result};

/// Number of address ranges the controller carries
pub const RANGE_COUNT: usize = 1;

/// Host addresses are 24 bits wide
pub const ADDRESS_MASK: u32 = 0x00FF_FFFF;

/// An inclusive address window gating redundant routing
///
/// The register file accepts byte writes in any order, so a range may
/// transiently hold `start > end`. Such a range is empty rather than
/// invalid: it matches no address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressRange {
    /// First address inside the range
    pub start: u32,
    /// Last address inside the range
    pub end: u32,
    /// Whether the range participates in routing
    pub enabled: bool,
}

impl AddressRange {
    /// The reset value: `{0, 0}`, disabled
    pub const fn disabled() -> Self {
        Self {
            start: 0,
            end: 0,
            enabled: false,
        }
    }

    /// Create an enabled range, checking its bounds
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > ADDRESS_MASK || end > ADDRESS_MASK {
            return Err(Error::AddressOutOfBounds);
        }
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            enabled: true,
        })
    }

    /// Whether `address` falls inside an enabled range
    pub const fn contains(&self, address: u32) -> bool {
        let address = address & ADDRESS_MASK;
        self.enabled && self.start <= address && address <= self.end
    }

    /// Whether the bounds are inverted
    pub const fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Read one byte of the start address
    pub const fn start_byte(&self, lane: ByteLane) -> u8 {
        lane.extract(self.start)
    }

    /// Read one byte of the end address
    pub const fn end_byte(&self, lane: ByteLane) -> u8 {
        lane.extract(self.end)
    }

    /// Replace one byte of the start address
    pub fn set_start_byte(&mut self, lane: ByteLane, value: u8) {
        self.start = lane.insert(self.start, value);
    }

    /// Replace one byte of the end address
    pub fn set_end_byte(&mut self, lane: ByteLane, value: u8) {
        self.end = lane.insert(self.end, value);
    }
}
