//! Management register address map
//!
//! | Address | Field |
//! |---|---|
//! | 0x00-0x02 | Range0 start (H, M, L) |
//! | 0x03-0x05 | Range0 end (H, M, L) |
//! | 0x06-0x0B | unmapped |
//! | 0x0C | Control register |

use super::range::RANGE_COUNT;

/// Bytes occupied by one range (start then end, three bytes each)
pub const RANGE_BLOCK_LEN: u8 = 6;

/// Address of the control register
pub const CONTROL_ADDR: u8 = 0x0C;

/// Byte position inside a 24-bit address, big-endian on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteLane {
    /// Bits 23..16
    High,
    /// Bits 15..8
    Mid,
    /// Bits 7..0
    Low,
}

impl ByteLane {
    /// Lanes in register order
    pub const ALL: [ByteLane; 3] = [ByteLane::High, ByteLane::Mid, ByteLane::Low];

    const fn shift(self) -> u32 {
        match self {
            Self::High => 16,
            Self::Mid => 8,
            Self::Low => 0,
        }
    }

    const fn from_offset(offset: u8) -> Self {
        match offset {
            0 => Self::High,
            1 => Self::Mid,
            _ => Self::Low,
        }
    }

    const fn offset(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Mid => 1,
            Self::Low => 2,
        }
    }

    /// Pull this lane's byte out of `value`
    pub const fn extract(self, value: u32) -> u8 {
        (value >> self.shift()) as u8
    }

    /// Replace this lane's byte in `value`
    pub const fn insert(self, value: u32, byte: u8) -> u32 {
        (value & !(0xFF << self.shift())) | ((byte as u32) << self.shift())
    }
}

/// A register field reachable through the management channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegField {
    /// One byte of a range start address
    RangeStart {
        /// Range index
        range: usize,
        /// Byte within the address
        lane: ByteLane,
    },
    /// One byte of a range end address
    RangeEnd {
        /// Range index
        range: usize,
        /// Byte within the address
        lane: ByteLane,
    },
    /// The control register
    Control,
}

impl RegField {
    /// Decode a management address; `None` for unmapped addresses
    pub const fn decode(addr: u8) -> Option<Self> {
        if addr == CONTROL_ADDR {
            return Some(Self::Control);
        }

        let range = (addr / RANGE_BLOCK_LEN) as usize;
        if range >= RANGE_COUNT {
            return None;
        }

        let offset = addr % RANGE_BLOCK_LEN;
        if offset < 3 {
            Some(Self::RangeStart {
                range,
                lane: ByteLane::from_offset(offset),
            })
        } else {
            Some(Self::RangeEnd {
                range,
                lane: ByteLane::from_offset(offset - 3),
            })
        }
    }

    /// Management address of this field
    pub const fn address(&self) -> u8 {
        match *self {
            Self::RangeStart { range, lane } => range as u8 * RANGE_BLOCK_LEN + lane.offset(),
            Self::RangeEnd { range, lane } => range as u8 * RANGE_BLOCK_LEN + 3 + lane.offset(),
            Self::Control => CONTROL_ADDR,
        }
    }

    /// Every mapped address in ascending order
    pub fn mapped_addresses() -> impl Iterator<Item = u8> {
        (0..=u8::MAX).filter(|&addr| Self::decode(addr).is_some())
    }
}

impl core::fmt::Display for RegField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let lane = |lane: &ByteLane| match lane {
            ByteLane::High => "H",
            ByteLane::Mid => "M",
            ByteLane::Low => "L",
        };
        match self {
            Self::RangeStart { range, lane: l } => write!(f, "ADDR{}_START_{}", range, lane(l)),
            Self::RangeEnd { range, lane: l } => write!(f, "ADDR{}_END_{}", range, lane(l)),
            Self::Control => write!(f, "CONTROL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range0_layout() {
        assert_eq!(
            RegField::decode(0x00),
            Some(RegField::RangeStart { range: 0, lane: ByteLane::High })
        );
        assert_eq!(
            RegField::decode(0x02),
            Some(RegField::RangeStart { range: 0, lane: ByteLane::Low })
        );
        assert_eq!(
            RegField::decode(0x03),
            Some(RegField::RangeEnd { range: 0, lane: ByteLane::High })
        );
        assert_eq!(
            RegField::decode(0x05),
            Some(RegField::RangeEnd { range: 0, lane: ByteLane::Low })
        );
    }

    #[test]
    fn test_gap_before_control_is_unmapped() {
        for addr in 0x06..=0x0B {
            assert_eq!(RegField::decode(addr), None, "address 0x{:02X}", addr);
        }
    }

    #[test]
    fn test_control_and_unmapped() {
        assert_eq!(RegField::decode(0x0C), Some(RegField::Control));
        assert_eq!(RegField::decode(0x0D), None);
        assert_eq!(RegField::decode(0x12), None);
        assert_eq!(RegField::decode(0xFF), None);
    }

    #[test]
    fn test_address_roundtrip() {
        for addr in RegField::mapped_addresses() {
            let field = RegField::decode(addr).unwrap();
            assert_eq!(field.address(), addr);
        }
        assert_eq!(RegField::mapped_addresses().count(), 7);
    }

    #[test]
    fn test_lane_insert_extract() {
        let value = ByteLane::Mid.insert(0x123456, 0xAB);
        assert_eq!(value, 0x12AB56);
        assert_eq!(ByteLane::High.extract(value), 0x12);
    }
}
