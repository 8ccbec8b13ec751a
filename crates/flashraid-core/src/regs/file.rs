//! Register file (management clock domain)

use super::control::ControlBits;
use super::map::RegField;
use super::range::{AddressRange, RANGE_COUNT};

/// Value returned when reading an unmapped address
pub const UNMAPPED_READ_VALUE: u8 = 0x00;

/// Complete register contents at one instant
///
/// This is the unit handed across the clock-domain crossing. Each range's
/// `enabled` flag mirrors its enable bit in `control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterSnapshot {
    /// Raw control byte
    pub control: ControlBits,
    /// Address ranges
    pub ranges: [AddressRange; RANGE_COUNT],
}

/// Management-side register storage
///
/// Accesses to unmapped addresses are silently ignored, as register blocks
/// on embedded parts usually do.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    control: ControlBits,
    ranges: [AddressRange; RANGE_COUNT],
}

impl RegisterFile {
    /// Create a register file in its reset state
    pub fn new() -> Self {
        Self::default()
    }

    /// Return every field to zero
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Read the byte at a management address
    pub fn read(&self, addr: u8) -> u8 {
        match RegField::decode(addr) {
            Some(RegField::RangeStart { range, lane }) => self.ranges[range].start_byte(lane),
            Some(RegField::RangeEnd { range, lane }) => self.ranges[range].end_byte(lane),
            Some(RegField::Control) => self.control.bits(),
            None => UNMAPPED_READ_VALUE,
        }
    }

    /// Write the byte at a management address
    ///
    /// Returns `false` if the address is unmapped, in which case nothing
    /// changed.
    pub fn write(&mut self, addr: u8, value: u8) -> bool {
        let Some(field) = RegField::decode(addr) else {
            log::debug!("Ignoring write of 0x{:02X} to unmapped address 0x{:02X}", value, addr);
            return false;
        };

        match field {
            RegField::RangeStart { range, lane } => self.ranges[range].set_start_byte(lane, value),
            RegField::RangeEnd { range, lane } => self.ranges[range].set_end_byte(lane, value),
            RegField::Control => {
                self.control = ControlBits::from_bits_retain(value);
                for (index, range) in self.ranges.iter_mut().enumerate() {
                    range.enabled = self.control.contains(ControlBits::range_enable(index));
                }
            }
        }

        log::debug!("{} <= 0x{:02X}", field, value);
        true
    }

    /// Raw control bits
    pub fn control(&self) -> ControlBits {
        self.control
    }

    /// Range `index`, if it exists
    pub fn range(&self, index: usize) -> Option<&AddressRange> {
        self.ranges.get(index)
    }

    /// Capture the full register contents
    pub fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            control: self.control,
            ranges: self.ranges,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_state() {
        let regs = RegisterFile::new();
        assert_eq!(regs.read(0x0C), 0x00);
        for index in 0..RANGE_COUNT {
            assert_eq!(regs.range(index), Some(&AddressRange::disabled()));
        }
    }

    #[test]
    fn test_roundtrip_every_mapped_address() {
        let mut regs = RegisterFile::new();
        for (i, addr) in RegField::mapped_addresses().enumerate() {
            let value = 0x11u8.wrapping_mul(i as u8 + 1);
            assert!(regs.write(addr, value));
            assert_eq!(regs.read(addr), value);
        }
    }

    #[test]
    fn test_unmapped_write_is_noop() {
        let mut regs = RegisterFile::new();
        regs.write(0x0C, 0x42);
        regs.write(0x03, 0x7F);
        let before = regs.snapshot();

        for addr in 0x0D..=0xFF {
            assert!(!regs.write(addr, 0xA5));
            assert_eq!(regs.read(addr), UNMAPPED_READ_VALUE);
        }

        assert_eq!(regs.snapshot(), before);
    }

    #[test]
    fn test_range_bytes_assemble() {
        let mut regs = RegisterFile::new();
        for (addr, value) in [(0x00, 0x00), (0x01, 0x00), (0x02, 0x00), (0x03, 0x7F), (0x04, 0xFF), (0x05, 0xFF)] {
            regs.write(addr, value);
        }
        let range = regs.range(0).unwrap();
        assert_eq!(range.start, 0x000000);
        assert_eq!(range.end, 0x7FFFFF);
        assert!(!range.enabled);
    }

    #[test]
    fn test_control_drives_range_enable() {
        let mut regs = RegisterFile::new();
        regs.write(0x0C, 0x06);
        assert!(regs.range(0).unwrap().enabled);

        regs.write(0x0C, 0x0A);
        assert!(!regs.range(0).unwrap().enabled);
        assert_eq!(regs.range(1), None);
    }

    #[test]
    fn test_upper_range_block_is_unmapped() {
        let mut regs = RegisterFile::new();
        let before = regs.snapshot();
        for addr in 0x06..=0x0B {
            assert!(!regs.write(addr, 0xFF));
            assert_eq!(regs.read(addr), UNMAPPED_READ_VALUE);
        }
        assert_eq!(regs.snapshot(), before);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut regs = RegisterFile::new();
        regs.write(0x0C, 0xFF);
        regs.write(0x01, 0x12);
        regs.reset();
        assert_eq!(regs.snapshot(), RegisterSnapshot::default());
    }
}
