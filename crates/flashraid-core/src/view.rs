//! Data-plane view of the configuration registers

use crate::matcher;
use crate::regs::{AddressRange, ControlView, RegisterSnapshot, RANGE_COUNT};

/// Configuration as seen by the data plane
///
/// Built in one step from a [`RegisterSnapshot`] by the CDC sink. The data
/// plane never holds anything but whole views, so a management write is
/// either fully visible or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SynchronizedView {
    /// Decoded control register
    pub control: ControlView,
    /// Address ranges, `enabled` taken from the control register
    pub ranges: [AddressRange; RANGE_COUNT],
    /// Number of snapshots captured since reset
    pub version: u32,
}

impl SynchronizedView {
    /// Decode a register snapshot
    pub fn from_snapshot(snapshot: &RegisterSnapshot, version: u32) -> Self {
        let control = ControlView::decode(snapshot.control);
        let mut ranges = snapshot.ranges;
        for (range, &enabled) in ranges.iter_mut().zip(control.range_enable.iter()) {
            range.enabled = enabled;
        }
        Self {
            control,
            ranges,
            version,
        }
    }

    /// Whether `address` falls inside any enabled range
    pub fn matches(&self, address: u32) -> bool {
        matcher::matches(&self.ranges, address)
    }

    /// Raw control byte this view was decoded from
    pub fn raw_control(&self) -> u8 {
        self.control.encode().bits()
    }

    /// Compare configuration content, ignoring the version counter
    pub fn same_config(&self, other: &Self) -> bool {
        self.control == other.control && self.ranges == other.ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::HostId;
    use crate::regs::RegisterFile;

    #[test]
    fn test_from_snapshot() {
        let mut regs = RegisterFile::new();
        for (addr, value) in [(0x03, 0x7F), (0x04, 0xFF), (0x05, 0xFF), (0x0C, 0x46)] {
            regs.write(addr, value);
        }

        let view = SynchronizedView::from_snapshot(&regs.snapshot(), 1);
        assert!(view.control.share_mode);
        assert_eq!(view.control.active_host, HostId::Secondary);
        assert!(view.ranges[0].enabled);
        assert!(view.matches(0x400000));
        assert!(!view.matches(0x800000));
        assert_eq!(view.raw_control(), 0x46);
    }

    #[test]
    fn test_reset_view() {
        let view = SynchronizedView::default();
        assert_eq!(view.raw_control(), 0);
        assert!(view.ranges.iter().all(|range| !range.enabled));
        assert!(!view.matches(0));
    }
}
