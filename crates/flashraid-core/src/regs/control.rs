//! Control register

use bitflags::bitflags;

use super::range::RANGE_COUNT;
use crate::pins::HostId;

bitflags! {
    /// Raw control register bits
    ///
    /// Only the named bits are decoded. Bits 0, 3, 4, 5 and 7 are reserved:
    /// they are stored and read back unchanged but never influence routing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlBits: u8 {
        /// Mirrored/redundant routing
        const SHARE_MODE    = 1 << 1;
        /// Range 0 participates in routing
        const RANGE0_ENABLE = 1 << 2;
        /// Secondary host is authoritative (clear: main host)
        const ACTIVE_HOST   = 1 << 6;
    }
}

impl ControlBits {
    /// Mask of the reserved bits
    pub const RESERVED_MASK: u8 = 0b1011_1001;

    /// Enable bit of range `index`
    pub const fn range_enable(index: usize) -> Self {
        match index {
            0 => Self::RANGE0_ENABLE,
            _ => Self::empty(),
        }
    }
}

impl Default for ControlBits {
    fn default() -> Self {
        ControlBits::empty()
    }
}

/// Decoded control register
///
/// Routing logic only ever sees this struct. It is built once, when a
/// register snapshot crosses into the data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlView {
    /// Mirrored/redundant routing enabled
    pub share_mode: bool,
    /// Per-range enable
    pub range_enable: [bool; RANGE_COUNT],
    /// Host whose select is honoured
    pub active_host: HostId,
    /// Reserved bits, carried so the raw byte can be rebuilt
    pub reserved: u8,
}

impl ControlView {
    /// Decode a raw control byte
    pub fn decode(bits: ControlBits) -> Self {
        let mut range_enable = [false; RANGE_COUNT];
        for (index, enabled) in range_enable.iter_mut().enumerate() {
            *enabled = bits.contains(ControlBits::range_enable(index));
        }

        Self {
            share_mode: bits.contains(ControlBits::SHARE_MODE),
            range_enable,
            active_host: if bits.contains(ControlBits::ACTIVE_HOST) {
                HostId::Secondary
            } else {
                HostId::Main
            },
            reserved: bits.bits() & ControlBits::RESERVED_MASK,
        }
    }

    /// Rebuild the raw control byte
    pub fn encode(&self) -> ControlBits {
        let mut bits = ControlBits::from_bits_retain(self.reserved & ControlBits::RESERVED_MASK);
        bits.set(ControlBits::SHARE_MODE, self.share_mode);
        for (index, &enabled) in self.range_enable.iter().enumerate() {
            bits.set(ControlBits::range_enable(index), enabled);
        }
        bits.set(ControlBits::ACTIVE_HOST, self.active_host == HostId::Secondary);
        bits
    }

    /// Whether any address range participates in routing
    pub fn any_range_enabled(&self) -> bool {
        self.range_enable.iter().any(|&enabled| enabled)
    }
}

impl Default for ControlView {
    fn default() -> Self {
        Self::decode(ControlBits::empty())
    }
}
