//! Address phase of a flash command

use crate::regs::ADDRESS_MASK;

/// Width of the address phase following the opcode
///
/// Only 3-byte addressing exists on the controller's flash bus: the
/// arbiter snoops exactly one opcode byte and a 24-bit address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// Opcode only
    #[default]
    None,
    /// 24-bit address, MSB first
    ThreeByte,
}

impl AddressWidth {
    /// Address bytes on the wire
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
        }
    }

    /// Bits clocked for opcode plus address
    pub const fn header_bits(&self) -> u8 {
        8 * (1 + self.bytes())
    }

    /// Size of the address space in bytes
    pub const fn max_size(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::ThreeByte => ADDRESS_MASK + 1,
        }
    }

    /// Write `address` into the first [`AddressWidth::bytes`] of `buf`
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        let len = self.bytes() as usize;
        let be = (address & ADDRESS_MASK).to_be_bytes();
        buf[..len].copy_from_slice(&be[4 - len..]);
    }
}
