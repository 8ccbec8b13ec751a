//! SPI command structure

use super::AddressWidth;

/// One chip-select cycle on a flash bus
///
/// Borrowed buffers only; the write data follows the header and the read
/// buffer is filled after it.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,
    /// Address, when the command has an address phase
    pub address: Option<u32>,
    /// Address width
    pub address_width: AddressWidth,
    /// Bytes clocked out after the header
    pub write_data: &'a [u8],
    /// Bytes clocked in after the header and write data
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    fn with_address(opcode: u8, addr: u32, write_data: &'a [u8], read_buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            write_data,
            read_buf,
        }
    }

    /// Opcode only (WREN, WRDI, CE)
    pub fn simple(opcode: u8) -> Self {
        Self::read_reg(opcode, &mut [])
    }

    /// Opcode followed by a read phase (RDSR, RDID)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Addressed read (READ)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self::with_address(opcode, addr, &[], buf)
    }

    /// Addressed write (PP)
    pub fn write_3b(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self::with_address(opcode, addr, data, &mut [])
    }

    /// Addressed command without data (SE)
    pub fn erase_3b(opcode: u8, addr: u32) -> Self {
        Self::with_address(opcode, addr, &[], &mut [])
    }

    /// Whether bytes are clocked in
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Whether an address phase follows the opcode
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Opcode plus address bytes
    pub fn header_len(&self) -> usize {
        1 + self.address_width.bytes() as usize
    }

    /// Encode the opcode and address into `buf`
    ///
    /// `buf` must hold at least [`SpiCommand::header_len`] bytes.
    pub fn encode_header(&self, buf: &mut [u8]) {
        buf[0] = self.opcode;
        if let Some(address) = self.address {
            self.address_width.encode(address, &mut buf[1..]);
        }
    }

    /// Bytes clocked in the whole chip-select cycle
    pub fn total_bytes(&self) -> usize {
        self.header_len() + self.write_data.len() + self.read_buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;

    #[test]
    fn test_header_encoding() {
        let mut buf = [0u8; 4];
        let cmd = SpiCommand::read_3b(opcodes::READ, 0x123456, &mut buf);
        let mut header = [0u8; 4];
        assert_eq!(cmd.header_len(), 4);
        cmd.encode_header(&mut header);
        assert_eq!(header, [0x03, 0x12, 0x34, 0x56]);
        assert_eq!(cmd.total_bytes(), 8);
    }

    #[test]
    fn test_simple_has_no_address() {
        let cmd = SpiCommand::simple(opcodes::WREN);
        assert_eq!(cmd.header_len(), 1);
        assert!(!cmd.has_address());
        assert!(!cmd.has_read());
    }
}
