//! Management SPI command decoder
//!
//! The management channel is clocked by its own SCLK, so this decoder does
//! not tick with the data plane. It reacts to pin changes: every call to
//! [`MgmtDecoder::drive`] compares the new levels against the previous ones
//! and processes the edges found.
//!
//! ## Frame format
//!
//! | Byte | Meaning |
//! |---|---|
//! | 1 | Opcode: `0x02` WRITE, `0x03` READ |
//! | 2 | Register address |
//! | 3 | WRITE: data byte. READ: response clocked out on MISO |
//!
//! Bits travel MSB first and are sampled on SCLK rising edges. The READ
//! response is latched as soon as the address byte completes, so its MSB is
//! already on MISO before the first rising edge of byte 3; each following
//! falling edge moves to the next bit.

use heapless::Vec;

use crate::pins::MgmtPins;
use crate::regs::RegisterFile;

/// WRITE opcode
pub const OP_WRITE: u8 = 0x02;
/// READ opcode
pub const OP_READ: u8 = 0x03;

/// Maximum meaningful frame length
const FRAME_LEN: usize = 3;

/// Decoded management opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MgmtCommand {
    /// Register write
    Write,
    /// Register read
    Read,
    /// Anything else; clocked through and ignored
    Unknown(u8),
}

impl From<u8> for MgmtCommand {
    fn from(opcode: u8) -> Self {
        match opcode {
            OP_WRITE => Self::Write,
            OP_READ => Self::Read,
            other => Self::Unknown(other),
        }
    }
}

/// A register write committed by a completed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MgmtWrite {
    /// Register address
    pub addr: u8,
    /// Data byte
    pub value: u8,
    /// Whether the address was mapped
    pub applied: bool,
}

/// Management frame decoder
#[derive(Debug, Clone)]
pub struct MgmtDecoder {
    prev: MgmtPins,
    in_frame: bool,
    shift: u8,
    bit_count: u8,
    frame: Vec<u8, FRAME_LEN>,
    response: u8,
    response_bits: u8,
    miso: bool,
}

impl Default for MgmtDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MgmtDecoder {
    /// Create an idle decoder
    pub fn new() -> Self {
        Self {
            prev: MgmtPins::default(),
            in_frame: false,
            shift: 0,
            bit_count: 0,
            frame: Vec::new(),
            response: 0,
            response_bits: 0,
            miso: false,
        }
    }

    /// Return to the idle state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current MISO level
    pub fn miso(&self) -> bool {
        self.miso
    }

    /// Whether a frame is in progress
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    fn command(&self) -> Option<MgmtCommand> {
        self.frame.first().map(|&opcode| MgmtCommand::from(opcode))
    }

    fn end_frame(&mut self) {
        if self.in_frame {
            if self.bit_count != 0 {
                log::trace!("Management frame aborted with {} stray bits", self.bit_count);
            }
            log::trace!("Management frame ended after {} bytes", self.frame.len());
        }
        self.in_frame = false;
        self.shift = 0;
        self.bit_count = 0;
        self.frame.clear();
        self.response = 0;
        self.response_bits = 0;
        self.miso = false;
    }

    /// Apply new pin levels
    ///
    /// Returns the register write committed by this edge, if any. The
    /// caller is responsible for publishing the new register contents.
    pub fn drive(&mut self, pins: MgmtPins, regs: &mut RegisterFile) -> Option<MgmtWrite> {
        let prev = self.prev;
        self.prev = pins;

        if pins.cs_n {
            self.end_frame();
            return None;
        }

        if !self.in_frame {
            log::trace!("Management frame started");
            self.in_frame = true;
        }

        match (prev.sclk, pins.sclk) {
            (false, true) => self.rising_edge(pins.mosi, regs),
            (true, false) => {
                self.falling_edge();
                None
            }
            _ => None,
        }
    }

    fn in_response(&self) -> bool {
        self.frame.len() == 2 && self.command() == Some(MgmtCommand::Read)
    }

    fn rising_edge(&mut self, mosi: bool, regs: &mut RegisterFile) -> Option<MgmtWrite> {
        self.shift = (self.shift << 1) | mosi as u8;
        self.bit_count += 1;
        if self.in_response() {
            self.response_bits += 1;
        }
        log::trace!("Management bit {} = {}", self.bit_count, mosi as u8);

        if self.bit_count < 8 {
            return None;
        }

        let byte = self.shift;
        self.shift = 0;
        self.bit_count = 0;
        self.byte_complete(byte, regs)
    }

    fn falling_edge(&mut self) {
        if self.in_response() && (1..8).contains(&self.response_bits) {
            self.miso = (self.response >> (7 - self.response_bits)) & 1 != 0;
        }
    }

    fn byte_complete(&mut self, byte: u8, regs: &mut RegisterFile) -> Option<MgmtWrite> {
        match self.frame.len() {
            0 => {
                let _ = self.frame.push(byte);
                if let MgmtCommand::Unknown(opcode) = MgmtCommand::from(byte) {
                    log::debug!("Ignoring unknown management opcode 0x{:02X}", opcode);
                }
                None
            }
            1 => {
                let _ = self.frame.push(byte);
                if self.command() == Some(MgmtCommand::Read) {
                    self.response = regs.read(byte);
                    self.response_bits = 0;
                    self.miso = self.response & 0x80 != 0;
                    log::debug!("READ 0x{:02X} -> 0x{:02X}", byte, self.response);
                }
                None
            }
            2 => {
                let addr = self.frame[1];
                let _ = self.frame.push(byte);
                if self.command() != Some(MgmtCommand::Write) {
                    return None;
                }
                log::debug!("WRITE 0x{:02X} <- 0x{:02X}", addr, byte);
                let applied = regs.write(addr, byte);
                Some(MgmtWrite {
                    addr,
                    value: byte,
                    applied,
                })
            }
            _ => {
                log::trace!("Ignoring trailing management byte 0x{:02X}", byte);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock one byte MSB first, data set up before each rising edge
    fn clock_byte(dec: &mut MgmtDecoder, regs: &mut RegisterFile, byte: u8) -> (u8, Option<MgmtWrite>) {
        let mut read = 0u8;
        let mut write = None;
        for i in (0..8).rev() {
            let mosi = (byte >> i) & 1 != 0;
            dec.drive(MgmtPins { cs_n: false, sclk: false, mosi }, regs);
            if let Some(w) = dec.drive(MgmtPins { cs_n: false, sclk: true, mosi }, regs) {
                write = Some(w);
            }
            read = (read << 1) | dec.miso() as u8;
        }
        dec.drive(MgmtPins { cs_n: false, sclk: false, mosi: false }, regs);
        (read, write)
    }

    fn select(dec: &mut MgmtDecoder, regs: &mut RegisterFile) {
        dec.drive(MgmtPins { cs_n: false, sclk: false, mosi: false }, regs);
    }

    fn deselect(dec: &mut MgmtDecoder, regs: &mut RegisterFile) {
        dec.drive(MgmtPins::default(), regs);
    }

    fn write_frame(dec: &mut MgmtDecoder, regs: &mut RegisterFile, addr: u8, value: u8) -> Option<MgmtWrite> {
        select(dec, regs);
        clock_byte(dec, regs, OP_WRITE);
        clock_byte(dec, regs, addr);
        let (_, write) = clock_byte(dec, regs, value);
        deselect(dec, regs);
        write
    }

    fn read_frame(dec: &mut MgmtDecoder, regs: &mut RegisterFile, addr: u8) -> u8 {
        select(dec, regs);
        clock_byte(dec, regs, OP_READ);
        clock_byte(dec, regs, addr);
        let (value, write) = clock_byte(dec, regs, 0x00);
        assert!(write.is_none());
        deselect(dec, regs);
        value
    }

    #[test]
    fn test_write_then_read() {
        let mut dec = MgmtDecoder::new();
        let mut regs = RegisterFile::new();

        let write = write_frame(&mut dec, &mut regs, 0x0C, 0x42);
        assert_eq!(write, Some(MgmtWrite { addr: 0x0C, value: 0x42, applied: true }));
        assert_eq!(regs.read(0x0C), 0x42);
        assert_eq!(read_frame(&mut dec, &mut regs, 0x0C), 0x42);
    }

    #[test]
    fn test_read_every_pattern() {
        let mut dec = MgmtDecoder::new();
        let mut regs = RegisterFile::new();
        for value in [0x00, 0x01, 0x80, 0x7F, 0xA5, 0xFF] {
            write_frame(&mut dec, &mut regs, 0x04, value);
            assert_eq!(read_frame(&mut dec, &mut regs, 0x04), value);
        }
    }

    #[test]
    fn test_response_msb_ready_after_address() {
        let mut dec = MgmtDecoder::new();
        let mut regs = RegisterFile::new();
        regs.write(0x0C, 0x80);

        select(&mut dec, &mut regs);
        clock_byte(&mut dec, &mut regs, OP_READ);
        clock_byte(&mut dec, &mut regs, 0x0C);
        assert!(dec.miso());
    }

    #[test]
    fn test_unknown_opcode_ignored() {
        let mut dec = MgmtDecoder::new();
        let mut regs = RegisterFile::new();

        select(&mut dec, &mut regs);
        clock_byte(&mut dec, &mut regs, 0x9F);
        clock_byte(&mut dec, &mut regs, 0x0C);
        let (miso, write) = clock_byte(&mut dec, &mut regs, 0xFF);
        deselect(&mut dec, &mut regs);

        assert!(write.is_none());
        assert_eq!(miso, 0x00);
        assert_eq!(regs.read(0x0C), 0x00);
    }

    #[test]
    fn test_abort_mid_byte_applies_nothing() {
        let mut dec = MgmtDecoder::new();
        let mut regs = RegisterFile::new();

        select(&mut dec, &mut regs);
        clock_byte(&mut dec, &mut regs, OP_WRITE);
        clock_byte(&mut dec, &mut regs, 0x0C);
        // Seven of eight data bits, then deselect
        for _ in 0..7 {
            dec.drive(MgmtPins { cs_n: false, sclk: false, mosi: true }, &mut regs);
            assert!(dec.drive(MgmtPins { cs_n: false, sclk: true, mosi: true }, &mut regs).is_none());
        }
        deselect(&mut dec, &mut regs);
        assert_eq!(regs.read(0x0C), 0x00);

        // Decoder is back in sync for the next frame
        write_frame(&mut dec, &mut regs, 0x0C, 0x06);
        assert_eq!(regs.read(0x0C), 0x06);
    }

    #[test]
    fn test_unmapped_write_reported() {
        let mut dec = MgmtDecoder::new();
        let mut regs = RegisterFile::new();
        let write = write_frame(&mut dec, &mut regs, 0x20, 0x55);
        assert_eq!(write, Some(MgmtWrite { addr: 0x20, value: 0x55, applied: false }));
        assert_eq!(read_frame(&mut dec, &mut regs, 0x20), 0x00);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut dec = MgmtDecoder::new();
        let mut regs = RegisterFile::new();

        select(&mut dec, &mut regs);
        clock_byte(&mut dec, &mut regs, OP_WRITE);
        clock_byte(&mut dec, &mut regs, 0x01);
        clock_byte(&mut dec, &mut regs, 0x12);
        let (_, extra) = clock_byte(&mut dec, &mut regs, 0x34);
        deselect(&mut dec, &mut regs);

        assert!(extra.is_none());
        assert_eq!(regs.read(0x01), 0x12);
    }

    #[test]
    fn test_clock_without_select_ignored() {
        let mut dec = MgmtDecoder::new();
        let mut regs = RegisterFile::new();
        for _ in 0..24 {
            dec.drive(MgmtPins { cs_n: true, sclk: true, mosi: true }, &mut regs);
            dec.drive(MgmtPins { cs_n: true, sclk: false, mosi: true }, &mut regs);
        }
        assert!(!dec.in_frame());
        assert_eq!(regs.snapshot(), RegisterFile::new().snapshot());
    }
}
