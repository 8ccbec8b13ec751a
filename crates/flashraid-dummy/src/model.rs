//! Pin-level front end of the dummy flash
//!
//! SPI mode 0: MOSI is sampled on rising SCLK edges, MISO changes on
//! falling edges. Read-type commands (RDID, RDSR, READ) stream their
//! answer while the clock runs. Write-type commands (WREN, WRDI, PP, SE,
//! CE) take effect when chip select is released, and only if the
//! transaction ended on a byte boundary.

use alloc::vec::Vec;

use flashraid_core::pins::FlashPins;
use flashraid_core::programmer::SpiMaster;
use flashraid_core::spi::{opcodes, SpiCommand};

use crate::{DummyConfig, DummyFlash};

/// Opcode plus 3-byte address
const MAX_HEADER_LEN: usize = 4;

fn header_len(opcode: u8) -> Option<usize> {
    match opcode {
        opcodes::RDID | opcodes::RDSR | opcodes::WREN | opcodes::WRDI | opcodes::CE_60 | opcodes::CE_C7 => Some(1),
        opcodes::READ | opcodes::PP | opcodes::SE_20 => Some(MAX_HEADER_LEN),
        _ => None,
    }
}

/// SPI flash driven at pin level
#[derive(Debug, Clone)]
pub struct FlashModel {
    flash: DummyFlash,
    miso_pattern: Option<bool>,
    prev: FlashPins,
    shift_in: u8,
    bits_in: u8,
    bytes: usize,
    opcode: u8,
    address: u32,
    page: Vec<u8>,
    out_byte: Option<u8>,
    out_bit: u8,
    miso: bool,
    transactions: u64,
}

impl FlashModel {
    /// Create an erased flash
    pub fn new(config: DummyConfig) -> Self {
        Self::from_flash(DummyFlash::new(config))
    }

    /// Wrap an existing in-memory flash
    pub fn from_flash(flash: DummyFlash) -> Self {
        Self {
            flash,
            miso_pattern: None,
            prev: FlashPins::idle(),
            shift_in: 0,
            bits_in: 0,
            bytes: 0,
            opcode: 0,
            address: 0,
            page: Vec::new(),
            out_byte: None,
            out_bit: 0,
            miso: true,
            transactions: 0,
        }
    }

    /// A device that drives a constant MISO level and ignores all traffic
    pub fn with_miso_pattern(config: DummyConfig, level: bool) -> Self {
        let mut model = Self::new(config);
        model.miso_pattern = Some(level);
        model
    }

    /// Backing storage
    pub fn flash(&self) -> &DummyFlash {
        &self.flash
    }

    /// Mutable backing storage
    pub fn flash_mut(&mut self) -> &mut DummyFlash {
        &mut self.flash
    }

    /// Number of completed chip-select cycles
    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    /// Whether chip select is currently asserted
    pub fn is_selected(&self) -> bool {
        self.prev.is_selected()
    }

    /// Apply new pin levels and return the MISO level
    pub fn drive(&mut self, pins: FlashPins) -> bool {
        let prev = self.prev;
        self.prev = pins;

        if let Some(level) = self.miso_pattern {
            return level;
        }

        if !pins.is_selected() {
            if prev.is_selected() {
                self.end_transaction();
            }
            return true;
        }

        if !prev.is_selected() {
            self.begin_transaction();
        }

        match (prev.sclk, pins.sclk) {
            (false, true) => self.rising_edge(pins.mosi),
            (true, false) => self.falling_edge(),
            _ => {}
        }
        self.miso
    }

    fn begin_transaction(&mut self) {
        self.shift_in = 0;
        self.bits_in = 0;
        self.bytes = 0;
        self.opcode = 0;
        self.address = 0;
        self.page.clear();
        self.out_byte = None;
        self.out_bit = 0;
        self.miso = true;
    }

    fn rising_edge(&mut self, mosi: bool) {
        self.shift_in = (self.shift_in << 1) | mosi as u8;
        self.bits_in += 1;
        if self.bits_in == 8 {
            let byte = self.shift_in;
            self.shift_in = 0;
            self.bits_in = 0;
            self.byte_complete(byte);
        }
    }

    fn falling_edge(&mut self) {
        if let Some(byte) = self.out_byte {
            if self.out_bit < 8 {
                self.miso = (byte >> (7 - self.out_bit)) & 1 != 0;
                self.out_bit += 1;
            }
        }
    }

    fn byte_complete(&mut self, byte: u8) {
        self.bytes += 1;
        if self.bytes == 1 {
            self.opcode = byte;
            if header_len(byte).is_none() {
                log::debug!("Flash ignoring unsupported opcode 0x{:02X}", byte);
            }
        }

        let Some(header) = header_len(self.opcode) else {
            return;
        };

        if self.bytes > 1 && self.bytes <= header {
            self.address = (self.address << 8) | byte as u32;
        } else if self.bytes > header && self.opcode == opcodes::PP {
            if self.page.len() < self.flash.config().page_size {
                self.page.push(byte);
            } else {
                log::debug!("Flash dropping program data past the page size");
            }
        }

        if self.bytes >= header {
            self.out_byte = self.response_byte(self.bytes - header);
            self.out_bit = 0;
        }
    }

    fn response_byte(&self, index: usize) -> Option<u8> {
        match self.opcode {
            opcodes::RDID => {
                let config = self.flash.config();
                let id = [config.manufacturer_id, (config.device_id >> 8) as u8, config.device_id as u8];
                Some(id.get(index).copied().unwrap_or(0xFF))
            }
            opcodes::RDSR => Some(self.flash.status1()),
            opcodes::READ => Some(self.flash.read_byte(self.address.wrapping_add(index as u32))),
            _ => None,
        }
    }

    fn end_transaction(&mut self) {
        self.transactions += 1;
        self.out_byte = None;
        self.miso = true;

        if self.bits_in != 0 {
            log::debug!(
                "Flash transaction 0x{:02X} ended mid-byte ({} stray bits), ignored",
                self.opcode,
                self.bits_in
            );
            return;
        }

        let Some(header) = header_len(self.opcode) else {
            return;
        };
        if self.bytes < header {
            log::trace!("Flash transaction 0x{:02X} ended inside the header", self.opcode);
            return;
        }

        let size = self.flash.config().size.max(1) as u32;
        let address = self.address % size;
        let page = core::mem::take(&mut self.page);
        let mut cmd = match self.opcode {
            opcodes::WREN | opcodes::WRDI | opcodes::CE_60 | opcodes::CE_C7 => SpiCommand::simple(self.opcode),
            opcodes::SE_20 => SpiCommand::erase_3b(self.opcode, address),
            opcodes::PP if !page.is_empty() => SpiCommand::write_3b(self.opcode, address, &page),
            _ => return,
        };

        match self.flash.execute(&mut cmd) {
            Ok(()) => log::trace!("Flash executed 0x{:02X} at 0x{:06X}", self.opcode, address),
            Err(e) => log::debug!("Flash rejected 0x{:02X} at 0x{:06X}: {}", self.opcode, address, e),
        }
    }
}
