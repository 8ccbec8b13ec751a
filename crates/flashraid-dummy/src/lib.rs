//! flashraid-dummy - In-memory SPI flash model
//!
//! [`DummyFlash`] emulates the storage and command set of a serial NOR
//! flash in memory and answers whole [`SpiCommand`]s. [`FlashModel`] puts a
//! pin-level front end on it, so it can hang off a flash channel of the
//! controller and see exactly the chip select, clock and data levels the
//! controller drives.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
mod model;

#[cfg(feature = "alloc")]
pub use model::FlashModel;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;
#[cfg(feature = "alloc")]
use core::ops::Range;

use flashraid_core::error::{Error, Result};
use flashraid_core::programmer::SpiMaster;
use flashraid_core::spi::{opcodes, SpiCommand};

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Flash size in bytes
    pub size: usize,
    /// Page size for programming
    pub page_size: usize,
    /// Sector size for smallest erase
    pub sector_size: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: 0xEF, // Winbond
            device_id: 0x4018,     // W25Q128FV
            size: 16 * 1024 * 1024,
            page_size: opcodes::PAGE_SIZE,
            sector_size: opcodes::SECTOR_SIZE,
        }
    }
}

impl DummyConfig {
    /// Default identity with a different capacity
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

/// Dummy flash
///
/// Storage plus the write enable latch. Commands are executed whole through
/// [`SpiMaster::execute`]; out-of-range accesses and writes without WEL are
/// rejected and leave the array untouched.
#[cfg(feature = "alloc")]
#[derive(Debug, Clone)]
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    wel: bool,
}

#[cfg(feature = "alloc")]
impl DummyFlash {
    /// Erased flash
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            wel: false,
        }
    }

    /// Flash whose leading bytes hold `initial_data`
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = initial_data.len().min(flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable array contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Geometry and identity
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Status register 1
    ///
    /// Operations complete instantly, so WIP never reads set.
    pub fn status1(&self) -> u8 {
        if self.wel {
            opcodes::SR1_WEL
        } else {
            0
        }
    }

    /// Byte at `addr`, wrapping at the end of the array
    pub fn read_byte(&self, addr: u32) -> u8 {
        match self.data.len() {
            0 => 0xFF,
            len => self.data[addr as usize % len],
        }
    }

    fn span(&self, addr: usize, len: usize) -> Result<Range<usize>> {
        let end = addr.checked_add(len).ok_or(Error::AddressOutOfBounds)?;
        if end > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }
        Ok(addr..end)
    }

    /// Consume the write enable latch
    fn take_wel(&mut self) -> Result<()> {
        if !core::mem::take(&mut self.wel) {
            return Err(Error::WriteProtected);
        }
        Ok(())
    }

    fn jedec_id(&self) -> [u8; 3] {
        let [hi, lo] = self.config.device_id.to_be_bytes();
        [self.config.manufacturer_id, hi, lo]
    }

    fn read(&self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let span = self.span(cmd.address.unwrap_or(0) as usize, cmd.read_buf.len())?;
        cmd.read_buf.copy_from_slice(&self.data[span]);
        Ok(())
    }

    fn program(&mut self, addr: usize, bytes: &[u8]) -> Result<()> {
        let span = self.span(addr, bytes.len())?;
        self.take_wel()?;
        // Programming only clears bits
        for (cell, &byte) in self.data[span].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        Ok(())
    }

    fn erase(&mut self, span: Range<usize>) -> Result<()> {
        self.take_wel()?;
        log::trace!("Erasing 0x{:06X}..0x{:06X}", span.start, span.end);
        self.data[span].fill(0xFF);
        Ok(())
    }
}

#[cfg(feature = "alloc")]
impl SpiMaster for DummyFlash {
    fn max_read_len(&self) -> usize {
        self.config.sector_size
    }

    fn max_write_len(&self) -> usize {
        self.config.page_size
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
        let addr = cmd.address.unwrap_or(0) as usize;
        match cmd.opcode {
            opcodes::RDID => {
                let id = self.jedec_id();
                for (dst, src) in cmd.read_buf.iter_mut().zip(id) {
                    *dst = src;
                }
                Ok(())
            }
            opcodes::RDSR => {
                cmd.read_buf.fill(self.status1());
                Ok(())
            }
            opcodes::WREN => {
                self.wel = true;
                Ok(())
            }
            opcodes::WRDI => {
                self.wel = false;
                Ok(())
            }
            opcodes::READ => self.read(cmd),
            opcodes::PP => self.program(addr, cmd.write_data),
            opcodes::SE_20 => {
                let sector = self.config.sector_size;
                let span = self.span(addr - addr % sector, sector)?;
                self.erase(span)
            }
            opcodes::CE_60 | opcodes::CE_C7 => self.erase(0..self.data.len()),
            _ => Err(Error::OpcodeNotSupported),
        }
    }

    fn delay_us(&mut self, _us: u32) {}
}
