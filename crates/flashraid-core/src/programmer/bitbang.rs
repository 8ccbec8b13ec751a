//! Bitbang SPI master trait
//!
//! Host and management channels of the controller are plain pin bundles,
//! so everything that talks to them does it by bitbanging: set CS, toggle
//! SCK, present MOSI, sample MISO. This module holds the minimal pin-level
//! trait and the single-wire helpers built on it (mode 0, MSB first).

/// Trait for low-level bitbang SPI operations
///
/// This trait provides the minimal set of operations needed for bitbanging SPI.
pub trait BitbangSpiMaster {
    /// Set chip select (CS is active low, so `active=true` means CS=0)
    fn set_cs(&mut self, active: bool);

    /// Set clock line value
    fn set_sck(&mut self, high: bool);

    /// Set MOSI line value
    fn set_mosi(&mut self, high: bool);

    /// Get MISO line value
    fn get_miso(&self) -> bool;

    /// Delay for half a clock period
    fn half_period_delay(&mut self);

    /// Optional: Set SCK and MOSI atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `set_mosi`.
    fn set_sck_set_mosi(&mut self, sck: bool, mosi: bool) {
        self.set_sck(sck);
        self.set_mosi(mosi);
    }

    /// Optional: Set SCK and get MISO atomically (optimization)
    ///
    /// Default implementation calls `set_sck` then `get_miso`.
    fn set_sck_get_miso(&mut self, sck: bool) -> bool {
        self.set_sck(sck);
        self.get_miso()
    }
}

/// Bitbang helper functions for single-wire I/O
///
/// These are standalone functions that can be used by any `BitbangSpiMaster` implementation.
pub mod single {
    use super::BitbangSpiMaster;

    /// Write a byte in single-wire mode (MSB first)
    pub fn write_byte<M: BitbangSpiMaster + ?Sized>(master: &mut M, byte: u8) {
        transfer_byte(master, byte);
    }

    /// Read a byte in single-wire mode (MSB first), holding MOSI low
    pub fn read_byte<M: BitbangSpiMaster + ?Sized>(master: &mut M) -> u8 {
        transfer_byte(master, 0x00)
    }

    /// Shift a byte out and one in (MSB first)
    ///
    /// MOSI changes while SCK is low; MISO is sampled right after the
    /// rising edge.
    pub fn transfer_byte<M: BitbangSpiMaster + ?Sized>(master: &mut M, byte: u8) -> u8 {
        let mut rx = 0u8;
        for i in (0..8).rev() {
            let bit = (byte >> i) & 1 != 0;
            master.set_sck_set_mosi(false, bit);
            master.half_period_delay();
            rx <<= 1;
            if master.set_sck_get_miso(true) {
                rx |= 1;
            }
            master.half_period_delay();
        }
        rx
    }

    /// Run clock for a number of cycles with MOSI low
    pub fn run_clock<M: BitbangSpiMaster + ?Sized>(master: &mut M, cycles: usize) {
        for _ in 0..cycles {
            master.set_sck_set_mosi(false, false);
            master.half_period_delay();
            master.set_sck(true);
            master.half_period_delay();
        }
    }

    /// Write multiple bytes in single-wire mode
    pub fn write_bytes<M: BitbangSpiMaster + ?Sized>(master: &mut M, bytes: &[u8]) {
        for &byte in bytes {
            write_byte(master, byte);
        }
    }

    /// Read multiple bytes in single-wire mode
    pub fn read_bytes<M: BitbangSpiMaster + ?Sized>(master: &mut M, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = read_byte(master);
        }
    }

    /// Return SCK to idle low after a transfer
    pub fn finish<M: BitbangSpiMaster + ?Sized>(master: &mut M) {
        master.set_sck_set_mosi(false, false);
        master.half_period_delay();
    }
}
