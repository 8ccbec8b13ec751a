//! Bitbang drivers for the controller's SPI channels
//!
//! [`MgmtPort`] talks to the management channel and [`HostPort`] plays one
//! of the two upstream hosts. Both clock the board's data plane while
//! they wait out half clock periods, so the controller sees the traffic
//! with realistic timing.

use flashraid_core::error::{Error, Result as CoreResult};
use flashraid_core::mgmt::{OP_READ, OP_WRITE};
use flashraid_core::pins::{HostId, HostPins, MgmtPins};
use flashraid_core::programmer::{bitbang::single, default_execute, BitbangSpiMaster, SpiMaster};
use flashraid_core::spi::SpiCommand;

use crate::board::{us_to_cycles, Board};

/// Management channel driver
pub struct MgmtPort<'a> {
    board: &'a mut Board,
    pins: MgmtPins,
}

impl<'a> MgmtPort<'a> {
    /// Attach to a board's management channel
    pub fn new(board: &'a mut Board) -> Self {
        let pins = MgmtPins::default();
        board.drive_mgmt(pins);
        Self { board, pins }
    }

    /// Clock a raw frame and return the bytes seen on MISO
    pub fn raw_frame(&mut self, tx: &[u8]) -> Vec<u8> {
        self.set_cs(true);
        self.half_period_delay();
        let rx = tx.iter().map(|&byte| single::transfer_byte(self, byte)).collect();
        single::finish(self);
        self.set_cs(false);
        self.half_period_delay();
        rx
    }

    /// Write a register
    pub fn write_register(&mut self, addr: u8, value: u8) {
        log::debug!("mgmt write 0x{:02X} <- 0x{:02X}", addr, value);
        self.raw_frame(&[OP_WRITE, addr, value]);
    }

    /// Read a register
    pub fn read_register(&mut self, addr: u8) -> u8 {
        let rx = self.raw_frame(&[OP_READ, addr, 0x00]);
        let value = rx.last().copied().unwrap_or(0);
        log::debug!("mgmt read 0x{:02X} -> 0x{:02X}", addr, value);
        value
    }
}

impl BitbangSpiMaster for MgmtPort<'_> {
    fn set_cs(&mut self, active: bool) {
        self.pins.cs_n = !active;
        self.board.drive_mgmt(self.pins);
    }

    fn set_sck(&mut self, high: bool) {
        self.pins.sclk = high;
        self.board.drive_mgmt(self.pins);
    }

    fn set_mosi(&mut self, high: bool) {
        self.pins.mosi = high;
        self.board.drive_mgmt(self.pins);
    }

    fn get_miso(&self) -> bool {
        self.board.outputs().mgmt_miso
    }

    fn half_period_delay(&mut self) {
        let cycles = self.board.half_period() as u64;
        self.board.run(cycles);
    }
}

/// Upstream host driver
///
/// Implements [`SpiMaster`], so the [`flashraid_core::protocol`] helpers
/// run through the controller into the flash models.
pub struct HostPort<'a> {
    board: &'a mut Board,
    host: HostId,
    pins: HostPins,
    checked: bool,
    last_granted: bool,
}

impl<'a> HostPort<'a> {
    /// Attach to one of the board's host channels
    pub fn new(board: &'a mut Board, host: HostId) -> Self {
        let pins = HostPins::idle();
        board.set_host(host, pins);
        Self {
            board,
            host,
            pins,
            checked: false,
            last_granted: false,
        }
    }

    /// Make [`SpiMaster::execute`] fail with [`Error::NotGranted`] when the
    /// arbiter did not grant the bus
    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    /// Host this port drives
    pub fn host(&self) -> HostId {
        self.host
    }

    /// Whether the arbiter granted the bus during the last transaction
    pub fn last_granted(&self) -> bool {
        self.last_granted
    }

    /// Execute a command, failing if the bus was not granted
    pub fn execute_checked(&mut self, cmd: &mut SpiCommand<'_>) -> CoreResult<()> {
        default_execute(cmd, |write, read| {
            self.transaction(write, read);
            Ok(())
        })?;
        if !self.last_granted {
            log::debug!("{} host transfer 0x{:02X} not granted", self.host, cmd.opcode);
            return Err(Error::NotGranted);
        }
        Ok(())
    }

    /// Assert select and hold it without clocking
    pub fn select(&mut self) {
        self.set_cs(true);
        let setup = self.board.cs_setup_cycles() as u64;
        self.board.run(setup);
    }

    /// Release select and let the arbiter return to idle
    pub fn deselect(&mut self) {
        self.set_cs(false);
        let hold = self.board.cs_setup_cycles() as u64;
        self.board.run(hold);
    }

    /// One chip-select cycle: write `write`, then read into `read`
    pub fn transaction(&mut self, write: &[u8], read: &mut [u8]) {
        self.select();
        self.last_granted = self.board.controller().arbiter_state().granted_host() == Some(self.host);
        single::write_bytes(self, write);
        single::read_bytes(self, read);
        single::finish(self);
        self.deselect();
    }
}

impl BitbangSpiMaster for HostPort<'_> {
    fn set_cs(&mut self, active: bool) {
        self.pins.cs_n = !active;
        self.board.set_host(self.host, self.pins);
    }

    fn set_sck(&mut self, high: bool) {
        self.pins.sclk = high;
        self.board.set_host(self.host, self.pins);
    }

    fn set_mosi(&mut self, high: bool) {
        self.pins.mosi = high;
        self.board.set_host(self.host, self.pins);
    }

    fn get_miso(&self) -> bool {
        self.board.outputs().host_miso[self.host.index()]
    }

    fn half_period_delay(&mut self) {
        let cycles = self.board.half_period() as u64;
        self.board.run(cycles);
    }

    fn set_sck_set_mosi(&mut self, sck: bool, mosi: bool) {
        self.pins.sclk = sck;
        self.pins.mosi = mosi;
        self.board.set_host(self.host, self.pins);
    }
}

impl SpiMaster for HostPort<'_> {
    fn max_read_len(&self) -> usize {
        usize::MAX
    }

    fn max_write_len(&self) -> usize {
        usize::MAX
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> CoreResult<()> {
        if self.checked {
            return self.execute_checked(cmd);
        }
        default_execute(cmd, |write, read| {
            self.transaction(write, read);
            Ok(())
        })
    }

    fn delay_us(&mut self, us: u32) {
        self.board.run(us_to_cycles(us));
    }
}
