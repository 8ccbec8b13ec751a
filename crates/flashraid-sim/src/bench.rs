//! Port-level bring-up bench
//!
//! [`PortBench`] drives a board only through the packed `ui_in`/`uio_in`
//! ports and observes `uo_out`, with the timing of the silicon bring-up
//! bench: 1 us of select setup and hold, 500 ns per clock phase. The two
//! check sequences, [`basic_checks`] and [`host_switching_checks`], mirror
//! what that bench verifies on a freshly reset part.

use flashraid_core::controller::ControllerConfig;
use flashraid_core::mgmt::{OP_READ, OP_WRITE};
use flashraid_core::pins::tt::{
    self, UIO_FLASH0_MISO, UIO_MGMT_MOSI, UI_MGMT_CS_N, UI_MGMT_SCLK, UI_MH_CS_N, UI_SH_CS_N,
};
use flashraid_core::regs::CONTROL_ADDR;

use crate::board::{us_to_cycles, Board, BoardConfig};
use crate::error::Result;

/// `ui_in` with every select released
pub const IDLE_UI: u8 = (1 << UI_MGMT_CS_N) | (1 << UI_SH_CS_N) | (1 << UI_MH_CS_N);
/// `uio_in` with flash0 MISO high and flash1 MISO low
pub const IDLE_UIO: u8 = 1 << UIO_FLASH0_MISO;

/// Board driven through its packed ports
pub struct PortBench {
    board: Board,
    ui_in: u8,
    uio_in: u8,
}

impl PortBench {
    /// Build a bench whose flashes hold MISO at the idle pattern
    pub fn new(controller: ControllerConfig) -> Result<Self> {
        let board = Board::new(BoardConfig {
            controller,
            miso_pattern: Some([true, false]),
            trace: true,
            ..BoardConfig::default()
        })?;
        Ok(Self {
            board,
            ui_in: 0,
            uio_in: 0,
        })
    }

    /// The board under test
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Current `uo_out`
    pub fn uo_out(&self) -> u8 {
        self.board.tt_outputs().0
    }

    /// Whether the select of flash `0` or `1` is asserted
    pub fn flash_selected(&self, flash: usize) -> bool {
        let bit = if flash == 0 {
            tt::UO_FLASH0_CS_N
        } else {
            tt::UO_FLASH1_CS_N
        };
        (self.uo_out() >> bit) & 1 == 0
    }

    /// Run the data plane
    pub fn clock_cycles(&mut self, cycles: u64) {
        self.board.run(cycles);
    }

    fn wait_ns(&mut self, ns: u64) {
        self.board.run(ns * us_to_cycles(1) / 1000);
    }

    fn apply(&mut self) {
        self.board.apply_tt_inputs(self.ui_in, self.uio_in);
    }

    fn set_ui(&mut self, bit: u8, high: bool) {
        if high {
            self.ui_in |= 1 << bit;
        } else {
            self.ui_in &= !(1 << bit);
        }
        self.apply();
    }

    fn set_uio(&mut self, bit: u8, high: bool) {
        if high {
            self.uio_in |= 1 << bit;
        } else {
            self.uio_in &= !(1 << bit);
        }
        self.apply();
    }

    /// Drive every input low and pulse reset
    pub fn reset(&mut self) {
        self.ui_in = 0;
        self.uio_in = 0;
        self.apply();
        self.board.reset(10);
        self.clock_cycles(10);
    }

    /// Release every select and set the idle MISO pattern
    pub fn setup_idle(&mut self) {
        self.ui_in = IDLE_UI;
        self.uio_in = IDLE_UIO;
        self.apply();
        self.clock_cycles(5);
    }

    /// Assert or release the main host select
    pub fn set_main_select(&mut self, selected: bool) {
        self.set_ui(UI_MH_CS_N, !selected);
    }

    /// Assert or release the secondary host select
    pub fn set_secondary_select(&mut self, selected: bool) {
        self.set_ui(UI_SH_CS_N, !selected);
    }

    /// Send one management frame
    ///
    /// With `data` the frame is a write and `None` is returned; without it
    /// the third byte is clocked in from MISO.
    pub fn mgmt_command(&mut self, cmd: u8, addr: u8, data: Option<u8>) -> Option<u8> {
        self.set_ui(UI_MGMT_CS_N, false);
        self.wait_ns(1000);

        self.send_byte(cmd);
        self.send_byte(addr);
        let result = match data {
            Some(value) => {
                self.send_byte(value);
                None
            }
            None => Some(self.recv_byte()),
        };

        self.set_ui(UI_MGMT_CS_N, true);
        self.wait_ns(1000);
        result
    }

    /// Write a register
    pub fn write_register(&mut self, addr: u8, value: u8) {
        self.mgmt_command(OP_WRITE, addr, Some(value));
    }

    /// Read a register
    pub fn read_register(&mut self, addr: u8) -> u8 {
        self.mgmt_command(OP_READ, addr, None).unwrap_or(0)
    }

    fn send_byte(&mut self, byte: u8) {
        for i in (0..8).rev() {
            self.set_uio(UIO_MGMT_MOSI, (byte >> i) & 1 != 0);
            self.wait_ns(500);
            self.set_ui(UI_MGMT_SCLK, true);
            self.wait_ns(500);
            self.set_ui(UI_MGMT_SCLK, false);
            self.wait_ns(500);
        }
    }

    fn recv_byte(&mut self) -> u8 {
        let mut value = 0u8;
        for _ in 0..8 {
            self.set_uio(UIO_MGMT_MOSI, false);
            self.wait_ns(500);
            self.set_ui(UI_MGMT_SCLK, true);
            self.wait_ns(500);
            let miso = (self.uo_out() >> tt::UO_MGMT_MISO) & 1;
            value = (value << 1) | miso;
            self.set_ui(UI_MGMT_SCLK, false);
            self.wait_ns(500);
        }
        value
    }
}

/// Outcome of one bench check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    /// What was checked
    pub name: &'static str,
    /// Whether it held
    pub passed: bool,
    /// Observed values
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, passed: bool, detail: String) -> Self {
        if passed {
            log::info!("{}: ok ({})", name, detail);
        } else {
            log::error!("{}: FAILED ({})", name, detail);
        }
        Self { name, passed, detail }
    }
}

/// Register access, range programming and mirrored selects
pub fn basic_checks(config: ControllerConfig) -> Result<Vec<Check>> {
    let mut bench = PortBench::new(config)?;
    let mut checks = Vec::new();

    bench.reset();
    bench.setup_idle();

    let control = bench.read_register(CONTROL_ADDR);
    checks.push(Check::new(
        "control resets to zero",
        control == 0x00,
        format!("read 0x{:02X}", control),
    ));

    bench.write_register(CONTROL_ADDR, 0x42);
    bench.clock_cycles(10);
    let control = bench.read_register(CONTROL_ADDR);
    checks.push(Check::new(
        "control write reads back",
        control == 0x42,
        format!("read 0x{:02X}", control),
    ));

    for (addr, value) in [0x00, 0x00, 0x00, 0x7F, 0xFF, 0xFF].into_iter().enumerate() {
        bench.write_register(addr as u8, value);
    }
    let mut range = [0u8; 6];
    for (addr, byte) in range.iter_mut().enumerate() {
        *byte = bench.read_register(addr as u8);
    }
    let start = u32::from_be_bytes([0, range[0], range[1], range[2]]);
    let end = u32::from_be_bytes([0, range[3], range[4], range[5]]);
    checks.push(Check::new(
        "range 0 reads back",
        start == 0x000000 && end == 0x7FFFFF,
        format!("0x{:06X}-0x{:06X}", start, end),
    ));

    bench.write_register(CONTROL_ADDR, 0x06);
    bench.clock_cycles(20);
    let control = bench.read_register(CONTROL_ADDR);
    checks.push(Check::new(
        "share mode with range 0",
        control == 0x06,
        format!("read 0x{:02X}", control),
    ));

    bench.set_main_select(true);
    bench.clock_cycles(5);
    let selected = [bench.flash_selected(0), bench.flash_selected(1)];
    checks.push(Check::new(
        "main host selects both flashes",
        selected == [true, true],
        format!("selects {:?}", selected),
    ));
    bench.set_main_select(false);
    bench.clock_cycles(5);

    Ok(checks)
}

/// Main host access, then a switch to the secondary host
pub fn host_switching_checks(config: ControllerConfig) -> Result<Vec<Check>> {
    let mut bench = PortBench::new(config)?;
    let mut checks = Vec::new();

    bench.reset();
    bench.setup_idle();

    bench.write_register(CONTROL_ADDR, 0x02);
    bench.clock_cycles(10);

    bench.set_main_select(true);
    bench.clock_cycles(5);
    let selected = bench.flash_selected(0);
    checks.push(Check::new(
        "main host reaches flash0",
        selected,
        format!("flash0 selected = {}", selected),
    ));
    bench.set_main_select(false);
    bench.clock_cycles(5);

    bench.write_register(CONTROL_ADDR, 0x42);
    bench.clock_cycles(20);

    bench.set_secondary_select(true);
    bench.clock_cycles(5);
    let selected = bench.flash_selected(0);
    checks.push(Check::new(
        "secondary host reaches flash0",
        selected,
        format!("flash0 selected = {}", selected),
    ));
    bench.set_secondary_select(false);
    bench.clock_cycles(5);

    for (addr, value) in [(0x03, 0x7F), (0x04, 0xFF), (0x05, 0xFF)] {
        bench.write_register(addr, value);
    }
    bench.write_register(CONTROL_ADDR, 0x46);
    bench.clock_cycles(20);

    bench.set_secondary_select(true);
    bench.clock_cycles(5);
    let selected = [bench.flash_selected(0), bench.flash_selected(1)];
    checks.push(Check::new(
        "secondary host selects both flashes",
        selected == [true, true],
        format!("selects {:?}", selected),
    ));
    bench.set_secondary_select(false);
    bench.clock_cycles(5);

    bench.set_main_select(true);
    bench.clock_cycles(5);
    let selected = [bench.flash_selected(0), bench.flash_selected(1)];
    let miso = bench.uo_out() & 1 != 0;
    checks.push(Check::new(
        "main host locked out",
        selected == [false, false] && miso,
        format!("selects {:?}, miso {}", selected, miso as u8),
    ));
    bench.set_main_select(false);
    bench.clock_cycles(5);

    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_all_pass(checks: &[Check]) {
        for check in checks {
            assert!(check.passed, "{}: {}", check.name, check.detail);
        }
    }

    #[test]
    fn test_basic_checks() {
        let checks = basic_checks(ControllerConfig::default()).unwrap();
        assert_eq!(checks.len(), 5);
        assert_all_pass(&checks);
    }

    #[test]
    fn test_host_switching_checks() {
        let checks = host_switching_checks(ControllerConfig::default()).unwrap();
        assert_eq!(checks.len(), 4);
        assert_all_pass(&checks);
    }

    #[test]
    fn test_idle_ports_hold_selects_high() {
        let mut bench = PortBench::new(ControllerConfig::default()).unwrap();
        bench.reset();
        bench.setup_idle();
        assert!(!bench.flash_selected(0));
        assert!(!bench.flash_selected(1));
        // Management MISO idles low outside a read
        assert_eq!((bench.uo_out() >> tt::UO_MGMT_MISO) & 1, 0);
    }

    #[test]
    fn test_secondary_denied_before_switch() {
        let mut bench = PortBench::new(ControllerConfig::default()).unwrap();
        bench.reset();
        bench.setup_idle();

        bench.set_secondary_select(true);
        bench.clock_cycles(10);
        assert!(!bench.flash_selected(0));
        assert!(!bench.flash_selected(1));
        // Denied host sees MISO high
        assert_eq!(bench.uo_out() & 0b10, 0b10);
    }

    #[test]
    fn test_bench_trace_is_glitch_free() {
        let mut bench = PortBench::new(ControllerConfig::default()).unwrap();
        bench.reset();
        bench.setup_idle();
        bench.write_register(CONTROL_ADDR, 0x06);
        bench.clock_cycles(20);
        bench.set_main_select(true);
        bench.clock_cycles(50);
        bench.set_main_select(false);
        bench.clock_cycles(10);

        let trace = bench.board().trace().unwrap();
        assert!(trace.is_glitch_free());
    }
}
