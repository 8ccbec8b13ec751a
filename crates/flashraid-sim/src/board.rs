//! Controller wired to two flash models
//!
//! The board owns the controller and one [`FlashModel`] per flash channel.
//! Whenever an input changes or the data plane is clocked, the controller's
//! flash pins are fed into the models and the models' MISO levels back into
//! the controller, so the whole board is consistent at every step.

use flashraid_core::controller::{Controller, ControllerConfig, ControllerOutputs};
use flashraid_core::pins::{tt, FlashId, HostId, HostPins, MgmtPins};
use flashraid_dummy::{DummyConfig, FlashModel};

use crate::error::{Result, SimError};
use crate::trace::{Trace, TraceSample};

/// Data-plane clock in MHz
pub const DATA_CLOCK_MHZ: u64 = 50;
/// Default SPI half period in data-plane cycles (500 ns at 50 MHz)
pub const DEFAULT_HALF_PERIOD_CYCLES: u32 = 25;

/// Board build parameters
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Controller parameters
    pub controller: ControllerConfig,
    /// Geometry and identity of both flash models
    pub flash: DummyConfig,
    /// SPI half clock period of the host and management drivers, in cycles
    pub half_period_cycles: u32,
    /// Replace the flash models by fixed MISO levels (primary, secondary)
    pub miso_pattern: Option<[bool; 2]>,
    /// Record chip-select levels every cycle
    pub trace: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            flash: DummyConfig::with_size(1024 * 1024),
            half_period_cycles: DEFAULT_HALF_PERIOD_CYCLES,
            miso_pattern: None,
            trace: false,
        }
    }
}

/// Simulated board
#[derive(Debug, Clone)]
pub struct Board {
    controller: Controller,
    flashes: [FlashModel; 2],
    hosts: [HostPins; 2],
    half_period_cycles: u32,
    trace: Option<Trace>,
}

impl Board {
    /// Build a board out of reset
    ///
    /// The SPI half period must exceed the synchronizer latency, otherwise
    /// the arbiter cannot follow the host clock.
    pub fn new(config: BoardConfig) -> Result<Self> {
        let controller = Controller::new(config.controller)?;
        let min_half_period = config.controller.sync_stages as u32 + 2;
        if config.half_period_cycles < min_half_period {
            return Err(SimError::InvalidConfig(format!(
                "half period of {} cycles is below the minimum of {}",
                config.half_period_cycles, min_half_period
            )));
        }
        let flashes = match config.miso_pattern {
            Some([f0, f1]) => [
                FlashModel::with_miso_pattern(config.flash.clone(), f0),
                FlashModel::with_miso_pattern(config.flash, f1),
            ],
            None => [FlashModel::new(config.flash.clone()), FlashModel::new(config.flash)],
        };

        let mut board = Self {
            controller,
            flashes,
            hosts: [HostPins::idle(); 2],
            half_period_cycles: config.half_period_cycles,
            trace: config.trace.then(Trace::new),
        };
        board.propagate();
        Ok(board)
    }

    /// The controller
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Flash model on a channel
    pub fn flash(&self, flash: FlashId) -> &FlashModel {
        &self.flashes[flash.index()]
    }

    /// Mutable flash model on a channel
    pub fn flash_mut(&mut self, flash: FlashId) -> &mut FlashModel {
        &mut self.flashes[flash.index()]
    }

    /// Chip-select trace, if enabled
    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// SPI half period in cycles
    pub fn half_period(&self) -> u32 {
        self.half_period_cycles
    }

    /// Cycles a host waits between select and first clock, and after release
    ///
    /// Covers the select synchronizer plus the clock the arbiter needs to
    /// act on it.
    pub fn cs_setup_cycles(&self) -> u32 {
        self.half_period_cycles
    }

    /// Cycles after a register write until the new routing is in effect
    pub fn settle_cycles(&self) -> u32 {
        let config = self.controller.config();
        2 * config.sync_stages as u32 + config.switch_guard_cycles as u32 + 4
    }

    /// Set a host's pins; the flash channels follow immediately
    pub fn set_host(&mut self, host: HostId, pins: HostPins) {
        self.hosts[host.index()] = pins;
        self.controller.set_host(host, pins);
        self.propagate();
    }

    /// Current pins of a host
    pub fn host(&self, host: HostId) -> HostPins {
        self.hosts[host.index()]
    }

    /// Apply management pin levels
    pub fn drive_mgmt(&mut self, pins: MgmtPins) -> bool {
        self.controller.drive_mgmt(pins)
    }

    /// Controller outputs for the current inputs
    pub fn outputs(&self) -> ControllerOutputs {
        self.controller.outputs()
    }

    /// Advance the data plane by one cycle
    pub fn tick(&mut self) {
        self.controller.tick();
        self.propagate();

        if let Some(trace) = self.trace.as_mut() {
            let out = self.controller.outputs();
            trace.record(TraceSample {
                cycle: self.controller.cycles(),
                host_cs_n: [self.hosts[0].cs_n, self.hosts[1].cs_n],
                flash_cs_n: [out.flash[0].cs_n, out.flash[1].cs_n],
            });
        }
    }

    /// Advance the data plane by `cycles` cycles
    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    /// Hold reset for `cycles` cycles, then release it
    pub fn reset(&mut self, cycles: u32) {
        log::debug!("Board reset for {} cycles", cycles);
        self.controller.assert_reset();
        self.propagate();
        self.run(cycles as u64);
        self.controller.release_reset();
        self.propagate();
    }

    /// Apply Tiny Tapeout style packed inputs
    ///
    /// Host and management pins are taken from the ports. The flash MISO
    /// bits are ignored; the flash models drive those.
    pub fn apply_tt_inputs(&mut self, ui_in: u8, uio_in: u8) {
        let inputs = tt::unpack_inputs(ui_in, uio_in);
        self.drive_mgmt(inputs.mgmt);
        for host in HostId::ALL {
            self.set_host(host, inputs.hosts[host.index()]);
        }
    }

    /// Tiny Tapeout style packed outputs `(uo_out, uio_out)`
    pub fn tt_outputs(&self) -> (u8, u8) {
        let out = self.controller.outputs();
        tt::pack_outputs(&out.flash, out.host_miso, out.mgmt_miso)
    }

    fn propagate(&mut self) {
        let out = self.controller.outputs();
        for flash in FlashId::ALL {
            let miso = self.flashes[flash.index()].drive(out.flash[flash.index()]);
            self.controller.set_flash_miso(flash, miso);
        }
    }
}

/// Convert microseconds to data-plane cycles
pub fn us_to_cycles(us: u32) -> u64 {
    us as u64 * DATA_CLOCK_MHZ
}
