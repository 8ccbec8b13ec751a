//! Top-level controller
//!
//! [`Controller`] ties the management clock domain (register file and frame
//! decoder) to the data-plane clock domain (arbiter and flash mux) through
//! the snapshot CDC. The two domains have separate entry points:
//!
//! - [`Controller::drive_mgmt`] is called whenever a management pin changes
//! - [`Controller::tick`] advances the data plane by one clock cycle
//!
//! Host and flash MISO inputs are set with [`Controller::set_host`] and
//! [`Controller::set_flash_miso`]; [`Controller::outputs`] evaluates the
//! combinational outputs for the current inputs and state.

use crate::arbiter::{Arbiter, ArbiterState, DEFAULT_SWITCH_GUARD_CYCLES};
use crate::cdc::{CdcSink, CdcSource, DEFAULT_SYNC_STAGES, MAX_SYNC_STAGES, MIN_SYNC_STAGES};
use crate::error::{Error, Result};
use crate::mgmt::MgmtDecoder;
use crate::pins::{FlashId, FlashPins, HostId, HostPins, MgmtPins};
use crate::regs::RegisterFile;
use crate::view::SynchronizedView;

/// Controller build parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Flops per synchronizer chain (2 to 4)
    pub sync_stages: usize,
    /// Cycles without grants after the active host changes
    pub switch_guard_cycles: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sync_stages: DEFAULT_SYNC_STAGES,
            switch_guard_cycles: DEFAULT_SWITCH_GUARD_CYCLES,
        }
    }
}

impl ControllerConfig {
    /// Check the parameters are buildable
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SYNC_STAGES..=MAX_SYNC_STAGES).contains(&self.sync_stages) {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

/// Combinational outputs of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOutputs {
    /// Flash channel pins (primary, secondary)
    pub flash: [FlashPins; 2],
    /// MISO towards each host (main, secondary)
    pub host_miso: [bool; 2],
    /// Management channel MISO
    pub mgmt_miso: bool,
}

impl ControllerOutputs {
    /// Outputs while reset is held
    fn reset_state() -> Self {
        Self {
            flash: [FlashPins::idle(); 2],
            host_miso: [true; 2],
            mgmt_miso: false,
        }
    }
}

/// Dual-host, dual-flash redundancy controller
#[derive(Debug, Clone)]
pub struct Controller {
    config: ControllerConfig,
    regs: RegisterFile,
    decoder: MgmtDecoder,
    source: CdcSource,
    sink: CdcSink,
    arbiter: Arbiter,
    hosts: [HostPins; 2],
    flash_miso: [bool; 2],
    in_reset: bool,
    cycles: u64,
}

impl Default for Controller {
    fn default() -> Self {
        Self::build(ControllerConfig::default())
    }
}

impl Controller {
    /// Create a controller out of reset
    pub fn new(config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ControllerConfig) -> Self {
        Self {
            config,
            regs: RegisterFile::new(),
            decoder: MgmtDecoder::new(),
            source: CdcSource::new(config.sync_stages),
            sink: CdcSink::new(config.sync_stages),
            arbiter: Arbiter::new(config.sync_stages, config.switch_guard_cycles),
            hosts: [HostPins::idle(); 2],
            flash_miso: [true; 2],
            in_reset: false,
            cycles: 0,
        }
    }

    /// Build parameters
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Apply new management pin levels
    ///
    /// Returns true when this edge completed a WRITE frame. Ignored while
    /// reset is asserted.
    pub fn drive_mgmt(&mut self, pins: MgmtPins) -> bool {
        if self.in_reset {
            return false;
        }

        let Some(write) = self.decoder.drive(pins, &mut self.regs) else {
            return false;
        };
        if write.applied {
            self.source.publish(self.regs.snapshot());
        }
        true
    }

    /// Set the pin levels driven by a host
    pub fn set_host(&mut self, host: HostId, pins: HostPins) {
        self.hosts[host.index()] = pins;
    }

    /// Set the MISO level driven by a flash device
    pub fn set_flash_miso(&mut self, flash: FlashId, level: bool) {
        self.flash_miso[flash.index()] = level;
    }

    /// Advance the data plane by one clock cycle
    pub fn tick(&mut self) {
        self.cycles += 1;
        if self.in_reset {
            return;
        }

        if let Some(view) = self.sink.tick(&self.source) {
            self.arbiter.offer_view(view);
        }
        self.source.sample_ack(self.sink.ack());

        let before = *self.arbiter.state();
        self.arbiter.tick(&self.hosts);
        let after = self.arbiter.state();
        if before.session().map(|(host, _)| host) != after.session().map(|(host, _)| host) {
            log::trace!("cycle {}: arbiter {:?} -> {:?}", self.cycles, before, after);
        }
    }

    /// Evaluate the outputs for the current inputs
    pub fn outputs(&self) -> ControllerOutputs {
        if self.in_reset {
            return ControllerOutputs::reset_state();
        }

        let routed = self.arbiter.outputs(&self.hosts, self.flash_miso);
        ControllerOutputs {
            flash: routed.flash,
            host_miso: routed.host_miso,
            mgmt_miso: self.decoder.miso(),
        }
    }

    /// Assert reset, returning every block to its reset state
    pub fn assert_reset(&mut self) {
        if !self.in_reset {
            log::debug!("Reset asserted at cycle {}", self.cycles);
        }
        self.in_reset = true;
        self.regs.reset();
        self.decoder.reset();
        self.source.reset();
        self.sink.reset();
        self.arbiter.reset();
    }

    /// Release reset
    pub fn release_reset(&mut self) {
        if self.in_reset {
            log::debug!("Reset released at cycle {}", self.cycles);
        }
        self.in_reset = false;
    }

    /// Pulse reset for `cycles` clocks
    pub fn reset(&mut self, cycles: u32) {
        self.assert_reset();
        for _ in 0..cycles {
            self.tick();
        }
        self.release_reset();
    }

    /// Whether reset is currently asserted
    pub fn in_reset(&self) -> bool {
        self.in_reset
    }

    /// View the arbiter routes with
    pub fn view(&self) -> &SynchronizedView {
        self.arbiter.view()
    }

    /// Management-side register file
    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    /// Arbiter state
    pub fn arbiter_state(&self) -> &ArbiterState {
        self.arbiter.state()
    }

    /// Data-plane cycles since construction
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
