//! Scenario runner
//!
//! A scenario resets a fresh board, programs the initial registers over the
//! management channel, then runs its steps in order. Expectation mismatches
//! and host-side errors are collected as failures instead of aborting, so a
//! report always covers every step.

use std::fmt;
use std::path::Path;

use flashraid_core::pins::{FlashId, HostPins};
use flashraid_core::protocol;
use flashraid_core::regs::{ByteLane, RegField, CONTROL_ADDR};

use crate::board::Board;
use crate::config::{SimConfig, Step};
use crate::error::{Result, SimError};
use crate::port::{HostPort, MgmtPort};

/// A step that did not go as expected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Step index, or the step count for end-of-run checks
    pub index: usize,
    /// Step kind
    pub kind: &'static str,
    /// What went wrong
    pub message: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({}): {}", self.index, self.kind, self.message)
    }
}

/// Outcome of a scenario run
#[derive(Debug, Clone, Default)]
pub struct ScenarioReport {
    /// Steps executed
    pub steps_run: usize,
    /// Data-plane cycles simulated, including reset and setup
    pub cycles: u64,
    /// Failed steps
    pub failures: Vec<StepFailure>,
}

impl ScenarioReport {
    /// Whether every step passed
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn the first failure into an error
    pub fn into_result(self) -> Result<Self> {
        match self.failures.first() {
            None => Ok(self),
            Some(failure) => Err(SimError::Expectation {
                index: failure.index,
                step: failure.kind.to_string(),
                message: failure.message.clone(),
            }),
        }
    }
}

/// A loaded scenario
#[derive(Debug, Clone)]
pub struct Scenario {
    config: SimConfig,
}

impl Scenario {
    /// Wrap a parsed configuration
    pub fn new(config: SimConfig) -> Self {
        Self { config }
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(SimConfig::from_toml_file(path)?))
    }

    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(Self::new(SimConfig::from_toml_str(content)?))
    }

    /// Scenario configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Build a board, reset it and program the initial registers
    pub fn build_board(&self) -> Result<Board> {
        let mut board = Board::new(self.config.board_config())?;
        board.reset(self.config.controller.reset_cycles);

        let registers = &self.config.registers;
        if !registers.range.is_empty() || registers.control.is_some() {
            let mut mgmt = MgmtPort::new(&mut board);
            for range in &registers.range {
                for lane in ByteLane::ALL {
                    let start = RegField::RangeStart {
                        range: range.index,
                        lane,
                    };
                    let end = RegField::RangeEnd {
                        range: range.index,
                        lane,
                    };
                    mgmt.write_register(start.address(), lane.extract(range.start));
                    mgmt.write_register(end.address(), lane.extract(range.end));
                }
            }
            if let Some(control) = registers.control {
                mgmt.write_register(CONTROL_ADDR, control);
            }
            let settle = board.settle_cycles() as u64;
            board.run(settle);
        }
        Ok(board)
    }

    /// Run on a fresh board
    pub fn run(&self) -> Result<ScenarioReport> {
        let mut board = self.build_board()?;
        Ok(self.run_on(&mut board))
    }

    /// Run the steps on an already prepared board
    pub fn run_on(&self, board: &mut Board) -> ScenarioReport {
        let mut report = ScenarioReport::default();

        for (index, step) in self.config.steps.iter().enumerate() {
            log::debug!("Step {}: {}", index, step.kind());
            if let Err(message) = run_step(board, step) {
                log::warn!("Step {} ({}) failed: {}", index, step.kind(), message);
                report.failures.push(StepFailure {
                    index,
                    kind: step.kind(),
                    message,
                });
            }
            report.steps_run += 1;
        }

        if let Some(trace) = board.trace() {
            for glitch in trace.glitches() {
                report.failures.push(StepFailure {
                    index: self.config.steps.len(),
                    kind: "trace",
                    message: format!("{} select glitched at cycle {}", glitch.flash, glitch.cycle),
                });
            }
        }

        report.cycles = board.controller().cycles();
        report
    }
}

fn run_step(board: &mut Board, step: &Step) -> std::result::Result<(), String> {
    match step {
        Step::HostWrite { host, address, data } => {
            let mut port = HostPort::new(board, *host).checked();
            protocol::write_3b(&mut port, *address, data).map_err(|e| e.to_string())
        }
        Step::HostRead {
            host,
            address,
            len,
            expect,
        } => {
            let mut buf = vec![0u8; *len];
            let mut port = HostPort::new(board, *host).checked();
            protocol::read_3b(&mut port, *address, &mut buf).map_err(|e| e.to_string())?;
            compare_bytes(expect.as_deref(), &buf)
        }
        Step::HostErase { host, address } => {
            let mut port = HostPort::new(board, *host).checked();
            protocol::sector_erase(&mut port, *address).map_err(|e| e.to_string())
        }
        Step::HostSelect { host, selected } => {
            let pins = if *selected {
                HostPins::selected()
            } else {
                HostPins::idle()
            };
            board.set_host(*host, pins);
            let setup = board.cs_setup_cycles() as u64;
            board.run(setup);
            Ok(())
        }
        Step::ExpectSelect { selected } => {
            let out = board.outputs();
            let actual = [out.flash[0].is_selected(), out.flash[1].is_selected()];
            if actual != *selected {
                return Err(format!("expected selects {:?}, got {:?}", selected, actual));
            }
            Ok(())
        }
        Step::MgmtWrite { address, value } => {
            MgmtPort::new(board).write_register(*address, *value);
            Ok(())
        }
        Step::MgmtRead { address, expect } => {
            let value = MgmtPort::new(board).read_register(*address);
            match expect {
                Some(expected) if *expected != value => Err(format!(
                    "register 0x{:02X}: expected 0x{:02X}, read 0x{:02X}",
                    address, expected, value
                )),
                _ => Ok(()),
            }
        }
        Step::Wait { cycles } => {
            board.run(*cycles);
            Ok(())
        }
        Step::Reset { cycles } => {
            board.reset(*cycles);
            Ok(())
        }
        Step::ExpectFlash {
            flash,
            address,
            data,
        } => {
            let id = FlashId::from_index(*flash).ok_or_else(|| format!("no flash {}", flash))?;
            let contents = board.flash(id).flash().data();
            let start = *address as usize;
            let actual = contents
                .get(start..start + data.len())
                .ok_or_else(|| format!("0x{:06X}+{} is outside {}", address, data.len(), id))?;
            compare_bytes(Some(data.as_slice()), actual)
        }
    }
}

fn compare_bytes(expect: Option<&[u8]>, actual: &[u8]) -> std::result::Result<(), String> {
    match expect {
        Some(expected) if expected != actual => Err(format!("expected {:02X?}, got {:02X?}", expected, actual)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardConfig;
    use flashraid_core::error::Error;
    use flashraid_core::pins::HostId;

    const MIRROR_RANGE: &str = r#"
        [board]
        trace = true

        [registers]
        control = 0x06
        [[registers.range]]
        index = 0
        start = 0x000000
        end = 0x00FFFF
    "#;

    fn mirrored_board() -> Board {
        Scenario::from_toml_str(MIRROR_RANGE).unwrap().build_board().unwrap()
    }

    #[test]
    fn test_build_board_programs_registers() {
        let board = mirrored_board();
        assert_eq!(board.controller().view().raw_control(), 0x06);
        assert_eq!(board.controller().registers().range(0).unwrap().end, 0x00FFFF);
        assert!(board.controller().arbiter_state().is_idle());
    }

    #[test]
    fn test_mirrored_program_reaches_both_flashes() {
        let mut board = mirrored_board();
        {
            let mut port = HostPort::new(&mut board, HostId::Main).checked();
            protocol::write_3b(&mut port, 0x001000, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
            let mut buf = [0u8; 4];
            protocol::read_3b(&mut port, 0x001000, &mut buf).unwrap();
            assert_eq!(buf, [0xDE, 0xAD, 0xBE, 0xEF]);
        }
        for flash in FlashId::ALL {
            assert_eq!(&board.flash(flash).flash().data()[0x1000..0x1004], &[0xDE, 0xAD, 0xBE, 0xEF]);
        }
        assert!(board.trace().unwrap().is_glitch_free());
    }

    #[test]
    fn test_out_of_range_erase_spares_secondary() {
        let mut board = mirrored_board();
        for flash in FlashId::ALL {
            board.flash_mut(flash).flash_mut().data_mut()[0x20000..0x20004].copy_from_slice(&[1, 2, 3, 4]);
        }

        let mut port = HostPort::new(&mut board, HostId::Main).checked();
        protocol::sector_erase(&mut port, 0x020000).unwrap();

        assert_eq!(&board.flash(FlashId::Primary).flash().data()[0x20000..0x20004], &[0xFF; 4]);
        assert_eq!(&board.flash(FlashId::Secondary).flash().data()[0x20000..0x20004], &[1, 2, 3, 4]);
        assert!(board.trace().unwrap().is_glitch_free());
    }

    #[test]
    fn test_denied_host_not_granted() {
        let mut board = Board::new(BoardConfig::default()).unwrap();
        board.reset(10);
        let mut port = HostPort::new(&mut board, HostId::Secondary).checked();
        assert_eq!(protocol::read_jedec_id(&mut port), Err(Error::NotGranted));
    }

    #[test]
    fn test_dual_mode_keeps_hosts_apart() {
        let report = Scenario::from_toml_str(
            r#"
            [registers]
            control = 0x40

            [[step]]
            kind = "host-write"
            host = "secondary"
            address = 0x100
            data = [0x5A]

            [[step]]
            kind = "expect-flash"
            flash = 1
            address = 0x100
            data = [0x5A]

            [[step]]
            kind = "expect-flash"
            flash = 0
            address = 0x100
            data = [0xFF]
            "#,
        )
        .unwrap()
        .run()
        .unwrap();

        assert!(report.passed(), "{:?}", report.failures);
        assert_eq!(report.steps_run, 3);
    }

    #[test]
    fn test_scenario_reports_mismatch() {
        let report = Scenario::from_toml_str(
            r#"
            [[step]]
            kind = "mgmt-read"
            address = 0x0C
            expect = 0x01

            [[step]]
            kind = "host-select"
            host = "main"
            selected = true

            [[step]]
            kind = "expect-select"
            selected = [true, false]
            "#,
        )
        .unwrap()
        .run()
        .unwrap();

        assert_eq!(report.steps_run, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 0);
        assert_eq!(report.failures[0].kind, "mgmt-read");
        assert!(matches!(
            report.into_result(),
            Err(SimError::Expectation { index: 0, .. })
        ));
    }

    #[test]
    fn test_scenario_host_switch() {
        let report = Scenario::from_toml_str(
            r#"
            [[step]]
            kind = "host-erase"
            host = "secondary"
            address = 0x0

            [[step]]
            kind = "mgmt-write"
            address = 0x0C
            value = 0x42

            [[step]]
            kind = "wait"
            cycles = 40

            [[step]]
            kind = "host-write"
            host = "secondary"
            address = 0x10
            data = [0x11, 0x22]

            [[step]]
            kind = "host-read"
            host = "secondary"
            address = 0x10
            len = 2
            expect = [0x11, 0x22]

            [[step]]
            kind = "expect-flash"
            flash = 0
            address = 0x10
            data = [0x11, 0x22]
            "#,
        )
        .unwrap()
        .run()
        .unwrap();

        // Only the erase before the switch is refused
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, "host-erase");
        assert_eq!(report.steps_run, 6);
    }

    #[test]
    fn test_bundled_scenarios_pass() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../scenarios");
        for name in ["mirror.toml", "host-switch.toml"] {
            let report = Scenario::from_file(dir.join(name)).unwrap().run().unwrap();
            assert!(report.passed(), "{}: {:?}", name, report.failures);
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Scenario::from_file("/nonexistent/scenario.toml").unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
    }
}
