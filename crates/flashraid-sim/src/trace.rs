//! Per-cycle recording of chip-select levels

use flashraid_core::pins::FlashId;

/// Chip-select levels after one data-plane cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSample {
    /// Cycle number
    pub cycle: u64,
    /// Host chip selects (main, secondary), active low
    pub host_cs_n: [bool; 2],
    /// Flash chip selects (primary, secondary), active low
    pub flash_cs_n: [bool; 2],
}

/// A flash select that was asserted again after being released inside the
/// same host transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glitch {
    /// Cycle of the second assertion
    pub cycle: u64,
    /// Affected flash
    pub flash: FlashId,
}

/// Chip-select trace
#[derive(Debug, Clone, Default)]
pub struct Trace {
    samples: Vec<TraceSample>,
}

impl Trace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample
    pub fn record(&mut self, sample: TraceSample) {
        self.samples.push(sample);
    }

    /// Recorded samples
    pub fn samples(&self) -> &[TraceSample] {
        &self.samples
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of cycles in which `flash` was selected
    pub fn selected_cycles(&self, flash: FlashId) -> usize {
        self.samples
            .iter()
            .filter(|s| !s.flash_cs_n[flash.index()])
            .count()
    }

    /// Find flash selects that toggle more than once within a transaction
    ///
    /// A transaction spans the cycles in which at least one host holds its
    /// select. Within it each flash select may go active once and inactive
    /// once; a second activation is a glitch.
    pub fn glitches(&self) -> Vec<Glitch> {
        let mut glitches = Vec::new();
        let mut prev_flash = [true; 2];
        let mut released = [false; 2];

        for sample in &self.samples {
            let in_transaction = sample.host_cs_n.iter().any(|&cs_n| !cs_n);
            if !in_transaction {
                released = [false; 2];
            }

            for flash in FlashId::ALL {
                let i = flash.index();
                let now = sample.flash_cs_n[i];
                match (prev_flash[i], now) {
                    (false, true) if in_transaction => released[i] = true,
                    (true, false) if released[i] => glitches.push(Glitch {
                        cycle: sample.cycle,
                        flash,
                    }),
                    _ => {}
                }
                prev_flash[i] = now;
            }
        }
        glitches
    }

    /// Whether no glitch was recorded
    pub fn is_glitch_free(&self) -> bool {
        self.glitches().is_empty()
    }
}
