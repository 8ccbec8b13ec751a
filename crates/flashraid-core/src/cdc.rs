//! Clock-domain crossing of register snapshots
//!
//! Synchronizing every register bit through its own flop chain would let
//! the data plane see a mix of old and new bits while the chains settle.
//! Instead the management side parks a complete [`RegisterSnapshot`] in a
//! holding register and flips a request toggle. Only the toggle crosses
//! through a flop chain; when the data side sees it change it copies the
//! whole holding register in a single clock and answers with an
//! acknowledge toggle.
//!
//! The holding register is not touched while a request is outstanding. A
//! commit arriving in that window is kept aside and published once the
//! acknowledge comes back, so the newest write always lands.

use crate::regs::RegisterSnapshot;
use crate::view::SynchronizedView;

/// Default number of flops in each synchronizer chain
pub const DEFAULT_SYNC_STAGES: usize = 2;
/// Shortest supported synchronizer chain
pub const MIN_SYNC_STAGES: usize = 2;
/// Longest supported synchronizer chain
pub const MAX_SYNC_STAGES: usize = 4;

/// Multi-flop synchronizer for a single bit
#[derive(Debug, Clone)]
pub struct SyncChain {
    flops: [bool; MAX_SYNC_STAGES],
    len: usize,
}

impl SyncChain {
    /// Create a chain of `len` flops, clamped to the supported range
    pub fn new(len: usize) -> Self {
        Self {
            flops: [false; MAX_SYNC_STAGES],
            len: len.clamp(MIN_SYNC_STAGES, MAX_SYNC_STAGES),
        }
    }

    /// Clock `input` into the chain and return the synchronized output
    pub fn clock(&mut self, input: bool) -> bool {
        self.flops.copy_within(0..self.len - 1, 1);
        self.flops[0] = input;
        self.output()
    }

    /// Synchronized output
    pub fn output(&self) -> bool {
        self.flops[self.len - 1]
    }

    /// Number of flops
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a chain has at least two flops
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Management side of the crossing
#[derive(Debug, Clone)]
pub struct CdcSource {
    holding: RegisterSnapshot,
    req: bool,
    ack_sync: SyncChain,
    deferred: Option<RegisterSnapshot>,
}

impl CdcSource {
    /// Create an idle source
    pub fn new(stages: usize) -> Self {
        Self {
            holding: RegisterSnapshot::default(),
            req: false,
            ack_sync: SyncChain::new(stages),
            deferred: None,
        }
    }

    /// Offer a new snapshot to the data plane
    pub fn publish(&mut self, snapshot: RegisterSnapshot) {
        if self.pending() {
            log::trace!("CDC busy, deferring snapshot");
            self.deferred = Some(snapshot);
            return;
        }
        self.holding = snapshot;
        self.req = !self.req;
        log::trace!("CDC request toggled to {}", self.req as u8);
    }

    /// Whether a published snapshot has not been acknowledged yet
    pub fn pending(&self) -> bool {
        self.req != self.ack_sync.output() || self.deferred.is_some()
    }

    /// Sample the acknowledge toggle from the data side
    pub fn sample_ack(&mut self, ack: bool) {
        self.ack_sync.clock(ack);
        if self.req == self.ack_sync.output() {
            if let Some(snapshot) = self.deferred.take() {
                self.holding = snapshot;
                self.req = !self.req;
                log::trace!("CDC publishing deferred snapshot");
            }
        }
    }

    /// Request toggle as seen on the wire
    pub fn request(&self) -> bool {
        self.req
    }

    /// Holding register contents
    pub fn holding(&self) -> &RegisterSnapshot {
        &self.holding
    }

    /// Return to the reset state
    pub fn reset(&mut self) {
        *self = Self::new(self.ack_sync.len());
    }
}

/// Data-plane side of the crossing
#[derive(Debug, Clone)]
pub struct CdcSink {
    req_sync: SyncChain,
    ack: bool,
    view: SynchronizedView,
}

impl CdcSink {
    /// Create a sink holding the reset view
    pub fn new(stages: usize) -> Self {
        Self {
            req_sync: SyncChain::new(stages),
            ack: false,
            view: SynchronizedView::default(),
        }
    }

    /// Advance one data-plane clock
    ///
    /// Returns the new view when a snapshot was captured on this edge.
    pub fn tick(&mut self, source: &CdcSource) -> Option<SynchronizedView> {
        let req = self.req_sync.clock(source.request());
        if req == self.ack {
            return None;
        }

        let version = self.view.version.wrapping_add(1);
        self.view = SynchronizedView::from_snapshot(source.holding(), version);
        self.ack = req;
        log::debug!(
            "CDC captured view v{}: control=0x{:02X}",
            version,
            self.view.raw_control()
        );
        Some(self.view)
    }

    /// Acknowledge toggle as seen on the wire
    pub fn ack(&self) -> bool {
        self.ack
    }

    /// Current synchronized view
    pub fn view(&self) -> &SynchronizedView {
        &self.view
    }

    /// Return to the reset state
    pub fn reset(&mut self) {
        *self = Self::new(self.req_sync.len());
    }
}
