//! Host arbitration and flash multiplexing
//!
//! The arbiter is an explicit state machine clocked by the data-plane clock:
//!
//! ```text
//!            host selected (synchronized)
//!   Idle  ---------------------------------->  MainActive / SecondaryActive
//!     ^                                              |
//!     +---------- host deselected -------------------+
//! ```
//!
//! On entering an active state the host is compared against the configured
//! active host. A mismatch yields a [`Grant::Denied`] session: nothing the
//! host does reaches either flash until it lets go of its select.
//!
//! A granted session carries a [`Route`]. With share mode off, a host talks
//! to its own flash. With share mode on and no range enabled, every host
//! talks to the primary flash. With share mode on and a range enabled, both
//! flashes are selected on entry; the arbiter snoops the command byte and
//! the 24-bit address that follows, and drops the mirror once the address
//! turns out to lie outside every enabled range. The mirror's clock is held
//! low for the last address bit until that decision is made, so a mirror
//! that gets dropped never sees a complete command and aborts it. This
//! requires a host SCLK half period longer than the synchronizer latency.
//!
//! Configuration changes are only adopted while idle, so the route of a
//! transaction never changes under the host. When the active host changes,
//! grants are held off for a guard period so the hand-over is
//! break-before-make.

use bitflags::bitflags;

use crate::cdc::SyncChain;
use crate::pins::{FlashId, FlashPins, HostId, HostPins};
use crate::regs::ADDRESS_MASK;
use crate::spi::AddressWidth;
use crate::view::SynchronizedView;

/// Default number of cycles grants are held off after a host switch
pub const DEFAULT_SWITCH_GUARD_CYCLES: u16 = 8;

bitflags! {
    /// Set of flash chip selects driven by a route
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FlashSelect: u8 {
        /// Primary flash selected
        const PRIMARY   = 1 << 0;
        /// Secondary flash selected
        const SECONDARY = 1 << 1;
    }
}

impl FlashSelect {
    /// Select bit of a single flash
    pub const fn of(flash: FlashId) -> Self {
        match flash {
            FlashId::Primary => Self::PRIMARY,
            FlashId::Secondary => Self::SECONDARY,
        }
    }
}

/// Where a granted host's traffic goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Flash devices receiving SCLK/MOSI and a chip select
    pub select: FlashSelect,
    /// Flash whose MISO is relayed back to the host
    pub miso_from: FlashId,
}

impl Route {
    /// Route to a single flash
    pub const fn single(flash: FlashId) -> Self {
        Self {
            select: FlashSelect::of(flash),
            miso_from: flash,
        }
    }

    /// Route to both flashes, reading back from the primary
    pub const fn mirrored() -> Self {
        Self {
            select: FlashSelect::PRIMARY.union(FlashSelect::SECONDARY),
            miso_from: FlashId::Primary,
        }
    }

    /// Whether more than one flash is selected
    pub fn is_mirrored(&self) -> bool {
        self.select.bits().count_ones() > 1
    }

    /// Whether `flash` is selected by this route
    pub fn targets(&self, flash: FlashId) -> bool {
        self.select.contains(FlashSelect::of(flash))
    }
}

/// Outcome of arbitration for a host session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Host is not the configured active host
    Denied,
    /// Host owns the flash bus
    Granted(Route),
}

/// Shift register following the command byte and 24-bit address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct AddressSnoop {
    shift: u32,
    bits: u8,
}

impl AddressSnoop {
    /// Command byte plus three address bytes
    const HEADER_BITS: u8 = AddressWidth::ThreeByte.header_bits();

    fn sample(&mut self, mosi: bool) -> Option<u32> {
        self.shift = (self.shift << 1) | mosi as u32;
        self.bits += 1;
        (self.bits == Self::HEADER_BITS).then_some(self.shift & ADDRESS_MASK)
    }

    fn awaiting_last_bit(&self) -> bool {
        self.bits == Self::HEADER_BITS - 1
    }
}

/// State kept for the host currently holding the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Arbitration outcome
    pub grant: Grant,
    /// Address seen in the transaction header, once complete
    pub address: Option<u32>,
    snoop: Option<AddressSnoop>,
}

impl Session {
    fn denied() -> Self {
        Self {
            grant: Grant::Denied,
            address: None,
            snoop: None,
        }
    }

    fn granted(route: Route, snoop: bool) -> Self {
        Self {
            grant: Grant::Granted(route),
            address: None,
            snoop: snoop.then(AddressSnoop::default),
        }
    }

    /// Route, if the session was granted
    pub fn route(&self) -> Option<Route> {
        match self.grant {
            Grant::Granted(route) => Some(route),
            Grant::Denied => None,
        }
    }

    /// Whether the mirror clock is held pending the address decision
    pub fn mirror_clock_held(&self) -> bool {
        self.snoop.is_some_and(|snoop| snoop.awaiting_last_bit())
    }
}

/// Arbiter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArbiterState {
    /// No host holds the bus
    #[default]
    Idle,
    /// Main host holds the bus
    MainActive(Session),
    /// Secondary host holds the bus
    SecondaryActive(Session),
}

impl ArbiterState {
    fn active(host: HostId, session: Session) -> Self {
        match host {
            HostId::Main => Self::MainActive(session),
            HostId::Secondary => Self::SecondaryActive(session),
        }
    }

    /// Whether no host holds the bus
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Host holding the bus and its session
    pub fn session(&self) -> Option<(HostId, &Session)> {
        match self {
            Self::Idle => None,
            Self::MainActive(session) => Some((HostId::Main, session)),
            Self::SecondaryActive(session) => Some((HostId::Secondary, session)),
        }
    }

    /// Host holding a granted session
    pub fn granted_host(&self) -> Option<HostId> {
        self.session()
            .filter(|(_, session)| session.route().is_some())
            .map(|(host, _)| host)
    }
}

/// Combinational outputs of the arbiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbiterOutputs {
    /// Flash channel pins (primary, secondary)
    pub flash: [FlashPins; 2],
    /// MISO towards each host (main, secondary)
    pub host_miso: [bool; 2],
}

impl Default for ArbiterOutputs {
    fn default() -> Self {
        Self {
            flash: [FlashPins::idle(); 2],
            // Undriven MISO reads back as all ones
            host_miso: [true; 2],
        }
    }
}

/// Host pins after synchronization into the data plane
#[derive(Debug, Clone, Copy, Default)]
struct Sampled {
    selected: bool,
    sclk_rise: bool,
    mosi: bool,
}

/// Per-host input synchronizers
#[derive(Debug, Clone)]
struct HostSync {
    cs: SyncChain,
    sclk: SyncChain,
    mosi: SyncChain,
    prev_sclk: bool,
}

impl HostSync {
    fn new(stages: usize) -> Self {
        Self {
            cs: SyncChain::new(stages),
            sclk: SyncChain::new(stages),
            mosi: SyncChain::new(stages),
            prev_sclk: false,
        }
    }

    fn clock(&mut self, pins: &HostPins) -> Sampled {
        let selected = self.cs.clock(pins.is_selected());
        let sclk = self.sclk.clock(pins.sclk);
        let mosi = self.mosi.clock(pins.mosi);
        let sclk_rise = sclk && !self.prev_sclk;
        self.prev_sclk = sclk;
        Sampled {
            selected,
            sclk_rise,
            mosi,
        }
    }
}

/// Host arbitration and flash mux state machine
#[derive(Debug, Clone)]
pub struct Arbiter {
    state: ArbiterState,
    view: SynchronizedView,
    pending_view: Option<SynchronizedView>,
    guard: u16,
    guard_cycles: u16,
    sync: [HostSync; 2],
    stages: usize,
}

impl Arbiter {
    /// Create an idle arbiter operating on the reset view
    pub fn new(stages: usize, guard_cycles: u16) -> Self {
        Self {
            state: ArbiterState::Idle,
            view: SynchronizedView::default(),
            pending_view: None,
            guard: 0,
            guard_cycles,
            sync: [HostSync::new(stages), HostSync::new(stages)],
            stages,
        }
    }

    /// Return to `Idle` with the reset view
    pub fn reset(&mut self) {
        *self = Self::new(self.stages, self.guard_cycles);
    }

    /// Current state
    pub fn state(&self) -> &ArbiterState {
        &self.state
    }

    /// View used for routing decisions
    pub fn view(&self) -> &SynchronizedView {
        &self.view
    }

    /// Remaining cycles before grants resume after a host switch
    pub fn guard_remaining(&self) -> u16 {
        self.guard
    }

    /// Hand over a freshly captured view
    ///
    /// It takes effect on the next clock at which the arbiter is idle.
    pub fn offer_view(&mut self, view: SynchronizedView) {
        self.pending_view = Some(view);
    }

    /// Advance one data-plane clock
    pub fn tick(&mut self, hosts: &[HostPins; 2]) {
        let sampled = [self.sync[0].clock(&hosts[0]), self.sync[1].clock(&hosts[1])];

        if self.state.is_idle() {
            self.adopt_pending_view();
        }

        let state = core::mem::take(&mut self.state);
        self.state = self.next_state(state, &sampled);
        self.guard = self.guard.saturating_sub(1);
    }

    fn adopt_pending_view(&mut self) {
        let Some(view) = self.pending_view.take() else {
            return;
        };

        if view.control.active_host != self.view.control.active_host {
            log::debug!(
                "Active host switching {} -> {}, holding grants for {} cycles",
                self.view.control.active_host,
                view.control.active_host,
                self.guard_cycles
            );
            self.guard = self.guard_cycles;
        }
        log::trace!("Arbiter adopted view v{}", view.version);
        self.view = view;
    }

    fn next_state(&self, state: ArbiterState, sampled: &[Sampled; 2]) -> ArbiterState {
        match state {
            ArbiterState::Idle => self.arbitrate(sampled),
            ArbiterState::MainActive(session) => self
                .continue_session(HostId::Main, session, &sampled[0])
                .map_or(ArbiterState::Idle, ArbiterState::MainActive),
            ArbiterState::SecondaryActive(session) => self
                .continue_session(HostId::Secondary, session, &sampled[1])
                .map_or(ArbiterState::Idle, ArbiterState::SecondaryActive),
        }
    }

    fn arbitrate(&self, sampled: &[Sampled; 2]) -> ArbiterState {
        if self.guard > 0 {
            return ArbiterState::Idle;
        }

        let host = match (sampled[0].selected, sampled[1].selected) {
            (false, false) => return ArbiterState::Idle,
            (true, false) => HostId::Main,
            (false, true) => HostId::Secondary,
            (true, true) => {
                log::warn!("Both hosts selected in the same cycle, taking main host");
                HostId::Main
            }
        };

        ArbiterState::active(host, self.open_session(host))
    }

    fn open_session(&self, host: HostId) -> Session {
        let control = &self.view.control;
        if host != control.active_host {
            log::debug!("{} host denied, active host is {}", host, control.active_host);
            return Session::denied();
        }

        let session = if !control.share_mode {
            Session::granted(Route::single(host.home_flash()), false)
        } else if !control.any_range_enabled() {
            Session::granted(Route::single(FlashId::Primary), false)
        } else {
            Session::granted(Route::mirrored(), true)
        };
        log::debug!("{} host granted, route {:?}", host, session.grant);
        session
    }

    fn continue_session(&self, host: HostId, mut session: Session, sampled: &Sampled) -> Option<Session> {
        if !sampled.selected {
            log::debug!("{} host released the bus", host);
            return None;
        }

        if !sampled.sclk_rise {
            return Some(session);
        }

        let Some(address) = session.snoop.as_mut().and_then(|snoop| snoop.sample(sampled.mosi)) else {
            return Some(session);
        };

        session.snoop = None;
        session.address = Some(address);
        if self.view.matches(address) {
            log::debug!("Address 0x{:06X} in range, keeping mirror", address);
        } else {
            log::debug!("Address 0x{:06X} out of range, releasing mirror", address);
            session.grant = Grant::Granted(Route::single(FlashId::Primary));
        }
        Some(session)
    }

    /// Drive the flash channels and host MISO lines
    ///
    /// Chip selects follow the live host select, so a host letting go
    /// drops every flash select without waiting for the synchronizer.
    pub fn outputs(&self, hosts: &[HostPins; 2], flash_miso: [bool; 2]) -> ArbiterOutputs {
        let mut out = ArbiterOutputs::default();

        let Some((host, session)) = self.state.session() else {
            return out;
        };
        let Some(route) = session.route() else {
            return out;
        };
        let pins = &hosts[host.index()];
        if !pins.is_selected() {
            return out;
        }

        let held = session.mirror_clock_held();
        for flash in FlashId::ALL {
            if route.targets(flash) {
                out.flash[flash.index()] = FlashPins {
                    cs_n: false,
                    sclk: pins.sclk && !(held && flash != route.miso_from),
                    mosi: pins.mosi,
                };
            }
        }
        out.host_miso[host.index()] = flash_miso[route.miso_from.index()];
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdc::DEFAULT_SYNC_STAGES;
    use crate::regs::RegisterFile;

    fn view_with(writes: &[(u8, u8)]) -> SynchronizedView {
        let mut regs = RegisterFile::new();
        for &(addr, value) in writes {
            regs.write(addr, value);
        }
        SynchronizedView::from_snapshot(&regs.snapshot(), 1)
    }

    fn settle(arb: &mut Arbiter, hosts: &[HostPins; 2], cycles: usize) {
        for _ in 0..cycles {
            arb.tick(hosts);
        }
    }

    fn selects(arb: &Arbiter, hosts: &[HostPins; 2]) -> [bool; 2] {
        let out = arb.outputs(hosts, [true, false]);
        [out.flash[0].is_selected(), out.flash[1].is_selected()]
    }

    /// Clock one byte on `host`, holding each level for a few cycles
    fn clock_byte(arb: &mut Arbiter, hosts: &mut [HostPins; 2], host: HostId, byte: u8) {
        for i in (0..8).rev() {
            let pins = &mut hosts[host.index()];
            pins.sclk = false;
            pins.mosi = (byte >> i) & 1 != 0;
            settle(arb, hosts, 4);
            hosts[host.index()].sclk = true;
            settle(arb, hosts, 4);
        }
        hosts[host.index()].sclk = false;
        settle(arb, hosts, 4);
    }

    fn ready(view: SynchronizedView) -> Arbiter {
        let mut arb = Arbiter::new(DEFAULT_SYNC_STAGES, DEFAULT_SWITCH_GUARD_CYCLES);
        arb.offer_view(view);
        let idle = [HostPins::idle(); 2];
        settle(&mut arb, &idle, 16);
        arb
    }

    #[test]
    fn test_reset_routes_main_to_primary() {
        let mut arb = ready(SynchronizedView::default());
        let hosts = [HostPins::selected(), HostPins::idle()];
        settle(&mut arb, &hosts, 4);
        assert_eq!(arb.state().granted_host(), Some(HostId::Main));
        assert_eq!(selects(&arb, &hosts), [true, false]);
    }

    #[test]
    fn test_secondary_denied_by_default() {
        let mut arb = ready(SynchronizedView::default());
        let hosts = [HostPins::idle(), HostPins::selected()];
        settle(&mut arb, &hosts, 4);
        assert!(matches!(arb.state(), ArbiterState::SecondaryActive(s) if s.grant == Grant::Denied));
        assert_eq!(selects(&arb, &hosts), [false, false]);
        assert!(arb.outputs(&hosts, [false, false]).host_miso[1]);
    }

    #[test]
    fn test_dual_mode_secondary_owns_its_flash() {
        let mut arb = ready(view_with(&[(0x0C, 0x40)]));
        let hosts = [HostPins::idle(), HostPins::selected()];
        settle(&mut arb, &hosts, 4);
        assert_eq!(selects(&arb, &hosts), [false, true]);
        let out = arb.outputs(&hosts, [true, false]);
        assert!(!out.host_miso[1]);
    }

    #[test]
    fn test_share_without_ranges_uses_primary() {
        let mut arb = ready(view_with(&[(0x0C, 0x42)]));
        let hosts = [HostPins::idle(), HostPins::selected()];
        settle(&mut arb, &hosts, 4);
        assert_eq!(selects(&arb, &hosts), [true, false]);
    }

    #[test]
    fn test_share_range_mirrors_on_entry() {
        let view = view_with(&[(0x03, 0x7F), (0x04, 0xFF), (0x05, 0xFF), (0x0C, 0x06)]);
        let mut arb = ready(view);
        let hosts = [HostPins::selected(), HostPins::idle()];
        settle(&mut arb, &hosts, 5);
        assert_eq!(selects(&arb, &hosts), [true, true]);
    }

    #[test]
    fn test_mirror_kept_in_range() {
        let view = view_with(&[(0x03, 0x7F), (0x04, 0xFF), (0x05, 0xFF), (0x0C, 0x06)]);
        let mut arb = ready(view);
        let mut hosts = [HostPins::selected(), HostPins::idle()];
        settle(&mut arb, &hosts, 4);
        for byte in [0x03, 0x12, 0x34, 0x56] {
            clock_byte(&mut arb, &mut hosts, HostId::Main, byte);
        }
        assert_eq!(selects(&arb, &hosts), [true, true]);
        let (_, session) = arb.state().session().unwrap();
        assert_eq!(session.address, Some(0x123456));
    }

    #[test]
    fn test_mirror_released_out_of_range() {
        let view = view_with(&[(0x03, 0x7F), (0x04, 0xFF), (0x05, 0xFF), (0x0C, 0x06)]);
        let mut arb = ready(view);
        let mut hosts = [HostPins::selected(), HostPins::idle()];
        settle(&mut arb, &hosts, 4);
        for byte in [0x03, 0x80, 0x00, 0x00] {
            clock_byte(&mut arb, &mut hosts, HostId::Main, byte);
        }
        assert_eq!(selects(&arb, &hosts), [true, false]);
        assert_eq!(arb.state().session().unwrap().1.address, Some(0x800000));
    }

    #[test]
    fn test_mirror_clock_held_for_last_address_bit() {
        let view = view_with(&[(0x03, 0x7F), (0x04, 0xFF), (0x05, 0xFF), (0x0C, 0x06)]);
        let mut arb = ready(view);
        let mut hosts = [HostPins::selected(), HostPins::idle()];
        settle(&mut arb, &hosts, 4);
        for byte in [0x20, 0x80, 0x00] {
            clock_byte(&mut arb, &mut hosts, HostId::Main, byte);
        }
        // 31 bits of the header
        for i in (1..8).rev() {
            hosts[0].mosi = (0x00u8 >> i) & 1 != 0;
            settle(&mut arb, &hosts, 4);
            hosts[0].sclk = true;
            settle(&mut arb, &hosts, 4);
            hosts[0].sclk = false;
        }
        settle(&mut arb, &hosts, 4);
        assert!(arb.state().session().unwrap().1.mirror_clock_held());

        hosts[0].sclk = true;
        let out = arb.outputs(&hosts, [true, true]);
        assert!(out.flash[0].sclk);
        assert!(!out.flash[1].sclk);

        settle(&mut arb, &hosts, 4);
        assert_eq!(selects(&arb, &hosts), [true, false]);
    }

    #[test]
    fn test_grant_exclusivity() {
        let mut arb = ready(view_with(&[(0x0C, 0x00)]));
        let mut hosts = [HostPins::selected(), HostPins::idle()];
        settle(&mut arb, &hosts, 4);
        let before = arb.outputs(&hosts, [true, false]);

        hosts[1] = HostPins::selected();
        hosts[1].sclk = true;
        settle(&mut arb, &hosts, 8);
        assert_eq!(arb.outputs(&hosts, [true, false]), before);
        assert_eq!(arb.state().granted_host(), Some(HostId::Main));

        // Main lets go; secondary is not the active host and gets denied
        hosts[0] = HostPins::idle();
        settle(&mut arb, &hosts, 4);
        assert!(matches!(arb.state(), ArbiterState::SecondaryActive(s) if s.grant == Grant::Denied));
        assert_eq!(selects(&arb, &hosts), [false, false]);
    }

    #[test]
    fn test_deselect_drops_flash_immediately() {
        let mut arb = ready(SynchronizedView::default());
        let mut hosts = [HostPins::selected(), HostPins::idle()];
        settle(&mut arb, &hosts, 4);
        assert_eq!(selects(&arb, &hosts), [true, false]);

        hosts[0] = HostPins::idle();
        // No clock has elapsed yet
        assert_eq!(selects(&arb, &hosts), [false, false]);
        settle(&mut arb, &hosts, 4);
        assert!(arb.state().is_idle());
    }

    #[test]
    fn test_view_adopted_only_when_idle() {
        let mut arb = ready(SynchronizedView::default());
        let hosts = [HostPins::selected(), HostPins::idle()];
        settle(&mut arb, &hosts, 4);

        arb.offer_view(view_with(&[(0x0C, 0x40)]));
        settle(&mut arb, &hosts, 20);
        assert_eq!(arb.state().granted_host(), Some(HostId::Main));
        assert_eq!(arb.view().control.active_host, HostId::Main);

        let idle = [HostPins::idle(); 2];
        settle(&mut arb, &idle, 4);
        assert_eq!(arb.view().control.active_host, HostId::Secondary);
    }

    #[test]
    fn test_host_switch_is_break_before_make() {
        let mut arb = ready(SynchronizedView::default());
        arb.offer_view(view_with(&[(0x0C, 0x40)]));
        let hosts = [HostPins::idle(), HostPins::selected()];

        let mut granted_at = None;
        for cycle in 0..40 {
            arb.tick(&hosts);
            if arb.state().granted_host().is_some() {
                granted_at = Some(cycle);
                break;
            }
            assert_eq!(selects(&arb, &hosts), [false, false]);
        }
        let granted_at = granted_at.expect("secondary never granted");
        assert!(granted_at >= DEFAULT_SWITCH_GUARD_CYCLES as usize);
        assert!(granted_at < 20);
    }

    #[test]
    fn test_simultaneous_select_takes_main() {
        let mut arb = ready(SynchronizedView::default());
        let hosts = [HostPins::selected(), HostPins::selected()];
        settle(&mut arb, &hosts, 4);
        assert_eq!(arb.state().granted_host(), Some(HostId::Main));
    }

    #[test]
    fn test_relay_follows_host_clock() {
        let mut arb = ready(SynchronizedView::default());
        let mut hosts = [HostPins::selected(), HostPins::idle()];
        settle(&mut arb, &hosts, 4);
        hosts[0].sclk = true;
        hosts[0].mosi = true;
        let out = arb.outputs(&hosts, [false, true]);
        assert!(out.flash[0].sclk && out.flash[0].mosi);
        assert!(!out.flash[1].sclk && !out.flash[1].mosi);
        assert!(!out.host_miso[0]);
    }
}
