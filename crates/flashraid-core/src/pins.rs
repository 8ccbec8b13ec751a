//! Pin-level signal bundles
//!
//! Every SPI channel of the controller is modelled as a small bundle of
//! levels. Chip selects are active low, as on the wire.

use core::fmt;

/// Upstream host interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "lowercase"))]
pub enum HostId {
    /// Main host
    Main,
    /// Secondary host
    Secondary,
}

impl HostId {
    /// Both hosts, in priority order
    pub const ALL: [HostId; 2] = [HostId::Main, HostId::Secondary];

    /// Index into per-host arrays
    pub const fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Secondary => 1,
        }
    }

    /// The flash device a host owns when redundancy is off
    pub const fn home_flash(self) -> FlashId {
        match self {
            Self::Main => FlashId::Primary,
            Self::Secondary => FlashId::Secondary,
        }
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostId::Main => write!(f, "main"),
            HostId::Secondary => write!(f, "secondary"),
        }
    }
}

/// Downstream flash interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashId {
    /// Primary flash, also the MISO source in mirror mode
    Primary,
    /// Secondary (mirror) flash
    Secondary,
}

impl FlashId {
    /// Both flash devices
    pub const ALL: [FlashId; 2] = [FlashId::Primary, FlashId::Secondary];

    /// Index into per-flash arrays
    pub const fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    /// Look up a flash by index (0 or 1)
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Primary),
            1 => Some(Self::Secondary),
            _ => None,
        }
    }
}

impl fmt::Display for FlashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashId::Primary => write!(f, "flash0"),
            FlashId::Secondary => write!(f, "flash1"),
        }
    }
}

/// Management channel inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MgmtPins {
    /// Chip select, active low
    pub cs_n: bool,
    /// Serial clock
    pub sclk: bool,
    /// Data from the management host
    pub mosi: bool,
}

impl Default for MgmtPins {
    fn default() -> Self {
        Self {
            cs_n: true,
            sclk: false,
            mosi: false,
        }
    }
}

/// Host channel inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPins {
    /// Chip select, active low
    pub cs_n: bool,
    /// Serial clock
    pub sclk: bool,
    /// Data from the host
    pub mosi: bool,
}

impl HostPins {
    /// Idle bus: deselected, clock low
    pub const fn idle() -> Self {
        Self {
            cs_n: true,
            sclk: false,
            mosi: false,
        }
    }

    /// Selected bus with the clock parked low
    pub const fn selected() -> Self {
        Self {
            cs_n: false,
            sclk: false,
            mosi: false,
        }
    }

    /// Whether chip select is asserted
    pub const fn is_selected(&self) -> bool {
        !self.cs_n
    }
}

impl Default for HostPins {
    fn default() -> Self {
        Self::idle()
    }
}

/// Flash channel outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashPins {
    /// Chip select, active low
    pub cs_n: bool,
    /// Serial clock
    pub sclk: bool,
    /// Data towards the flash
    pub mosi: bool,
}

impl FlashPins {
    /// Deselected flash: clock and data held low
    pub const fn idle() -> Self {
        Self {
            cs_n: true,
            sclk: false,
            mosi: false,
        }
    }

    /// Whether chip select is asserted
    pub const fn is_selected(&self) -> bool {
        !self.cs_n
    }
}

impl Default for FlashPins {
    fn default() -> Self {
        Self::idle()
    }
}

/// Packed port layout of the Tiny Tapeout wrapper
///
/// | Port | Bit | Signal |
/// |---|---|---|
/// | `ui_in` | 0 | main host SCLK |
/// | `ui_in` | 1 | main host CS# |
/// | `ui_in` | 2 | main host MOSI |
/// | `ui_in` | 3 | secondary host SCLK |
/// | `ui_in` | 4 | secondary host CS# |
/// | `ui_in` | 5 | secondary host MOSI |
/// | `ui_in` | 6 | management SCLK |
/// | `ui_in` | 7 | management CS# |
/// | `uio_in` | 0 | management MOSI |
/// | `uio_in` | 1 | flash0 MISO |
/// | `uio_in` | 2 | flash1 MISO |
/// | `uo_out` | 0 | main host MISO |
/// | `uo_out` | 1 | secondary host MISO |
/// | `uo_out` | 2 | management MISO |
/// | `uo_out` | 3 | flash0 SCLK |
/// | `uo_out` | 4 | flash0 CS# |
/// | `uo_out` | 5 | flash0 MOSI |
/// | `uo_out` | 6 | flash1 SCLK |
/// | `uo_out` | 7 | flash1 CS# |
/// | `uio_out` | 3 | flash1 MOSI |
pub mod tt {
    use super::{FlashPins, HostPins, MgmtPins};

    /// Bit of `ui_in` carrying the main host SCLK
    pub const UI_MH_SCLK: u8 = 0;
    /// Bit of `ui_in` carrying the main host CS#
    pub const UI_MH_CS_N: u8 = 1;
    /// Bit of `ui_in` carrying the main host MOSI
    pub const UI_MH_MOSI: u8 = 2;
    /// Bit of `ui_in` carrying the secondary host SCLK
    pub const UI_SH_SCLK: u8 = 3;
    /// Bit of `ui_in` carrying the secondary host CS#
    pub const UI_SH_CS_N: u8 = 4;
    /// Bit of `ui_in` carrying the secondary host MOSI
    pub const UI_SH_MOSI: u8 = 5;
    /// Bit of `ui_in` carrying the management SCLK
    pub const UI_MGMT_SCLK: u8 = 6;
    /// Bit of `ui_in` carrying the management CS#
    pub const UI_MGMT_CS_N: u8 = 7;
    /// Bit of `uio_in` carrying the management MOSI
    pub const UIO_MGMT_MOSI: u8 = 0;
    /// Bit of `uio_in` carrying flash0 MISO
    pub const UIO_FLASH0_MISO: u8 = 1;
    /// Bit of `uio_in` carrying flash1 MISO
    pub const UIO_FLASH1_MISO: u8 = 2;

    /// Bit of `uo_out` carrying the management MISO
    pub const UO_MGMT_MISO: u8 = 2;
    /// Bit of `uo_out` carrying flash0 CS#
    pub const UO_FLASH0_CS_N: u8 = 4;
    /// Bit of `uo_out` carrying flash1 CS#
    pub const UO_FLASH1_CS_N: u8 = 7;

    /// Unpacked input ports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Inputs {
        /// Management channel
        pub mgmt: MgmtPins,
        /// Host channels (main, secondary)
        pub hosts: [HostPins; 2],
        /// Flash MISO levels (flash0, flash1)
        pub flash_miso: [bool; 2],
    }

    #[inline]
    fn bit(value: u8, n: u8) -> bool {
        (value >> n) & 1 != 0
    }

    /// Split `ui_in`/`uio_in` into pin bundles
    pub fn unpack_inputs(ui_in: u8, uio_in: u8) -> Inputs {
        Inputs {
            mgmt: MgmtPins {
                cs_n: bit(ui_in, UI_MGMT_CS_N),
                sclk: bit(ui_in, UI_MGMT_SCLK),
                mosi: bit(uio_in, UIO_MGMT_MOSI),
            },
            hosts: [
                HostPins {
                    sclk: bit(ui_in, UI_MH_SCLK),
                    cs_n: bit(ui_in, UI_MH_CS_N),
                    mosi: bit(ui_in, UI_MH_MOSI),
                },
                HostPins {
                    sclk: bit(ui_in, UI_SH_SCLK),
                    cs_n: bit(ui_in, UI_SH_CS_N),
                    mosi: bit(ui_in, UI_SH_MOSI),
                },
            ],
            flash_miso: [bit(uio_in, UIO_FLASH0_MISO), bit(uio_in, UIO_FLASH1_MISO)],
        }
    }

    /// Pack pin bundles into `ui_in`/`uio_in`
    pub fn pack_inputs(inputs: &Inputs) -> (u8, u8) {
        let [main, secondary] = inputs.hosts;
        let ui_in = (main.sclk as u8) << UI_MH_SCLK
            | (main.cs_n as u8) << UI_MH_CS_N
            | (main.mosi as u8) << UI_MH_MOSI
            | (secondary.sclk as u8) << UI_SH_SCLK
            | (secondary.cs_n as u8) << UI_SH_CS_N
            | (secondary.mosi as u8) << UI_SH_MOSI
            | (inputs.mgmt.sclk as u8) << UI_MGMT_SCLK
            | (inputs.mgmt.cs_n as u8) << UI_MGMT_CS_N;
        let uio_in = (inputs.mgmt.mosi as u8) << UIO_MGMT_MOSI
            | (inputs.flash_miso[0] as u8) << UIO_FLASH0_MISO
            | (inputs.flash_miso[1] as u8) << UIO_FLASH1_MISO;
        (ui_in, uio_in)
    }

    /// Pack controller outputs into `uo_out`/`uio_out`
    pub fn pack_outputs(flash: &[FlashPins; 2], host_miso: [bool; 2], mgmt_miso: bool) -> (u8, u8) {
        let uo_out = (host_miso[0] as u8)
            | (host_miso[1] as u8) << 1
            | (mgmt_miso as u8) << UO_MGMT_MISO
            | (flash[0].sclk as u8) << 3
            | (flash[0].cs_n as u8) << UO_FLASH0_CS_N
            | (flash[0].mosi as u8) << 5
            | (flash[1].sclk as u8) << 6
            | (flash[1].cs_n as u8) << UO_FLASH1_CS_N;
        let uio_out = (flash[1].mosi as u8) << 3;
        (uo_out, uio_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_inputs_match_harness_pattern() {
        // All three selects high, flash0 MISO high, flash1 MISO low
        let inputs = tt::unpack_inputs((1 << 7) | (1 << 4) | (1 << 1), 1 << 1);
        assert!(inputs.mgmt.cs_n);
        assert!(inputs.hosts[0].cs_n);
        assert!(inputs.hosts[1].cs_n);
        assert_eq!(inputs.flash_miso, [true, false]);
        assert_eq!(tt::pack_inputs(&inputs), ((1 << 7) | (1 << 4) | (1 << 1), 1 << 1));
    }

    #[test]
    fn test_input_bit_positions() {
        let inputs = tt::unpack_inputs(1 << tt::UI_SH_MOSI, 1 << tt::UIO_MGMT_MOSI);
        assert!(inputs.hosts[1].mosi);
        assert!(!inputs.hosts[0].mosi);
        assert!(inputs.mgmt.mosi);
        assert_eq!(inputs.flash_miso, [false, false]);
    }

    #[test]
    fn test_pack_outputs_select_bits() {
        let mut flash = [FlashPins::idle(); 2];
        flash[0].cs_n = false;
        let (uo_out, _) = tt::pack_outputs(&flash, [true, true], false);
        assert_eq!((uo_out >> tt::UO_FLASH0_CS_N) & 1, 0);
        assert_eq!((uo_out >> tt::UO_FLASH1_CS_N) & 1, 1);
    }

    #[test]
    fn test_home_flash() {
        assert_eq!(HostId::Main.home_flash(), FlashId::Primary);
        assert_eq!(HostId::Secondary.home_flash(), FlashId::Secondary);
        assert_eq!(FlashId::from_index(1), Some(FlashId::Secondary));
        assert_eq!(FlashId::from_index(2), None);
    }
}
