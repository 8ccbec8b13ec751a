//! flashraid-core - Model of a dual-host, dual-flash redundancy controller
//!
//! The controller sits between two upstream SPI hosts and two downstream SPI
//! flash devices. A small register file, programmed over a dedicated
//! management SPI channel, decides per access which flash device(s) see a
//! host's command stream.
//!
//! Every component is modelled at clock-edge granularity:
//!
//! - [`regs`] - control register, address ranges and the register file
//! - [`mgmt`] - management SPI frame decoder (management clock domain)
//! - [`cdc`] - clock-domain crossing of register snapshots
//! - [`matcher`] - address range matching
//! - [`arbiter`] - host arbitration and flash mux state machine
//! - [`controller`] - the top level tying both clock domains together
//!
//! The [`programmer`], [`spi`] and [`protocol`] modules hold the host-side
//! pieces used to drive the model: a bitbang SPI master abstraction and the
//! JEDEC command helpers that run on top of it.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc` and serde
//!   derives for configuration types)
//! - `alloc` - Enable heap allocation for the buffered `SpiMaster` helper
//!
//! # Example
//!
//! ```ignore
//! use flashraid_core::controller::{Controller, ControllerConfig};
//! use flashraid_core::pins::{HostId, HostPins};
//!
//! let mut ctl = Controller::new(ControllerConfig::default())?;
//! ctl.set_host(HostId::Main, HostPins::selected());
//! for _ in 0..4 {
//!     ctl.tick();
//! }
//! assert!(!ctl.outputs().flash[0].cs_n);
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod arbiter;
pub mod cdc;
pub mod controller;
pub mod error;
pub mod matcher;
pub mod mgmt;
pub mod pins;
pub mod programmer;
pub mod protocol;
pub mod regs;
pub mod spi;
pub mod view;

pub use error::{Error, Result};
