//! flashraid-sim - Board-level simulation of the flashraid controller
//!
//! This crate wires a [`flashraid_core::controller::Controller`] to two
//! pin-level flash models and provides drivers for its three SPI channels:
//!
//! - [`Board`] - the controller plus both flashes, clocked together
//! - [`MgmtPort`] / [`HostPort`] - bitbang drivers for the management
//!   channel and the two hosts
//! - [`Scenario`] - TOML-described step sequences with expectations
//! - [`bench`] - the packed-port bring-up checks
//! - [`Trace`] - per-cycle chip-select recording and glitch detection

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bench;
pub mod board;
pub mod config;
pub mod error;
pub mod port;
pub mod scenario;
pub mod trace;

pub use board::{Board, BoardConfig};
pub use config::SimConfig;
pub use error::{Result, SimError};
pub use port::{HostPort, MgmtPort};
pub use scenario::{Scenario, ScenarioReport};
pub use trace::Trace;
