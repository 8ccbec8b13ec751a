//! SPI types and command structures
//!
//! Host-side representation of a flash transaction and the JEDEC opcodes
//! used to drive the flash devices behind the controller.

mod address;
mod command;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::SpiCommand;
pub use opcodes::*;
