//! Configuration registers
//!
//! This module holds the management-domain state of the controller: the
//! control byte, the address ranges, the fixed address map that exposes them
//! over the management channel, and the register file that owns them.

mod control;
mod file;
mod map;
mod range;

pub use control::{ControlBits, ControlView};
pub use file::{RegisterFile, RegisterSnapshot, UNMAPPED_READ_VALUE};
pub use map::{ByteLane, RegField, CONTROL_ADDR, RANGE_BLOCK_LEN};
pub use range::{AddressRange, ADDRESS_MASK, RANGE_COUNT};
