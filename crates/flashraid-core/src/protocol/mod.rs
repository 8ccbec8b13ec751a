//! SPI flash protocol implementations
//!
//! Command sequences issued by a host through any [`crate::programmer::SpiMaster`].

pub mod spi25;

pub use spi25::*;
