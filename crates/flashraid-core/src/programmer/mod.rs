//! Host-side SPI master abstractions
//!
//! These traits are implemented by whatever drives a host channel of the
//! controller. The simulation board implements both on top of the model's
//! pins, so the [`crate::protocol`] helpers run unchanged against it.

pub mod bitbang;
mod traits;

pub use bitbang::BitbangSpiMaster;
pub use traits::*;
