//! Standard JEDEC SPI flash opcodes
//!
//! The subset understood by the in-memory flash model and issued by the
//! host-side protocol helpers.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Data access - 3-byte address
// ============================================================================

/// Read Data
pub const READ: u8 = 0x03;
/// Page Program with 3-byte address
pub const PP: u8 = 0x02;

// ============================================================================
// Erase commands
// ============================================================================

/// Sector Erase 4KB with 3-byte address
pub const SE_20: u8 = 0x20;
/// Chip Erase (entire chip)
pub const CE_60: u8 = 0x60;
/// Chip Erase (alternate opcode)
pub const CE_C7: u8 = 0xC7;

// ============================================================================
// Status register bits
// ============================================================================

/// Status Register 1: Write In Progress
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;

// ============================================================================
// Geometry
// ============================================================================

/// Page size for page program
pub const PAGE_SIZE: usize = 256;
/// Sector size erased by [`SE_20`]
pub const SECTOR_SIZE: usize = 4096;
