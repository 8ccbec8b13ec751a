//! Programmer trait definitions

use crate::error::Result;
use crate::spi::SpiCommand;

/// Executes whole SPI commands against a flash
///
/// Implemented by the simulator's host ports, which clock each command
/// through the controller, and by the in-memory flash itself.
pub trait SpiMaster {
    /// Largest read phase accepted in one command
    fn max_read_len(&self) -> usize;

    /// Largest write phase accepted in one command
    fn max_write_len(&self) -> usize;

    /// Run one chip-select cycle: header, write data, then read data
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()>;

    /// Let `us` microseconds pass
    fn delay_us(&mut self, us: u32);
}

/// Flatten a command into one write buffer for a full-duplex transfer
///
/// `transfer_fn` receives header plus write data, and the command's read
/// buffer to fill afterwards.
///
/// # Example
///
/// ```ignore
/// fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<()> {
///     default_execute(cmd, |write_data, read_buf| {
///         self.transaction(write_data, read_buf);
///         Ok(())
///     })
/// }
/// ```
#[cfg(feature = "alloc")]
pub fn default_execute<F>(cmd: &mut SpiCommand<'_>, transfer_fn: F) -> Result<()>
where
    F: FnOnce(&[u8], &mut [u8]) -> Result<()>,
{
    let header_len = cmd.header_len();
    let mut write_data = alloc::vec![0u8; header_len + cmd.write_data.len()];
    cmd.encode_header(&mut write_data);
    write_data[header_len..].copy_from_slice(cmd.write_data);

    transfer_fn(&write_data, cmd.read_buf)
}
