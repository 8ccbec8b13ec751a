//! SPI25 protocol implementation
//!
//! This module implements the common SPI flash command sequences
//! as defined by JEDEC, restricted to single I/O and 3-byte addressing.

use crate::error::{Error, Result};
use crate::programmer::SpiMaster;
use crate::spi::{opcodes, AddressWidth, SpiCommand};

/// Read the JEDEC ID from a flash chip
///
/// Returns (manufacturer_id, device_id) on success.
pub fn read_jedec_id<M: SpiMaster + ?Sized>(master: &mut M) -> Result<(u8, u16)> {
    let mut buf = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut buf);
    master.execute(&mut cmd)?;

    let manufacturer = buf[0];
    let device = ((buf[1] as u16) << 8) | (buf[2] as u16);

    Ok((manufacturer, device))
}

/// Read the status register 1
pub fn read_status1<M: SpiMaster + ?Sized>(master: &mut M) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(opcodes::RDSR, &mut buf);
    master.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Send the Write Enable command
pub fn write_enable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    master.execute(&mut cmd)
}

/// Send the Write Disable command
pub fn write_disable<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WRDI);
    master.execute(&mut cmd)
}

/// Check if the Write Enable Latch is set
pub fn check_wel<M: SpiMaster + ?Sized>(master: &mut M) -> Result<bool> {
    let status = read_status1(master)?;
    Ok(status & opcodes::SR1_WEL != 0)
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// # Arguments
/// * `poll_delay_us` - Delay in microseconds between status register polls
/// * `timeout_us` - Maximum time to wait before returning Error::Timeout
pub fn wait_ready<M: SpiMaster + ?Sized>(master: &mut M, poll_delay_us: u32, timeout_us: u32) -> Result<()> {
    let max_polls = if poll_delay_us > 0 {
        timeout_us / poll_delay_us
    } else {
        timeout_us
    }
    .max(1);

    for _ in 0..max_polls {
        let status = read_status1(master)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
        if poll_delay_us > 0 {
            master.delay_us(poll_delay_us);
        }
    }

    Err(Error::Timeout)
}

fn check_address(addr: u32, len: usize) -> Result<()> {
    let end = addr as u64 + len as u64;
    if end > AddressWidth::ThreeByte.max_size() as u64 {
        return Err(Error::AddressOutOfBounds);
    }
    Ok(())
}

/// Read data from flash using 3-byte addressing
///
/// Split into chunks of at most `max_read_len` bytes.
pub fn read_3b<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, buf: &mut [u8]) -> Result<()> {
    check_address(addr, buf.len())?;
    let max_len = master.max_read_len().max(1);
    let mut offset = 0;

    while offset < buf.len() {
        let chunk_len = core::cmp::min(max_len, buf.len() - offset);
        let chunk = &mut buf[offset..offset + chunk_len];
        let mut cmd = SpiCommand::read_3b(opcodes::READ, addr + offset as u32, chunk);
        master.execute(&mut cmd)?;
        offset += chunk_len;
    }

    Ok(())
}

/// Program a single page
///
/// The data must not cross a page boundary.
pub fn program_page_3b<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, data: &[u8]) -> Result<()> {
    check_address(addr, data.len())?;
    write_enable(master)?;

    let mut cmd = SpiCommand::write_3b(opcodes::PP, addr, data);
    master.execute(&mut cmd)?;

    // Page program: poll every 10us, timeout after 10ms
    wait_ready(master, 10, 10_000)
}

/// Program an arbitrary span, one page program per page touched
pub fn write_3b<M: SpiMaster + ?Sized>(master: &mut M, addr: u32, data: &[u8]) -> Result<()> {
    check_address(addr, data.len())?;
    let max_write = master.max_write_len().clamp(1, opcodes::PAGE_SIZE);
    let mut offset = 0;

    while offset < data.len() {
        let current = addr as usize + offset;
        let page_remaining = opcodes::PAGE_SIZE - (current % opcodes::PAGE_SIZE);
        let chunk_len = page_remaining.min(max_write).min(data.len() - offset);
        program_page_3b(master, current as u32, &data[offset..offset + chunk_len])?;
        offset += chunk_len;
    }

    Ok(())
}

/// Erase the 4 KiB sector containing `addr`
pub fn sector_erase<M: SpiMaster + ?Sized>(master: &mut M, addr: u32) -> Result<()> {
    erase_block(master, opcodes::SE_20, addr, 10_000, 1_000_000)
}

/// Erase a sector/block at the given address
pub fn erase_block<M: SpiMaster + ?Sized>(
    master: &mut M,
    opcode: u8,
    addr: u32,
    poll_delay_us: u32,
    timeout_us: u32,
) -> Result<()> {
    check_address(addr, 0)?;
    write_enable(master)?;

    let mut cmd = SpiCommand::erase_3b(opcode, addr);
    master.execute(&mut cmd)?;

    wait_ready(master, poll_delay_us, timeout_us)
}

/// Erase the entire chip
pub fn chip_erase<M: SpiMaster + ?Sized>(master: &mut M) -> Result<()> {
    write_enable(master)?;

    let mut cmd = SpiCommand::simple(opcodes::CE_C7);
    master.execute(&mut cmd)?;

    // Chip erase: poll every 1s, timeout after 200s
    wait_ready(master, 1_000_000, 200_000_000)
}
