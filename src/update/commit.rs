// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Commit engine: copy the update file from a drive into the application region.

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use super::{Error, Flash, MassStorageHost};
use crate::block::{Block, BLOCK_SIZE};
use crate::config::{ErasePolicy, UpdaterConfig, VectorCheck};
use crate::fs::{self, SimpleFs};
use crate::vector::VectorTable;

/// The image's vector-table head while the rest of the image is being written.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HeldHeader {
    /// The first sector has not been read yet.
    Pending,
    /// Taken from the first sector; programmed once everything else is in flash.
    Held(VectorTable),
}

/// Copy `config.file_name` from the drive behind `host` to `config.app_start`.
///
/// Returns the number of bytes committed. On any error the vector-table head at
/// `config.app_start` has not been programmed, so the region holds no bootable image (or, if the
/// failure came before erasing, the previous one).
pub fn commit_image<H, F, D>(
    host: &mut H,
    flash: &mut F,
    delay: &mut D,
    config: &UpdaterConfig,
    buf: &mut Block,
) -> Result<u32, Error>
where
    H: MassStorageHost,
    F: Flash,
    D: DelayNs,
{
    wait_drive_ready(host, delay, config)?;

    let mut reader = SimpleFs::mount(host, buf)?;
    let mut file = match reader.open(host, &config.file_name, buf) {
        Ok(file) => file,
        Err(fs::Error::NotFound) => {
            warn!("{} not found", config.file_name);
            return Err(Error::FileNotFound);
        }
        Err(e) => return Err(e.into()),
    };

    let size = file.size();
    if size == 0 {
        warn!("{} is empty", config.file_name);
        return Err(Error::FileNotFound);
    }
    if size < VectorTable::SIZE as u32 {
        return Err(Error::ImageTooSmall(size));
    }
    let capacity = config.capacity();
    if size > capacity {
        warn!("{} bytes do not fit in {} bytes of flash", size, capacity);
        return Err(Error::ImageTooLarge { size, capacity });
    }

    let erase_end = match config.erase_policy {
        ErasePolicy::ImageOnly => config.app_start + size,
        ErasePolicy::WholeRegion => config.flash_end(),
    };
    info!("erasing {:#010x}..{:#010x}", config.app_start, erase_end);
    erase_range(flash, config.app_start, erase_end, config.flash_end())?;

    info!("programming {} bytes", size);
    let mut transfer = Transfer::new(config.app_start, size);
    while transfer.remaining > 0 {
        if !reader.next_sector(host, &mut file, buf)? {
            warn!("image ended with {} bytes missing", transfer.remaining);
            return Err(Error::Incomplete {
                remaining: transfer.remaining,
            });
        }
        transfer.write_sector(flash, buf)?;
    }
    transfer.finish(flash)?;

    info!("committed {} bytes at {:#010x}", size, config.app_start);
    Ok(size)
}

/// Poll readiness up to the configured number of times, pausing between polls.
fn wait_drive_ready<H, D>(host: &mut H, delay: &mut D, config: &UpdaterConfig) -> Result<(), Error>
where
    H: MassStorageHost,
    D: DelayNs,
{
    for attempt in 0..config.drive_ready_retries {
        if attempt > 0 {
            delay.delay_ms(config.drive_ready_interval_ms);
        }
        if host.drive_ready() {
            return Ok(());
        }
        debug!("drive not ready ({}/{})", attempt + 1, config.drive_ready_retries);
    }
    warn!("drive never became ready");
    Err(Error::DriveNotReady)
}

/// Erase every unit touching `start..end`. Nothing is erased if the last unit reaches past
/// `region_end`.
fn erase_range<F: Flash>(flash: &mut F, start: u32, end: u32, region_end: u32) -> Result<(), Error> {
    let mut unit_end = start;
    while unit_end < end {
        unit_end = next_unit(flash, unit_end)?;
    }
    if unit_end > region_end {
        warn!(
            "erase unit ending at {:#010x} crosses region end {:#010x}",
            unit_end, region_end
        );
        return Err(Error::EraseOverlapsReserved {
            unit_end,
            region_end,
        });
    }

    let mut addr = start;
    while addr < end {
        let next = next_unit(flash, addr)?;
        flash.erase(addr).map_err(|e| flash_error("erase", addr, e))?;
        addr = next;
    }
    Ok(())
}

fn next_unit<F: Flash>(flash: &F, addr: u32) -> Result<u32, Error> {
    match flash.unit_end(addr) {
        Some(next) if next > addr => Ok(next),
        _ => {
            warn!("no erase unit at {:#010x}", addr);
            Err(Error::Flash)
        }
    }
}

fn flash_error<E: core::fmt::Debug>(op: &str, addr: u32, e: E) -> Error {
    warn!("flash {} at {:#010x} failed: {:?}", op, addr, e);
    Error::Flash
}

/// Write position of an image being streamed into flash.
struct Transfer {
    start: u32,
    addr: u32,
    remaining: u32,
    header: HeldHeader,
}

impl Transfer {
    fn new(start: u32, size: u32) -> Self {
        Self {
            start,
            addr: start,
            remaining: size,
            header: HeldHeader::Pending,
        }
    }

    /// Program the next sector of the image, holding back the head of the first one.
    fn write_sector<F: Flash>(&mut self, flash: &mut F, sector: &Block) -> Result<(), Error> {
        let len = (self.remaining as usize).min(BLOCK_SIZE);
        let from = match self.header {
            HeldHeader::Pending => {
                self.header = HeldHeader::Held(VectorTable::from_bytes(sector));
                VectorTable::SIZE
            }
            HeldHeader::Held(_) => 0,
        };

        // Flash is written in whole words; anything past the image end is ignored at boot.
        let to = len.next_multiple_of(4);
        if to > from {
            let addr = self.addr + from as u32;
            flash
                .program(addr, &sector[from..to])
                .map_err(|e| flash_error("program", addr, e))?;
        }

        self.addr += BLOCK_SIZE as u32;
        self.remaining -= len as u32;
        Ok(())
    }

    /// Program the held vector-table head, making the image bootable.
    fn finish<F: Flash>(self, flash: &mut F) -> Result<(), Error> {
        let HeldHeader::Held(head) = self.header else {
            return Err(Error::Incomplete {
                remaining: self.remaining,
            });
        };
        if !head.is_plausible(&VectorCheck::DEFAULT) {
            warn!("image vector table {:x?} will not boot", head);
        }
        flash
            .program(self.start, &head.to_bytes())
            .map_err(|e| flash_error("program", self.start, e))
    }
}
