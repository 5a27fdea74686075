// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! On-chip flash, erased sector by sector through the HAL.
//!
//! The controller is unlocked only for the duration of a single erase or program call. Sectors
//! below [`APP_START_ADDRESS`] hold the updater itself and are refused.

use log::trace;
use stm32f7xx_hal::{flash, pac};

use crate::config::{flash_sector_at, APP_START_ADDRESS, FLASH_BASE, FLASH_SIZE};
use crate::update::Flash;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Address outside on-chip flash.
    OutOfRange(u32),
    /// Address inside the updater's own sectors.
    Protected(u32),
    /// The controller reported an error erasing this sector.
    Erase(u8),
    /// The controller reported an error programming at this address.
    Program(u32),
}

pub struct InternalFlash {
    flash: flash::Flash,
}

impl InternalFlash {
    pub fn new(flash: pac::FLASH) -> Self {
        Self {
            flash: flash::Flash::new(flash),
        }
    }

    pub fn free(self) -> flash::Flash {
        self.flash
    }
}

impl Flash for InternalFlash {
    type Error = Error;

    fn unit_end(&self, addr: u32) -> Option<u32> {
        flash_sector_at(addr).map(|sector| sector.end)
    }

    fn erase(&mut self, addr: u32) -> Result<(), Error> {
        let sector = flash_sector_at(addr).ok_or(Error::OutOfRange(addr))?;
        if sector.start < APP_START_ADDRESS {
            return Err(Error::Protected(addr));
        }
        trace!("erase sector {} ({:#010x})", sector.number, sector.start);

        self.flash.unlock();
        let result = self.flash.blocking_erase_sector(sector.number.into());
        self.flash.lock();
        result.map_err(|_| Error::Erase(sector.number))
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        let end = addr
            .checked_add(data.len() as u32)
            .ok_or(Error::OutOfRange(addr))?;
        if addr < FLASH_BASE || end > FLASH_BASE + FLASH_SIZE {
            return Err(Error::OutOfRange(addr));
        }
        if addr < APP_START_ADDRESS {
            return Err(Error::Protected(addr));
        }

        self.flash.unlock();
        let result = self
            .flash
            .blocking_program((addr - FLASH_BASE) as usize, data);
        self.flash.lock();
        result.map_err(|_| Error::Program(addr))
    }
}
