// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Board memory map and build-time update policy.
//!
//! The values here describe an STM32F767ZI (2 MiB single-bank flash, 512 KiB SRAM). The updater
//! occupies flash sector 0; applications must be linked to run from [`APP_START_ADDRESS`].

use crate::fs::ShortName;

/// Start of on-chip flash on the AXIM bus.
pub const FLASH_BASE: u32 = 0x0800_0000;

/// Size of on-chip flash.
pub const FLASH_SIZE: u32 = 2 * 1024 * 1024;

/// Flash kept out of the application region at the top of the device (e.g. a parameter block).
pub const FLASH_RESERVED: u32 = 0;

/// Where the application image is programmed. Must be the start of an erase sector.
pub const APP_START_ADDRESS: u32 = 0x0800_8000;

/// 8.3 name of the image looked up in the root directory (`FIRMWARE.BIN`).
pub const UPDATE_FILE_NAME: ShortName = ShortName::new(*b"FIRMWAREBIN");

/// Number of readiness polls before a freshly attached drive is given up on.
pub const DRIVE_READY_RETRIES: u32 = 4;

/// Pause between readiness polls.
pub const DRIVE_READY_INTERVAL_MS: u32 = 500;

/// RAM word an application sets to request an update across a reset. Kept out of the linker's
/// RAM region in `memory.x`.
pub const UPDATE_REQUEST_ADDR: u32 = 0x2007_FFFC;

/// Sentinel stored at [`UPDATE_REQUEST_ADDR`].
pub const UPDATE_REQUEST_MAGIC: u32 = 0x1234_CDEF;

/// Which flash is erased before programming.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErasePolicy {
    /// Only the erase units covered by the image.
    ImageOnly,
    /// Everything from the application start to the end of the application region.
    WholeRegion,
}

impl ErasePolicy {
    /// Policy selected by the `code-protection` feature.
    pub const fn from_build() -> Self {
        if cfg!(feature = "code-protection") {
            ErasePolicy::WholeRegion
        } else {
            ErasePolicy::ImageOnly
        }
    }
}

/// Parameters of the commit engine and attach loop.
#[derive(Copy, Clone, Debug)]
pub struct UpdaterConfig {
    pub flash_base: u32,
    pub flash_size: u32,
    pub flash_reserved: u32,
    pub app_start: u32,
    pub erase_policy: ErasePolicy,
    pub file_name: ShortName,
    pub drive_ready_retries: u32,
    pub drive_ready_interval_ms: u32,
}

impl UpdaterConfig {
    pub const DEFAULT: Self = Self {
        flash_base: FLASH_BASE,
        flash_size: FLASH_SIZE,
        flash_reserved: FLASH_RESERVED,
        app_start: APP_START_ADDRESS,
        erase_policy: ErasePolicy::from_build(),
        file_name: UPDATE_FILE_NAME,
        drive_ready_retries: DRIVE_READY_RETRIES,
        drive_ready_interval_ms: DRIVE_READY_INTERVAL_MS,
    };

    /// First address past the application region.
    #[inline]
    pub fn flash_end(&self) -> u32 {
        self.flash_base + self.flash_size - self.flash_reserved
    }

    /// Largest image that fits in the application region.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.flash_end().saturating_sub(self.app_start)
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Bit patterns a vector-table head must match to be considered a runnable application.
///
/// A word passes when `word & mask == expected`. The reset-vector mask includes bit 0 so the Thumb
/// bit is required.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VectorCheck {
    pub sp_mask: u32,
    pub sp_expected: u32,
    pub pc_mask: u32,
    pub pc_expected: u32,
}

impl VectorCheck {
    /// Stack in SRAM (0x2000_0000..0x200F_FFFF), entry point in the 2 MiB AXIM flash window.
    pub const DEFAULT: Self = Self {
        sp_mask: 0xFFF0_0000,
        sp_expected: 0x2000_0000,
        pc_mask: 0xFFE0_0001,
        pc_expected: 0x0800_0001,
    };
}

/// Parameters of the reset-time decision.
#[derive(Copy, Clone, Debug)]
pub struct BootConfig {
    pub app_start: u32,
    pub vector_check: VectorCheck,
    pub request_magic: u32,
}

impl BootConfig {
    pub const DEFAULT: Self = Self {
        app_start: APP_START_ADDRESS,
        vector_check: VectorCheck::DEFAULT,
        request_magic: UPDATE_REQUEST_MAGIC,
    };
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One erase sector of the on-chip flash.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FlashSector {
    pub number: u8,
    pub start: u32,
    pub end: u32,
}

/// Single-bank STM32F76x/77x layout: 4 x 32K, 1 x 128K, 7 x 256K.
const SECTOR_SIZES_KB: [u32; 12] = [32, 32, 32, 32, 128, 256, 256, 256, 256, 256, 256, 256];

/// Sector containing `addr`, if it lies in flash.
pub fn flash_sector_at(addr: u32) -> Option<FlashSector> {
    let mut start = FLASH_BASE;
    for (number, kb) in SECTOR_SIZES_KB.iter().enumerate() {
        let end = start + kb * 1024;
        if (start..end).contains(&addr) {
            return Some(FlashSector {
                number: number as u8,
                start,
                end,
            });
        }
        start = end;
    }
    None
}
