// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Head of a Cortex-M vector table: initial stack pointer and reset vector.
//!
//! These two words decide whether flash holds a runnable application, so the commit engine writes
//! them last and the boot decision reads them first.

use crate::config::VectorCheck;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VectorTable {
    pub initial_sp: u32,
    pub reset_vector: u32,
}

impl VectorTable {
    /// Bytes occupied at the start of an image.
    pub const SIZE: usize = 8;

    /// Both words as read from erased flash.
    pub const ERASED: Self = Self {
        initial_sp: 0xFFFF_FFFF,
        reset_vector: 0xFFFF_FFFF,
    };

    /// Decode the first eight bytes of `bytes` (little endian).
    ///
    /// `bytes` must hold at least [`Self::SIZE`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            initial_sp: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            reset_vector: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(&self.initial_sp.to_le_bytes());
        out[4..].copy_from_slice(&self.reset_vector.to_le_bytes());
        out
    }

    /// True if both words look like they belong to a linked application.
    pub fn is_plausible(&self, check: &VectorCheck) -> bool {
        self.initial_sp != 0xFFFF_FFFF
            && self.reset_vector != 0xFFFF_FFFF
            && self.initial_sp & check.sp_mask == check.sp_expected
            && self.reset_vector & check.pc_mask == check.pc_expected
    }
}
