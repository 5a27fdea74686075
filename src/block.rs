// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Block device contract.
//!
//! The FAT reader only ever needs one operation from the storage medium: read a single 512-byte
//! block by absolute block number. Whatever sits underneath (USB mass storage, an SD card, a disk
//! image in a test) implements [`BlockDevice`].

use core::fmt::Debug;

/// Size of a device block in bytes. Nothing else is supported.
pub const BLOCK_SIZE: usize = 512;

/// One device block.
pub type Block = [u8; BLOCK_SIZE];

/// Storage medium addressed in 512-byte blocks.
pub trait BlockDevice {
    /// Device specific failure. Only ever logged by the reader, never inspected.
    type Error: Debug;

    /// Read block `lba` into `buf`.
    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), Self::Error>;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    type Error = T::Error;

    #[inline]
    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), Self::Error> {
        (**self).read_block(lba, buf)
    }
}

#[inline]
pub(crate) fn le_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

#[inline]
pub(crate) fn le_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}
