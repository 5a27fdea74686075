// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! 8.3 names and raw 32-byte directory entries.

use core::fmt;

use super::volume::FatType;
use crate::block::{le_u16, le_u32};

/// Size of one directory slot.
pub const DIR_ENTRY_SIZE: usize = 32;

const ATTR_LONG_NAME: u8 = 0x0F;

/// Fixed-width 8.3 name: 8 base characters and 3 extension characters, space padded, no dot.
///
/// `FIRMWARE.BIN` is `"FIRMWAREBIN"`, `myfile.bn` is `"MYFILE  BN "`.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ShortName([u8; 11]);

impl ShortName {
    pub const fn new(raw: [u8; 11]) -> Self {
        Self(raw)
    }

    /// Build from a dotted file name such as `"firmware.bin"`, upper-casing ASCII letters.
    ///
    /// Returns `None` if the base is empty or longer than 8 characters, the extension is longer
    /// than 3, or the name is not printable ASCII.
    pub fn from_filename(name: &str) -> Option<Self> {
        let (base, ext) = match name.rfind('.') {
            Some(dot) => (&name[..dot], &name[dot + 1..]),
            None => (name, ""),
        };
        if base.is_empty() || base.len() > 8 || ext.len() > 3 {
            return None;
        }

        let mut raw = [b' '; 11];
        for (dst, src) in raw[..8].iter_mut().zip(base.bytes()) {
            *dst = src;
        }
        for (dst, src) in raw[8..].iter_mut().zip(ext.bytes()) {
            *dst = src;
        }
        if !raw.iter().all(|b| b.is_ascii_graphic() || *b == b' ') || raw.contains(&b'.') {
            return None;
        }
        raw.make_ascii_uppercase();
        Some(Self(raw))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 11] {
        &self.0
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let base = trim(&self.0[..8]);
        let ext = trim(&self.0[8..]);
        for &b in base {
            write!(f, "{}", b as char)?;
        }
        if !ext.is_empty() {
            write!(f, ".")?;
            for &b in ext {
                write!(f, "{}", b as char)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ShortName({})", self)
    }
}

fn trim(part: &[u8]) -> &[u8] {
    let len = part.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    &part[..len]
}

/// View of one 32-byte directory slot.
#[derive(Copy, Clone)]
pub struct DirEntry<'a> {
    raw: &'a [u8],
}

impl<'a> DirEntry<'a> {
    /// `raw` must be at least [`DIR_ENTRY_SIZE`] bytes.
    #[inline]
    pub fn new(raw: &'a [u8]) -> Self {
        Self { raw }
    }

    #[inline]
    pub fn name(&self) -> &[u8] {
        &self.raw[..11]
    }

    #[inline]
    pub fn attributes(&self) -> u8 {
        self.raw[11]
    }

    /// Long-filename slot; never matched against a short name.
    #[inline]
    pub fn is_long_name(&self) -> bool {
        self.attributes() & ATTR_LONG_NAME == ATTR_LONG_NAME
    }

    /// Starting cluster. The high word only exists on FAT32.
    pub fn first_cluster(&self, fat_type: FatType) -> u32 {
        let low = u32::from(le_u16(self.raw, 26));
        match fat_type {
            FatType::Fat16 => low,
            FatType::Fat32 => low | (u32::from(le_u16(self.raw, 20)) << 16),
        }
    }

    #[inline]
    pub fn file_size(&self) -> u32 {
        le_u32(self.raw, 28)
    }

    #[inline]
    pub fn matches(&self, name: &ShortName) -> bool {
        !self.is_long_name() && self.name() == name.as_bytes()
    }
}

/// Iterate over the directory slots of a sector.
pub fn entries(sector: &[u8]) -> impl Iterator<Item = DirEntry<'_>> {
    sector.chunks_exact(DIR_ENTRY_SIZE).map(DirEntry::new)
}
