// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Cluster-chain walking with a one-sector FAT cache.

use log::trace;

use super::volume::{read_block, FatType, Volume};
use super::Error;
use crate::block::{le_u16, le_u32, Block, BlockDevice, BLOCK_SIZE};

const FAT16_END: u32 = 0xFFF8;
const FAT32_END: u32 = 0x0FFF_FFF8;
const FAT32_MASK: u32 = 0x0FFF_FFFF;

/// Result of following one link of a chain.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Link {
    Next(u32),
    End,
}

/// Holds one FAT sector, keyed by its absolute sector number.
pub struct FatCache {
    sector: Option<u32>,
    data: Block,
}

impl FatCache {
    pub const fn new() -> Self {
        Self {
            sector: None,
            data: [0; BLOCK_SIZE],
        }
    }

    /// Absolute sector currently held, if any.
    #[inline]
    pub fn cached_sector(&self) -> Option<u32> {
        self.sector
    }

    /// Look up the cluster following `cluster`.
    ///
    /// End-of-chain markers give [`Link::End`]. A table value outside the volume's cluster range
    /// is reported as [`Error::ChainCorrupt`] rather than folded into the end marker.
    pub fn next_cluster<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        vol: &Volume,
        cluster: u32,
    ) -> Result<Link, Error> {
        if !vol.is_valid_cluster(cluster) {
            return Err(Error::InvalidCluster(cluster));
        }

        let entry_size = vol.fat_type.entry_size();
        let per_sector = BLOCK_SIZE as u32 / entry_size;
        let sector = vol.first_fat_sector + cluster / per_sector;
        if sector > vol.last_fat_sector {
            return Err(Error::InvalidCluster(cluster));
        }
        self.load(dev, sector)?;

        let offset = ((cluster % per_sector) * entry_size) as usize;
        let (value, end) = match vol.fat_type {
            FatType::Fat16 => (u32::from(le_u16(&self.data, offset)), FAT16_END),
            FatType::Fat32 => (le_u32(&self.data, offset) & FAT32_MASK, FAT32_END),
        };
        trace!("fat: {} -> {:#x}", cluster, value);

        if value >= end {
            Ok(Link::End)
        } else if vol.is_valid_cluster(value) {
            Ok(Link::Next(value))
        } else {
            Err(Error::ChainCorrupt { cluster, value })
        }
    }

    fn load<D: BlockDevice>(&mut self, dev: &mut D, sector: u32) -> Result<(), Error> {
        if self.sector == Some(sector) {
            return Ok(());
        }
        self.sector = None;
        read_block(dev, sector, &mut self.data)?;
        self.sector = Some(sector);
        Ok(())
    }
}

impl Default for FatCache {
    fn default() -> Self {
        Self::new()
    }
}
