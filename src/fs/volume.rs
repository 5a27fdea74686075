// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Volume discovery: master boot record, boot sector and the derived layout.

use log::{debug, warn};

use super::Error;
use crate::block::{le_u16, le_u32, Block, BlockDevice, BLOCK_SIZE};

/// Byte offsets into the MBR and the FAT boot sector.
mod offset {
    pub const BYTES_PER_SECTOR: usize = 11;
    pub const SECTORS_PER_CLUSTER: usize = 13;
    pub const RESERVED_SECTORS: usize = 14;
    pub const NUM_FATS: usize = 16;
    pub const ROOT_ENTRIES: usize = 17;
    pub const TOTAL_SECTORS_16: usize = 19;
    pub const SECTORS_PER_FAT_16: usize = 22;
    pub const TOTAL_SECTORS_32: usize = 32;
    pub const SECTORS_PER_FAT_32: usize = 36;
    pub const ROOT_CLUSTER: usize = 44;
    pub const FS_TYPE_16: usize = 54;
    pub const FS_TYPE_32: usize = 82;

    /// First partition table entry; LBA start at +8, length at +12.
    pub const PARTITION_0: usize = 446;
    pub const SIGNATURE: usize = 510;
}

const BOOT_SIGNATURE: u16 = 0xAA55;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FatType {
    Fat16,
    Fat32,
}

impl FatType {
    /// Bytes per FAT entry.
    #[inline]
    pub fn entry_size(self) -> u32 {
        match self {
            FatType::Fat16 => 2,
            FatType::Fat32 => 4,
        }
    }
}

/// Where the root directory lives.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RootDir {
    /// FAT16: a fixed run of sectors holding `entries` directory slots.
    Fixed { first_sector: u32, entries: u16 },
    /// FAT32: an ordinary cluster chain.
    Chain { cluster: u32 },
}

/// Layout of a mounted volume. All sector numbers are absolute device blocks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Volume {
    pub first_sector: u32,
    pub sector_count: u32,
    pub sectors_per_cluster: u32,
    pub fat_type: FatType,
    pub sectors_per_fat: u32,
    pub first_fat_sector: u32,
    pub last_fat_sector: u32,
    pub root: RootDir,
    pub first_data_sector: u32,
}

impl Volume {
    /// Locate and parse the boot sector of the first FAT16/FAT32 volume on `dev`.
    ///
    /// Sector 0 is taken as the boot sector when it carries a FAT tag, otherwise as an MBR whose
    /// first partition entry is followed. `buf` is scratch space and holds the boot sector on
    /// return.
    pub fn read<D: BlockDevice>(dev: &mut D, buf: &mut Block) -> Result<Self, Error> {
        read_block(dev, 0, buf)?;
        if le_u16(buf, offset::SIGNATURE) != BOOT_SIGNATURE {
            return Err(Error::BadSignature);
        }

        let (first_sector, sector_count) = if has_fat_tag(buf) {
            let small = le_u16(buf, offset::TOTAL_SECTORS_16);
            let count = if small == 0 {
                le_u32(buf, offset::TOTAL_SECTORS_32)
            } else {
                u32::from(small)
            };
            (0, count)
        } else {
            let start = le_u32(buf, offset::PARTITION_0 + 8);
            let count = le_u32(buf, offset::PARTITION_0 + 12);
            debug!("mbr: first partition at {} ({} sectors)", start, count);
            read_block(dev, start, buf)?;
            (start, count)
        };

        if le_u16(buf, offset::SIGNATURE) != BOOT_SIGNATURE {
            return Err(Error::BadSignature);
        }

        let bytes_per_sector = le_u16(buf, offset::BYTES_PER_SECTOR);
        if usize::from(bytes_per_sector) != BLOCK_SIZE {
            return Err(Error::UnsupportedSectorSize(bytes_per_sector));
        }

        let sectors_per_cluster = u32::from(buf[offset::SECTORS_PER_CLUSTER]);
        if sectors_per_cluster == 0 {
            return Err(Error::BadGeometry);
        }

        // A zero root entry count is the FAT32 hint; the tag must agree either way.
        let root_entries = le_u16(buf, offset::ROOT_ENTRIES);
        let fat_type = if root_entries == 0 {
            if &buf[offset::FS_TYPE_32..offset::FS_TYPE_32 + 8] != b"FAT32   " {
                return Err(Error::UnknownFilesystem);
            }
            FatType::Fat32
        } else {
            if &buf[offset::FS_TYPE_16..offset::FS_TYPE_16 + 8] != b"FAT16   " {
                return Err(Error::UnknownFilesystem);
            }
            FatType::Fat16
        };

        let sectors_per_fat = match fat_type {
            FatType::Fat16 => u32::from(le_u16(buf, offset::SECTORS_PER_FAT_16)),
            FatType::Fat32 => le_u32(buf, offset::SECTORS_PER_FAT_32),
        };
        if sectors_per_fat == 0 {
            return Err(Error::BadGeometry);
        }

        let reserved = u32::from(le_u16(buf, offset::RESERVED_SECTORS));
        let num_fats = u32::from(buf[offset::NUM_FATS]);

        let first_fat_sector = first_sector.checked_add(reserved).ok_or(Error::BadGeometry)?;
        let last_fat_sector = first_fat_sector
            .checked_add(sectors_per_fat - 1)
            .ok_or(Error::BadGeometry)?;
        let fats_end = sectors_per_fat
            .checked_mul(num_fats)
            .and_then(|n| n.checked_add(first_fat_sector))
            .ok_or(Error::BadGeometry)?;

        let (root, first_data_sector) = match fat_type {
            FatType::Fat16 => {
                let root_sectors = (u32::from(root_entries) * 32).div_ceil(BLOCK_SIZE as u32);
                let root = RootDir::Fixed {
                    first_sector: fats_end,
                    entries: root_entries,
                };
                let data = fats_end.checked_add(root_sectors).ok_or(Error::BadGeometry)?;
                (root, data)
            }
            FatType::Fat32 => {
                let root = RootDir::Chain {
                    cluster: le_u32(buf, offset::ROOT_CLUSTER),
                };
                (root, fats_end)
            }
        };

        let volume = Self {
            first_sector,
            sector_count,
            sectors_per_cluster,
            fat_type,
            sectors_per_fat,
            first_fat_sector,
            last_fat_sector,
            root,
            first_data_sector,
        };
        debug!("mounted {:?}", volume);
        Ok(volume)
    }

    /// Highest cluster number accepted anywhere in a chain.
    #[inline]
    pub fn max_cluster(&self) -> u32 {
        self.sector_count / self.sectors_per_cluster
    }

    /// True if `cluster` may appear in a chain on this volume.
    #[inline]
    pub fn is_valid_cluster(&self, cluster: u32) -> bool {
        (2..=self.max_cluster()).contains(&cluster)
    }

    /// Absolute sector of sector `index` within `cluster`.
    #[inline]
    pub fn cluster_sector(&self, cluster: u32, index: u32) -> u32 {
        (cluster - 2)
            .saturating_mul(self.sectors_per_cluster)
            .saturating_add(index)
            .saturating_add(self.first_data_sector)
    }
}

/// Does this sector look like a FAT boot sector rather than an MBR?
fn has_fat_tag(buf: &Block) -> bool {
    &buf[offset::FS_TYPE_16..offset::FS_TYPE_16 + 3] == b"FAT"
        || &buf[offset::FS_TYPE_32..offset::FS_TYPE_32 + 5] == b"FAT32"
}

pub(super) fn read_block<D: BlockDevice>(dev: &mut D, lba: u32, buf: &mut Block) -> Result<(), Error> {
    dev.read_block(lba, buf).map_err(|e| {
        warn!("read of block {} failed: {:?}", lba, e);
        Error::Io
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ImageBuilder, RamDisk};

    #[test]
    fn mounts_unpartitioned_fat16() {
        let mut image = ImageBuilder::fat16().build();
        let mut buf = [0u8; BLOCK_SIZE];
        let vol = Volume::read(&mut image.disk, &mut buf).unwrap();

        assert_eq!(vol.fat_type, FatType::Fat16);
        assert_eq!(vol.first_sector, 0);
        assert_eq!(vol.sector_count, image.total_sectors);
        assert_eq!(vol.sectors_per_cluster, 4);
        assert_eq!(vol.first_fat_sector, 1);
        assert_eq!(vol.last_fat_sector, 1 + image.sectors_per_fat - 1);
        assert_eq!(
            vol.root,
            RootDir::Fixed {
                first_sector: image.root_first_sector,
                entries: 512
            }
        );
        assert_eq!(vol.first_data_sector, image.root_first_sector + 32);
        assert_eq!(vol.first_data_sector, image.first_data_sector);
    }

    #[test]
    fn follows_first_partition_of_mbr() {
        let mut image = ImageBuilder::fat32().partitioned(63).build();
        let mut buf = [0u8; BLOCK_SIZE];
        let vol = Volume::read(&mut image.disk, &mut buf).unwrap();

        assert_eq!(vol.fat_type, FatType::Fat32);
        assert_eq!(vol.first_sector, 63);
        assert_eq!(vol.sector_count, image.total_sectors);
        assert_eq!(vol.first_fat_sector, 63 + 32);
        assert_eq!(vol.root, RootDir::Chain { cluster: 2 });
        assert_eq!(vol.first_data_sector, image.first_data_sector);
        assert_eq!(image.disk.reads, vec![0, 63]);
    }

    #[test]
    fn rejects_missing_signature() {
        let mut image = ImageBuilder::fat16().build();
        image.disk.data[510] = 0;
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(Volume::read(&mut image.disk, &mut buf), Err(Error::BadSignature));
    }

    #[test]
    fn rejects_partition_without_signature() {
        let mut image = ImageBuilder::fat16().partitioned(8).build();
        image.disk.data[8 * BLOCK_SIZE + 511] = 0;
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(Volume::read(&mut image.disk, &mut buf), Err(Error::BadSignature));
    }

    #[test]
    fn rejects_large_sectors() {
        let mut image = ImageBuilder::fat16().build();
        image.disk.data[11..13].copy_from_slice(&1024u16.to_le_bytes());
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(
            Volume::read(&mut image.disk, &mut buf),
            Err(Error::UnsupportedSectorSize(1024))
        );
    }

    #[test]
    fn rejects_fat12() {
        let mut image = ImageBuilder::fat16().build();
        image.disk.data[54..62].copy_from_slice(b"FAT12   ");
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(Volume::read(&mut image.disk, &mut buf), Err(Error::UnknownFilesystem));
    }

    #[test]
    fn rejects_fat32_without_tag() {
        let mut image = ImageBuilder::fat32().build();
        image.disk.data[82..90].copy_from_slice(b"NTFS    ");
        let mut buf = [0u8; BLOCK_SIZE];
        // Untagged, so sector 0 is taken as an MBR whose empty entry points back at sector 0.
        assert_eq!(Volume::read(&mut image.disk, &mut buf), Err(Error::UnknownFilesystem));
    }

    #[test]
    fn rejects_zero_sectors_per_cluster() {
        let mut image = ImageBuilder::fat16().build();
        image.disk.data[13] = 0;
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(Volume::read(&mut image.disk, &mut buf), Err(Error::BadGeometry));
    }

    #[test]
    fn rejects_fat_size_past_sector_range() {
        let mut image = ImageBuilder::fat32().build();
        image.disk.data[36..40].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(Volume::read(&mut image.disk, &mut buf), Err(Error::BadGeometry));

        image.disk.data[36..40].copy_from_slice(&0x8000_0000u32.to_le_bytes());
        assert_eq!(Volume::read(&mut image.disk, &mut buf), Err(Error::BadGeometry));
    }

    #[test]
    fn propagates_read_failure() {
        let mut disk = RamDisk::new(0);
        let mut buf = [0u8; BLOCK_SIZE];
        assert_eq!(Volume::read(&mut disk, &mut buf), Err(Error::Io));
    }

    #[test]
    fn cluster_arithmetic() {
        let mut image = ImageBuilder::fat16().build();
        let mut buf = [0u8; BLOCK_SIZE];
        let vol = Volume::read(&mut image.disk, &mut buf).unwrap();

        assert_eq!(vol.cluster_sector(2, 0), vol.first_data_sector);
        assert_eq!(vol.cluster_sector(3, 1), vol.first_data_sector + 5);
        assert_eq!(vol.max_cluster(), image.total_sectors / 4);
        assert!(!vol.is_valid_cluster(1));
        assert!(vol.is_valid_cluster(2));
        assert!(!vol.is_valid_cluster(vol.max_cluster() + 1));
    }
}
