// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! # Minimal FAT Reader
//!
//! Read-only access to one file at a time in the root directory of the first FAT16 or FAT32
//! volume on a [`BlockDevice`]. Reads are strictly sequential and always a whole sector; the caller
//! tracks the file length and ignores whatever follows it in the last sector.
//!
//! ```no_run
//! # use stick_update::block::{Block, BlockDevice};
//! # use stick_update::fs::{ShortName, SimpleFs};
//! # fn demo<D: BlockDevice>(dev: &mut D) -> Result<(), stick_update::fs::Error> {
//! let mut buf: Block = [0; 512];
//! let mut fs = SimpleFs::mount(dev, &mut buf)?;
//! let mut file = fs.open(dev, &ShortName::new(*b"FIRMWAREBIN"), &mut buf)?;
//! while fs.next_sector(dev, &mut file, &mut buf)? {
//!     // consume `buf`
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Only 8.3 entries are compared; long-filename slots are skipped. Subdirectories are not
//! searched.

pub mod dir;
pub mod fat;
pub mod volume;

pub use dir::{DirEntry, ShortName};
pub use fat::{FatCache, Link};
pub use volume::{FatType, RootDir, Volume};

use log::{debug, warn};

use crate::block::{Block, BlockDevice, BLOCK_SIZE};
use dir::DIR_ENTRY_SIZE;
use volume::read_block;

/// Errors from the FAT reader.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// The block device reported a failure.
    Io,
    /// Missing 0xAA55 boot signature.
    BadSignature,
    /// Bytes per sector other than 512.
    UnsupportedSectorSize(u16),
    /// Neither a `FAT16` nor a `FAT32` tag where the root entry count says it should be.
    UnknownFilesystem,
    /// Boot sector fields that cannot describe a usable volume.
    BadGeometry,
    /// No root directory entry with the requested name.
    NotFound,
    /// A chain walk was asked to start from a cluster outside the volume.
    InvalidCluster(u32),
    /// The FAT links `cluster` to `value`, which is neither a cluster nor an end marker.
    ChainCorrupt { cluster: u32, value: u32 },
    /// The chain starting at this cluster is longer than the volume, so it must loop.
    ChainLoop(u32),
}

/// Read position within an open file.
///
/// A cursor is created by [`SimpleFs::open`] and is exhausted once its chain ends or a read fails.
/// Cursors are independent values; opening another file does not disturb an existing one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct File {
    size: u32,
    cluster: Option<u32>,
    sector: u32,
}

impl File {
    fn start(cluster: u32, size: u32, vol: &Volume) -> Self {
        let cluster = if vol.is_valid_cluster(cluster) {
            Some(cluster)
        } else {
            if size != 0 {
                warn!("file of {} bytes starts at invalid cluster {}", size, cluster);
            }
            None
        };
        Self {
            size,
            cluster,
            sector: 0,
        }
    }

    /// Length in bytes from the directory entry.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Cluster the next read comes from (`None` once exhausted).
    #[inline]
    pub fn cluster(&self) -> Option<u32> {
        self.cluster
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.cluster.is_none()
    }

    #[inline]
    fn exhaust(&mut self) {
        self.cluster = None;
    }
}

/// A mounted volume plus its FAT cache.
pub struct SimpleFs {
    volume: Volume,
    fat: FatCache,
}

impl SimpleFs {
    /// Read the partition table and boot sector and derive the volume layout.
    pub fn mount<D: BlockDevice>(dev: &mut D, buf: &mut Block) -> Result<Self, Error> {
        let volume = Volume::read(dev, buf)?;
        Ok(Self {
            volume,
            fat: FatCache::new(),
        })
    }

    #[inline]
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Find `name` in the root directory and return a cursor at the start of the file.
    ///
    /// FAT16 roots are scanned up to their declared entry count and never further. FAT32 roots
    /// are followed as a cluster chain. `buf` is used as scratch space.
    pub fn open<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        name: &ShortName,
        buf: &mut Block,
    ) -> Result<File, Error> {
        let fat_type = self.volume.fat_type;
        let found = match self.volume.root {
            RootDir::Fixed {
                first_sector,
                entries,
            } => {
                let mut remaining = usize::from(entries);
                let mut lba = first_sector;
                let mut found = None;
                while remaining > 0 && found.is_none() {
                    read_block(dev, lba, buf)?;
                    let slots = remaining.min(BLOCK_SIZE / DIR_ENTRY_SIZE);
                    found = find(&buf[..slots * DIR_ENTRY_SIZE], name, fat_type);
                    remaining -= slots;
                    lba += 1;
                }
                found
            }
            RootDir::Chain { cluster } => {
                let limit = self
                    .volume
                    .max_cluster()
                    .saturating_mul(self.volume.sectors_per_cluster);
                let mut dir = File::start(cluster, 0, &self.volume);
                let mut found = None;
                let mut walked = 0u32;
                while found.is_none() && self.next_sector(dev, &mut dir, buf)? {
                    walked += 1;
                    if walked > limit {
                        warn!("root directory chain from cluster {} loops", cluster);
                        return Err(Error::ChainLoop(cluster));
                    }
                    found = find(&buf[..], name, fat_type);
                }
                found
            }
        };

        let (cluster, size) = found.ok_or(Error::NotFound)?;
        debug!("open {}: cluster {}, {} bytes", name, cluster, size);
        Ok(File::start(cluster, size, &self.volume))
    }

    /// Read the next sector of `file` into `buf`.
    ///
    /// Returns `Ok(true)` when a sector was read and `Ok(false)` once the chain has ended. A read
    /// failure or a corrupt chain is returned as an error. Every outcome other than `Ok(true)`
    /// leaves the cursor exhausted.
    pub fn next_sector<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        file: &mut File,
        buf: &mut Block,
    ) -> Result<bool, Error> {
        let Some(mut cluster) = file.cluster else {
            return Ok(false);
        };

        if file.sector == self.volume.sectors_per_cluster {
            match self.fat.next_cluster(dev, &self.volume, cluster) {
                Ok(Link::Next(next)) => {
                    cluster = next;
                    file.cluster = Some(next);
                    file.sector = 0;
                }
                Ok(Link::End) => {
                    file.exhaust();
                    return Ok(false);
                }
                Err(e) => {
                    file.exhaust();
                    return Err(e);
                }
            }
        }

        let lba = self.volume.cluster_sector(cluster, file.sector);
        if let Err(e) = read_block(dev, lba, buf) {
            file.exhaust();
            return Err(e);
        }
        file.sector += 1;
        Ok(true)
    }

    /// [`next_sector`](Self::next_sector) with every terminal outcome reported as "no more data".
    ///
    /// A corrupt chain is indistinguishable from the end of the file through this call.
    pub fn read_next_sector<D: BlockDevice>(
        &mut self,
        dev: &mut D,
        file: &mut File,
        buf: &mut Block,
    ) -> bool {
        match self.next_sector(dev, file, buf) {
            Ok(more) => more,
            Err(e) => {
                debug!("read stopped: {:?}", e);
                false
            }
        }
    }
}

fn find(slots: &[u8], name: &ShortName, fat_type: FatType) -> Option<(u32, u32)> {
    dir::entries(slots)
        .find(|entry| entry.matches(name))
        .map(|entry| (entry.first_cluster(fat_type), entry.file_size()))
}
