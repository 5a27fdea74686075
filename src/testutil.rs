// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Host-side stand-ins for the disk, the flash and the USB host, plus a FAT image builder.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;

use crate::block::{Block, BlockDevice, BLOCK_SIZE};
use crate::update::{Flash, HostEvent, MassStorageHost};
use crate::vector::VectorTable;

pub const ATTR_ARCHIVE: u8 = 0x20;

#[derive(Debug, PartialEq, Eq)]
pub enum DiskError {
    OutOfRange(u32),
    Injected(u32),
}

/// Sector-addressed byte vector that records every read.
pub struct RamDisk {
    pub data: Vec<u8>,
    pub reads: Vec<u32>,
    pub fail_lba: Option<u32>,
}

impl RamDisk {
    pub fn new(sectors: u32) -> Self {
        Self {
            data: vec![0; sectors as usize * BLOCK_SIZE],
            reads: Vec::new(),
            fail_lba: None,
        }
    }

    pub fn sector_mut(&mut self, lba: u32) -> &mut [u8] {
        let start = lba as usize * BLOCK_SIZE;
        &mut self.data[start..start + BLOCK_SIZE]
    }
}

impl BlockDevice for RamDisk {
    type Error = DiskError;

    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), DiskError> {
        self.reads.push(lba);
        if self.fail_lba == Some(lba) {
            return Err(DiskError::Injected(lba));
        }
        let start = lba as usize * BLOCK_SIZE;
        let sector = self
            .data
            .get(start..start + BLOCK_SIZE)
            .ok_or(DiskError::OutOfRange(lba))?;
        buf.copy_from_slice(sector);
        Ok(())
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Kind {
    Fat16,
    Fat32,
}

/// Builds a freshly formatted FAT16 or FAT32 volume in a [`RamDisk`].
pub struct ImageBuilder {
    kind: Kind,
    partition_start: Option<u32>,
    sectors_per_cluster: u8,
    reserved: u16,
    sectors_per_fat: u32,
    root_entries: u16,
    total_sectors: u32,
}

impl ImageBuilder {
    /// 4 sectors per cluster, 512 root entries, 4096 sectors.
    pub fn fat16() -> Self {
        Self {
            kind: Kind::Fat16,
            partition_start: None,
            sectors_per_cluster: 4,
            reserved: 1,
            sectors_per_fat: 8,
            root_entries: 512,
            total_sectors: 4096,
        }
    }

    /// 1 sector per cluster, root directory in clusters 2 and 3, 8192 sectors.
    pub fn fat32() -> Self {
        Self {
            kind: Kind::Fat32,
            partition_start: None,
            sectors_per_cluster: 1,
            reserved: 32,
            sectors_per_fat: 64,
            root_entries: 0,
            total_sectors: 8192,
        }
    }

    /// Put an MBR in sector 0 and the volume at `start`.
    pub fn partitioned(mut self, start: u32) -> Self {
        self.partition_start = Some(start);
        self
    }

    pub fn root_entries(mut self, entries: u16) -> Self {
        self.root_entries = entries;
        self
    }

    pub fn build(self) -> Image {
        let first = self.partition_start.unwrap_or(0);
        let mut disk = RamDisk::new(first + self.total_sectors);

        if let Some(start) = self.partition_start {
            let mbr = disk.sector_mut(0);
            let entry = &mut mbr[446..462];
            entry[4] = match self.kind {
                Kind::Fat16 => 0x06,
                Kind::Fat32 => 0x0C,
            };
            entry[8..12].copy_from_slice(&start.to_le_bytes());
            entry[12..16].copy_from_slice(&self.total_sectors.to_le_bytes());
            mbr[510] = 0x55;
            mbr[511] = 0xAA;
        }

        let bs = disk.sector_mut(first);
        bs[..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
        bs[3..11].copy_from_slice(b"MSWIN4.1");
        bs[11..13].copy_from_slice(&512u16.to_le_bytes());
        bs[13] = self.sectors_per_cluster;
        bs[14..16].copy_from_slice(&self.reserved.to_le_bytes());
        bs[16] = 2;
        bs[17..19].copy_from_slice(&self.root_entries.to_le_bytes());
        bs[21] = 0xF8;
        bs[28..32].copy_from_slice(&first.to_le_bytes());
        match self.kind {
            Kind::Fat16 => {
                bs[19..21].copy_from_slice(&(self.total_sectors as u16).to_le_bytes());
                bs[22..24].copy_from_slice(&(self.sectors_per_fat as u16).to_le_bytes());
                bs[36] = 0x80;
                bs[38] = 0x29;
                bs[43..54].copy_from_slice(b"NO NAME    ");
                bs[54..62].copy_from_slice(b"FAT16   ");
            }
            Kind::Fat32 => {
                bs[32..36].copy_from_slice(&self.total_sectors.to_le_bytes());
                bs[36..40].copy_from_slice(&self.sectors_per_fat.to_le_bytes());
                bs[44..48].copy_from_slice(&2u32.to_le_bytes());
                bs[48..50].copy_from_slice(&1u16.to_le_bytes());
                bs[50..52].copy_from_slice(&6u16.to_le_bytes());
                bs[64] = 0x80;
                bs[66] = 0x29;
                bs[71..82].copy_from_slice(b"NO NAME    ");
                bs[82..90].copy_from_slice(b"FAT32   ");
            }
        }
        bs[510] = 0x55;
        bs[511] = 0xAA;

        let first_fat_sector = first + u32::from(self.reserved);
        let root_first_sector = first_fat_sector + 2 * self.sectors_per_fat;
        let root_sectors = (u32::from(self.root_entries) * 32).div_ceil(BLOCK_SIZE as u32);

        let mut image = Image {
            disk,
            kind: self.kind,
            total_sectors: self.total_sectors,
            sectors_per_cluster: u32::from(self.sectors_per_cluster),
            sectors_per_fat: self.sectors_per_fat,
            first_fat_sector,
            root_first_sector,
            first_data_sector: root_first_sector + root_sectors,
            root_chain: Vec::new(),
        };

        match self.kind {
            Kind::Fat16 => {
                image.set_fat(0, 0xFFF8);
                image.set_fat(1, 0xFFFF);
            }
            Kind::Fat32 => {
                image.set_fat(0, 0x0FFF_FFF8);
                image.set_fat(1, 0x0FFF_FFFF);
                image.root_first_sector = image.first_data_sector;
                image.write_chain(&[2, 3], &[]);
                image.root_chain = vec![2, 3];
            }
        }
        image
    }
}

/// A formatted volume. Sector numbers are absolute.
pub struct Image {
    pub disk: RamDisk,
    kind: Kind,
    pub total_sectors: u32,
    pub sectors_per_cluster: u32,
    pub sectors_per_fat: u32,
    pub first_fat_sector: u32,
    pub root_first_sector: u32,
    pub first_data_sector: u32,
    root_chain: Vec<u32>,
}

impl Image {
    pub fn cluster_sector(&self, cluster: u32) -> u32 {
        self.first_data_sector + (cluster - 2) * self.sectors_per_cluster
    }

    /// Write `value` into both FATs.
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        let size = match self.kind {
            Kind::Fat16 => 2,
            Kind::Fat32 => 4,
        };
        for copy in 0..2 {
            let byte = (self.first_fat_sector + copy * self.sectors_per_fat) as usize * BLOCK_SIZE
                + (cluster * size) as usize;
            match self.kind {
                Kind::Fat16 => {
                    self.disk.data[byte..byte + 2].copy_from_slice(&(value as u16).to_le_bytes())
                }
                Kind::Fat32 => self.disk.data[byte..byte + 4].copy_from_slice(&value.to_le_bytes()),
            }
        }
    }

    /// Link `clusters` into a chain ending in an end marker and fill them with `data`.
    pub fn write_chain(&mut self, clusters: &[u32], data: &[u8]) {
        let cluster_bytes = self.sectors_per_cluster as usize * BLOCK_SIZE;
        assert!(data.len() <= clusters.len() * cluster_bytes);

        let end = match self.kind {
            Kind::Fat16 => 0xFFFF,
            Kind::Fat32 => 0x0FFF_FFFF,
        };
        for (i, &cluster) in clusters.iter().enumerate() {
            let next = clusters.get(i + 1).copied().unwrap_or(end);
            self.set_fat(cluster, next);
        }
        for (&cluster, chunk) in clusters.iter().zip(data.chunks(cluster_bytes)) {
            let start = self.cluster_sector(cluster) as usize * BLOCK_SIZE;
            self.disk.data[start..start + chunk.len()].copy_from_slice(chunk);
        }
    }

    /// Write root directory slot `index`.
    pub fn add_root_entry(&mut self, index: u32, name: &[u8; 11], attr: u8, cluster: u32, size: u32) {
        let per_sector = (BLOCK_SIZE / 32) as u32;
        let sector = index / per_sector;
        let lba = match self.kind {
            Kind::Fat16 => self.root_first_sector + sector,
            Kind::Fat32 => {
                let link = self.root_chain[(sector / self.sectors_per_cluster) as usize];
                self.cluster_sector(link) + sector % self.sectors_per_cluster
            }
        };
        self.add_raw_entry(lba, index % per_sector, name, attr, cluster, size);
    }

    /// Write a directory slot anywhere on the disk.
    pub fn add_raw_entry(
        &mut self,
        lba: u32,
        slot: u32,
        name: &[u8; 11],
        attr: u8,
        cluster: u32,
        size: u32,
    ) {
        let raw = &mut self.disk.sector_mut(lba)[slot as usize * 32..][..32];
        raw.fill(0);
        raw[..11].copy_from_slice(name);
        raw[11] = attr;
        raw[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
        raw[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
        raw[28..32].copy_from_slice(&size.to_le_bytes());
    }

    /// Store `data` as `FIRMWARE.BIN` in consecutive clusters from `first_cluster`.
    pub fn add_firmware(&mut self, first_cluster: u32, data: &[u8]) {
        let cluster_bytes = self.sectors_per_cluster as usize * BLOCK_SIZE;
        let count = data.len().div_ceil(cluster_bytes).max(1) as u32;
        let clusters: Vec<u32> = (first_cluster..first_cluster + count).collect();
        self.write_chain(&clusters, data);
        self.add_root_entry(0, b"FIRMWAREBIN", ATTR_ARCHIVE, first_cluster, data.len() as u32);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlashOp {
    Erase(u32),
    Program(u32, usize),
}

#[derive(Debug, PartialEq, Eq)]
pub enum FlashError {
    OutOfRange(u32),
    Unaligned(u32),
    PowerLoss,
}

/// NOR flash with uniform pages: erased to 0xFF, programming can only clear bits.
pub struct SimFlash {
    pub base: u32,
    pub page: u32,
    pub mem: Vec<u8>,
    pub ops: Vec<FlashOp>,
    /// Operations allowed before every further call fails.
    pub power_after: Option<usize>,
}

impl SimFlash {
    /// Flash full of a previous application (all zero bytes).
    pub fn new(base: u32, size: u32, page: u32) -> Self {
        Self {
            base,
            page,
            mem: vec![0; size as usize],
            ops: Vec::new(),
            power_after: None,
        }
    }

    pub fn read(&self, addr: u32, len: usize) -> &[u8] {
        let start = (addr - self.base) as usize;
        &self.mem[start..start + len]
    }

    pub fn vector_table(&self, addr: u32) -> VectorTable {
        VectorTable::from_bytes(self.read(addr, VectorTable::SIZE))
    }

    fn range(&self, addr: u32, len: usize) -> Result<usize, FlashError> {
        let start = addr.checked_sub(self.base).ok_or(FlashError::OutOfRange(addr))? as usize;
        if start + len > self.mem.len() {
            return Err(FlashError::OutOfRange(addr));
        }
        Ok(start)
    }

    fn power(&self) -> Result<(), FlashError> {
        match self.power_after {
            Some(n) if self.ops.len() >= n => Err(FlashError::PowerLoss),
            _ => Ok(()),
        }
    }
}

impl Flash for SimFlash {
    type Error = FlashError;

    fn unit_end(&self, addr: u32) -> Option<u32> {
        let offset = self.range(addr, 1).ok()? as u32;
        Some(self.base + offset - offset % self.page + self.page)
    }

    fn erase(&mut self, addr: u32) -> Result<(), FlashError> {
        self.power()?;
        let offset = self.range(addr, 1)?;
        let start = offset - offset % self.page as usize;
        self.mem[start..start + self.page as usize].fill(0xFF);
        self.ops.push(FlashOp::Erase(self.base + start as u32));
        Ok(())
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        self.power()?;
        if addr % 4 != 0 || data.len() % 4 != 0 {
            return Err(FlashError::Unaligned(addr));
        }
        let start = self.range(addr, data.len())?;
        for (cell, byte) in self.mem[start..start + data.len()].iter_mut().zip(data) {
            *cell &= *byte;
        }
        self.ops.push(FlashOp::Program(addr, data.len()));
        Ok(())
    }
}

/// Mass-storage host backed by an [`Image`].
pub struct MockHost {
    pub image: Image,
    pub events: VecDeque<HostEvent>,
    /// Readiness polls answered "not ready" before the drive comes up.
    pub ready_after: u32,
    pub ready_polls: u32,
}

impl MockHost {
    pub fn new(image: Image) -> Self {
        Self {
            image,
            events: VecDeque::new(),
            ready_after: 0,
            ready_polls: 0,
        }
    }
}

impl BlockDevice for MockHost {
    type Error = DiskError;

    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), DiskError> {
        self.image.disk.read_block(lba, buf)
    }
}

impl MassStorageHost for MockHost {
    fn poll(&mut self) -> Option<HostEvent> {
        self.events.pop_front()
    }

    fn drive_ready(&mut self) -> bool {
        self.ready_polls += 1;
        self.ready_polls > self.ready_after
    }
}

/// Delay that only accumulates the requested time.
#[derive(Default)]
pub struct TestDelay {
    pub elapsed_ns: u64,
}

impl DelayNs for TestDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

/// Vector-table head of a plausible application.
pub fn valid_head() -> VectorTable {
    VectorTable {
        initial_sp: 0x2008_0000,
        reset_vector: 0x0800_8199,
    }
}

/// Image bytes starting with [`valid_head`], followed by a counting pattern.
pub fn firmware_image(len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let head = valid_head().to_bytes();
    let n = head.len().min(len);
    data[..n].copy_from_slice(&head[..n]);
    data
}
