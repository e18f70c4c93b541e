//! embedded-usbdisk - RAM disk
//!
//! A drive backed by a byte slice. Handy for tests, and for scratch
//! filesystems on boards with RAM to spare.

use crate::diskio::{transfer_len, DiskIo, DiskStatus, Error, IoctlCommand, IoctlResponse};

/// A drive backed by a slice of memory.
#[derive(Debug)]
pub struct RamDisk<'a> {
    memory: &'a mut [u8],
    sector_size: u32,
    status: DiskStatus,
}

impl<'a> RamDisk<'a> {
    /// Sector size used by [`RamDisk::new`].
    pub const DEFAULT_SECTOR_SIZE: u32 = 512;

    /// A RAM disk with 512-byte sectors. Any tail of `memory` shorter than a
    /// sector is not addressable.
    pub fn new(memory: &'a mut [u8]) -> Self {
        RamDisk {
            memory,
            sector_size: Self::DEFAULT_SECTOR_SIZE,
            status: DiskStatus::NOINIT,
        }
    }

    /// A RAM disk with a different sector size. The size must fit in a FatFs
    /// `WORD` and can't be zero.
    pub fn with_sector_size(memory: &'a mut [u8], sector_size: u32) -> Result<Self, Error> {
        if sector_size == 0 || sector_size > u32::from(u16::MAX) {
            return Err(Error::ParamError);
        }
        Ok(RamDisk {
            memory,
            sector_size,
            status: DiskStatus::NOINIT,
        })
    }

    /// Refuse (or allow again) writes.
    pub fn set_write_protected(&mut self, protected: bool) {
        self.status.set(DiskStatus::PROTECT, protected);
    }

    /// Whole sectors that fit in the backing memory.
    pub fn num_sectors(&self) -> u32 {
        (self.memory.len() / self.sector_size as usize) as u32
    }

    /// Give back the underlying memory.
    pub fn free(self) -> &'a mut [u8] {
        self.memory
    }

    fn sector_start(&self, sector: u32) -> usize {
        sector as usize * self.sector_size as usize
    }

    /// Byte range covered by a transfer, after all the precondition checks.
    fn checked_range(&self, sector: u32, count: u32, buffer_len: usize) -> Result<(usize, usize), Error> {
        if self.status.contains(DiskStatus::NOINIT) {
            return Err(Error::NotReady);
        }
        let len = transfer_len(count, self.sector_size, buffer_len)?;
        let end_sector = sector.checked_add(count).ok_or(Error::ParamError)?;
        if end_sector > self.num_sectors() {
            return Err(Error::ParamError);
        }
        let start = self.sector_start(sector);
        Ok((start, len))
    }
}

impl<'a> DiskIo for RamDisk<'a> {
    fn status(&self) -> DiskStatus {
        self.status
    }

    fn initialize(&mut self) -> DiskStatus {
        self.status.remove(DiskStatus::NOINIT);
        self.status
    }

    fn read(&mut self, buffer: &mut [u8], sector: u32, count: u32) -> Result<(), Error> {
        let (start, len) = self.checked_range(sector, count, buffer.len())?;
        buffer[..len].copy_from_slice(&self.memory[start..start + len]);
        Ok(())
    }

    fn write(&mut self, buffer: &[u8], sector: u32, count: u32) -> Result<(), Error> {
        let (start, len) = self.checked_range(sector, count, buffer.len())?;
        if self.status.contains(DiskStatus::PROTECT) {
            return Err(Error::WriteProtected);
        }
        self.memory[start..start + len].copy_from_slice(&buffer[..len]);
        Ok(())
    }

    fn ioctl(&mut self, command: IoctlCommand) -> Result<IoctlResponse, Error> {
        if self.status.contains(DiskStatus::NOINIT) {
            return Err(Error::NotReady);
        }
        match command {
            IoctlCommand::Sync => Ok(IoctlResponse::Synced),
            IoctlCommand::GetSectorCount => Ok(IoctlResponse::SectorCount(self.num_sectors())),
            IoctlCommand::GetSectorSize => Ok(IoctlResponse::SectorSize(self.sector_size as u16)),
            // Nothing to erase; one sector is as good as any.
            IoctlCommand::GetBlockSize => Ok(IoctlResponse::BlockSize(1)),
            IoctlCommand::Other(_) => Err(Error::ParamError),
        }
    }
}
