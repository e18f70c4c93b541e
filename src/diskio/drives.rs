//! Physical drive table.
//!
//! FatFs addresses drives by number (`"0:"`, `"1:"`, `"2:"`) and expects a
//! single set of `disk_*` functions that dispatch on that number. `Drives`
//! is that dispatcher.

use crate::timestamp::TimeSource;

use super::{DiskIo, DiskStatus, Error, IoctlCommand, IoctlResponse};

#[cfg(feature = "log")]
use log::{debug, trace};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace};

/// Drive number used for an SD/MMC card.
pub const MMC_DRIVE: u8 = 0;
/// Drive number used for an ATA drive.
pub const ATA_DRIVE: u8 = 1;
/// Drive number used for a USB mass-storage device.
pub const USB_DRIVE: u8 = 2;

/// Up to `N` drives, plus the clock used to stamp files.
pub struct Drives<'a, TS, const N: usize>
where
    TS: TimeSource,
{
    slots: [Option<&'a mut dyn DiskIo>; N],
    time_source: TS,
}

impl<'a, TS, const N: usize> Drives<'a, TS, N>
where
    TS: TimeSource,
{
    /// An empty table.
    pub fn new(time_source: TS) -> Self {
        Drives {
            slots: core::array::from_fn(|_| None),
            time_source,
        }
    }

    /// Put `disk` behind drive number `pdrv`, replacing whatever was there.
    pub fn attach(&mut self, pdrv: u8, disk: &'a mut dyn DiskIo) -> Result<(), Error> {
        let slot = self.slots.get_mut(usize::from(pdrv)).ok_or(Error::ParamError)?;
        debug!("Attaching drive {}", pdrv);
        *slot = Some(disk);
        Ok(())
    }

    /// Take the disk behind `pdrv` out of the table.
    pub fn detach(&mut self, pdrv: u8) -> Option<&'a mut dyn DiskIo> {
        let disk = self.slots.get_mut(usize::from(pdrv))?.take();
        if disk.is_some() {
            debug!("Detached drive {}", pdrv);
        }
        disk
    }

    /// Number of drive slots.
    pub fn capacity(&self) -> usize {
        N
    }

    fn slot(&self, pdrv: u8) -> Option<&dyn DiskIo> {
        match self.slots.get(usize::from(pdrv)) {
            Some(Some(disk)) => Some(&**disk),
            _ => None,
        }
    }

    fn slot_mut(&mut self, pdrv: u8) -> Option<&mut (dyn DiskIo + 'a)> {
        match self.slots.get_mut(usize::from(pdrv)) {
            Some(Some(disk)) => Some(&mut **disk),
            _ => None,
        }
    }

    /// Status of drive `pdrv`. An empty slot reads as not initialized.
    pub fn disk_status(&self, pdrv: u8) -> DiskStatus {
        self.slot(pdrv)
            .map_or(DiskStatus::NOINIT, |disk| disk.status())
    }

    /// Initialize drive `pdrv`. An empty slot reads as not initialized.
    pub fn disk_initialize(&mut self, pdrv: u8) -> DiskStatus {
        match self.slot_mut(pdrv) {
            Some(disk) => disk.initialize(),
            None => DiskStatus::NOINIT,
        }
    }

    /// `disk_read` for drive `pdrv`.
    pub fn disk_read(
        &mut self,
        pdrv: u8,
        buffer: &mut [u8],
        sector: u32,
        count: u32,
    ) -> Result<(), Error> {
        trace!("Drive {}: read {} sectors at {}", pdrv, count, sector);
        self.slot_mut(pdrv)
            .ok_or(Error::ParamError)?
            .read(buffer, sector, count)
    }

    /// `disk_write` for drive `pdrv`.
    pub fn disk_write(
        &mut self,
        pdrv: u8,
        buffer: &[u8],
        sector: u32,
        count: u32,
    ) -> Result<(), Error> {
        trace!("Drive {}: write {} sectors at {}", pdrv, count, sector);
        self.slot_mut(pdrv)
            .ok_or(Error::ParamError)?
            .write(buffer, sector, count)
    }

    /// `disk_ioctl` for drive `pdrv`.
    pub fn disk_ioctl(&mut self, pdrv: u8, command: IoctlCommand) -> Result<IoctlResponse, Error> {
        self.slot_mut(pdrv).ok_or(Error::ParamError)?.ioctl(command)
    }

    /// Current time, packed the way FatFs' `get_fattime` returns it.
    pub fn get_fattime(&self) -> u32 {
        self.time_source.get_timestamp().fat_datetime()
    }

    /// The clock behind `get_fattime`.
    pub fn time_source(&self) -> &TS {
        &self.time_source
    }
}
