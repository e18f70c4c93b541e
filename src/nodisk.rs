//! embedded-usbdisk - Empty drive
//!
//! A drive that is never there. Useful for filling a drive number the board
//! has no hardware for, so the filesystem gets a clean "no disk" instead of
//! an invalid drive.

use crate::diskio::{DiskIo, DiskStatus, Error, IoctlCommand, IoctlResponse};

/// A drive slot with no hardware behind it.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct NoDisk;

impl DiskIo for NoDisk {
    fn status(&self) -> DiskStatus {
        DiskStatus::NODISK
    }

    fn initialize(&mut self) -> DiskStatus {
        DiskStatus::NODISK
    }

    fn read(&mut self, _buffer: &mut [u8], _sector: u32, _count: u32) -> Result<(), Error> {
        Err(Error::NotReady)
    }

    fn write(&mut self, _buffer: &[u8], _sector: u32, _count: u32) -> Result<(), Error> {
        Err(Error::NotReady)
    }

    fn ioctl(&mut self, _command: IoctlCommand) -> Result<IoctlResponse, Error> {
        Err(Error::NotReady)
    }
}
