//! embedded-usbdisk - Disk I/O contract
//!
//! The five operations a FatFs-style filesystem uses to talk to a physical
//! drive. Status flags, result codes and ioctl command codes keep the values
//! FatFs' `diskio.h` gives them, so a C shim can pass them straight through.

#[cfg(feature = "refcell-blockdevice")]
mod refcell;

mod drives;
pub use drives::*;

bitflags::bitflags! {
    /// Status of a physical drive.
    pub struct DiskStatus: u8 {
        /// The drive has not been initialized yet.
        const NOINIT = 0x01;
        /// There is no medium in the drive.
        const NODISK = 0x02;
        /// The medium is write protected.
        const PROTECT = 0x04;
    }
}

#[cfg(feature = "defmt-log")]
impl defmt::Format for DiskStatus {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DiskStatus({=u8:#x})", self.bits())
    }
}

impl DiskStatus {
    /// Initialized with a medium present. Write protection does not count.
    pub fn is_ready(&self) -> bool {
        !self.intersects(DiskStatus::NOINIT | DiskStatus::NODISK)
    }
}

/// Ways a disk operation can fail.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// The drive has not been initialized. No I/O was attempted.
    NotReady,
    /// The transfer failed after the drive was ready.
    Io,
    /// The medium is write protected.
    WriteProtected,
    /// Bad argument: unknown ioctl command, empty transfer, short buffer, or a
    /// sector range past the end of the drive.
    ParamError,
}

/// FatFs `RES_OK`.
pub const RES_OK: u8 = 0;

impl Error {
    /// The FatFs `DRESULT` code for this error.
    pub fn code(&self) -> u8 {
        match self {
            Error::Io => 1,
            Error::WriteProtected => 2,
            Error::NotReady => 3,
            Error::ParamError => 4,
        }
    }
}

/// Convert an operation result into a FatFs `DRESULT` code.
pub fn result_code<T>(result: &Result<T, Error>) -> u8 {
    match result {
        Ok(_) => RES_OK,
        Err(e) => e.code(),
    }
}

/// Commands accepted by [`DiskIo::ioctl`].
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IoctlCommand {
    /// Finish any pending write.
    Sync,
    /// Number of sectors on the drive.
    GetSectorCount,
    /// Size of a sector in bytes.
    GetSectorSize,
    /// Erase block size.
    GetBlockSize,
    /// Anything else. Always rejected with [`Error::ParamError`].
    Other(u8),
}

impl IoctlCommand {
    const CTRL_SYNC: u8 = 0;
    const GET_SECTOR_COUNT: u8 = 1;
    const GET_SECTOR_SIZE: u8 = 2;
    const GET_BLOCK_SIZE: u8 = 3;

    /// Decode a FatFs `ioctl` command byte.
    pub fn from_code(code: u8) -> Self {
        match code {
            Self::CTRL_SYNC => IoctlCommand::Sync,
            Self::GET_SECTOR_COUNT => IoctlCommand::GetSectorCount,
            Self::GET_SECTOR_SIZE => IoctlCommand::GetSectorSize,
            Self::GET_BLOCK_SIZE => IoctlCommand::GetBlockSize,
            other => IoctlCommand::Other(other),
        }
    }

    /// The FatFs command byte.
    pub fn code(&self) -> u8 {
        match *self {
            IoctlCommand::Sync => Self::CTRL_SYNC,
            IoctlCommand::GetSectorCount => Self::GET_SECTOR_COUNT,
            IoctlCommand::GetSectorSize => Self::GET_SECTOR_SIZE,
            IoctlCommand::GetBlockSize => Self::GET_BLOCK_SIZE,
            IoctlCommand::Other(code) => code,
        }
    }
}

/// What a successful [`DiskIo::ioctl`] hands back.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IoctlResponse {
    /// Pending writes are done.
    Synced,
    /// Number of sectors (FatFs `DWORD`).
    SectorCount(u32),
    /// Sector size in bytes (FatFs `WORD`).
    SectorSize(u16),
    /// Erase block size (FatFs `DWORD`).
    BlockSize(u32),
}

/// A physical drive as seen by the filesystem.
///
/// Every backend (USB mass storage, SD card, RAM disk, a stub with nothing
/// behind it) implements this and nothing else, so the filesystem does not
/// care which one it is talking to.
pub trait DiskIo {
    /// Current drive status. Never performs I/O.
    fn status(&self) -> DiskStatus;
    /// Bring the drive up, if it isn't already, and report its status.
    fn initialize(&mut self) -> DiskStatus;
    /// Read `count` sectors, starting at `sector`, into `buffer`.
    fn read(&mut self, buffer: &mut [u8], sector: u32, count: u32) -> Result<(), Error>;
    /// Write `count` sectors from `buffer`, starting at `sector`.
    fn write(&mut self, buffer: &[u8], sector: u32, count: u32) -> Result<(), Error>;
    /// Miscellaneous drive control.
    fn ioctl(&mut self, command: IoctlCommand) -> Result<IoctlResponse, Error>;
}

impl<T> DiskIo for &mut T
where
    T: DiskIo + ?Sized,
{
    fn status(&self) -> DiskStatus {
        (**self).status()
    }

    fn initialize(&mut self) -> DiskStatus {
        (**self).initialize()
    }

    fn read(&mut self, buffer: &mut [u8], sector: u32, count: u32) -> Result<(), Error> {
        (**self).read(buffer, sector, count)
    }

    fn write(&mut self, buffer: &[u8], sector: u32, count: u32) -> Result<(), Error> {
        (**self).write(buffer, sector, count)
    }

    fn ioctl(&mut self, command: IoctlCommand) -> Result<IoctlResponse, Error> {
        (**self).ioctl(command)
    }
}

/// Number of bytes a `count`-sector transfer occupies in `buffer`, after
/// checking the transfer is not empty and the buffer is big enough.
pub(crate) fn transfer_len(count: u32, sector_size: u32, buffer_len: usize) -> Result<usize, Error> {
    if count == 0 {
        return Err(Error::ParamError);
    }
    let len = (count as usize)
        .checked_mul(sector_size as usize)
        .ok_or(Error::ParamError)?;
    if buffer_len < len {
        return Err(Error::ParamError);
    }
    Ok(len)
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
