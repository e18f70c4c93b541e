use core::convert::TryFrom;

use crate::diskio::{DiskIo, Error, IoctlCommand, IoctlResponse};

use super::{Block, BlockCount, BlockDevice, BlockIdx};

#[cfg(feature = "log")]
use log::{debug, trace};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace};

/// Presents an initialized drive as a [`BlockDevice`].
///
/// Only drives with 512-byte sectors qualify; a USB stick reporting 4 KiB
/// sectors is turned away at construction.
#[derive(Debug)]
pub struct DiskBlockDevice<D>
where
    D: DiskIo,
{
    disk: D,
    num_blocks: BlockCount,
}

impl<D> DiskBlockDevice<D>
where
    D: DiskIo,
{
    /// Wrap a drive that has already been initialized.
    pub fn new(mut disk: D) -> Result<Self, (Error, D)> {
        if !disk.status().is_ready() {
            return Err((Error::NotReady, disk));
        }
        match disk.ioctl(IoctlCommand::GetSectorSize) {
            Ok(IoctlResponse::SectorSize(size)) if u32::from(size) == Block::LEN_U32 => {}
            Ok(_) => return Err((Error::ParamError, disk)),
            Err(e) => return Err((e, disk)),
        }
        let num_blocks = match disk.ioctl(IoctlCommand::GetSectorCount) {
            Ok(IoctlResponse::SectorCount(count)) => BlockCount(count),
            Ok(_) => return Err((Error::ParamError, disk)),
            Err(e) => return Err((e, disk)),
        };
        debug!("Block device over drive with {} blocks", num_blocks.0);
        Ok(DiskBlockDevice { disk, num_blocks })
    }

    /// Index of every block in `start..start + len`, or `ParamError` if any
    /// of them lies past the end of the drive.
    fn checked_indices(
        &self,
        start: BlockIdx,
        len: usize,
    ) -> Result<impl Iterator<Item = BlockIdx>, Error> {
        let len = u32::try_from(len).map_err(|_| Error::ParamError)?;
        match start.0.checked_add(len) {
            Some(end) if end <= self.num_blocks.0 => Ok((start.0..end).map(BlockIdx)),
            _ => Err(Error::ParamError),
        }
    }

    /// Give back the drive.
    pub fn free(self) -> D {
        self.disk
    }
}

impl<D> BlockDevice for DiskBlockDevice<D>
where
    D: DiskIo,
{
    type Error = Error;

    fn read(
        &mut self,
        blocks: &mut [Block],
        start_block_idx: BlockIdx,
        reason: &str,
    ) -> Result<(), Self::Error> {
        trace!("Reading {} blocks at {} for {}", blocks.len(), start_block_idx.0, reason);
        let indices = self.checked_indices(start_block_idx, blocks.len())?;
        for (block, idx) in blocks.iter_mut().zip(indices) {
            self.disk.read(&mut block.contents, idx.0, 1)?;
        }
        Ok(())
    }

    fn write(&mut self, blocks: &[Block], start_block_idx: BlockIdx) -> Result<(), Self::Error> {
        let indices = self.checked_indices(start_block_idx, blocks.len())?;
        for (block, idx) in blocks.iter().zip(indices) {
            self.disk.write(&block.contents, idx.0, 1)?;
        }
        Ok(())
    }

    fn num_blocks(&mut self) -> Result<BlockCount, Self::Error> {
        Ok(self.num_blocks)
    }
}
