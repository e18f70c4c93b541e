//! embedded-usbdisk - USB Mass Storage
//!
//! A [`DiskIo`](crate::DiskIo) drive on top of a USB mass-storage host class
//! driver. The class driver (bulk-only transport, SCSI command set, the host
//! controller itself) lives elsewhere; all it needs to do is implement
//! [`MassStorageHost`].

mod disk;
pub use disk::*;

mod scsi;
pub use scsi::*;

/// An error from the class driver.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TransportError<E> {
    /// The device took the command but reported it as failed. For TEST UNIT
    /// READY this means the medium is busy or not ready yet.
    LogicalCommandFailed,
    /// Anything else the class driver can go wrong with.
    Device(E),
}

/// The commands a USB mass-storage host class driver offers, for one attached
/// device.
///
/// Commands block until the device answers. None of them are expected to run
/// the host stack's background processing; [`poll`](MassStorageHost::poll)
/// does that.
pub trait MassStorageHost {
    /// Errors other than a logical command failure.
    type Error: core::fmt::Debug;

    /// Run the host stack (and class driver) tasks once. Called in a loop
    /// whenever the disk is waiting for something.
    fn poll(&mut self);

    /// A device is attached, enumerated and configured.
    fn is_configured(&self) -> bool;

    /// No transfer is in flight. Drivers that complete every command before
    /// returning can leave this as it is.
    fn is_idle(&mut self) -> bool {
        true
    }

    /// Index of the highest logical unit on the device.
    fn max_lun(&mut self) -> Result<u8, TransportError<Self::Error>>;

    /// Bulk-only mass storage reset.
    fn reset_interface(&mut self) -> Result<(), TransportError<Self::Error>>;

    fn request_sense(&mut self, lun: u8) -> Result<SenseData, TransportError<Self::Error>>;

    fn prevent_medium_removal(
        &mut self,
        lun: u8,
        prevent: bool,
    ) -> Result<(), TransportError<Self::Error>>;

    fn inquiry(&mut self, lun: u8) -> Result<InquiryData, TransportError<Self::Error>>;

    fn test_unit_ready(&mut self, lun: u8) -> Result<(), TransportError<Self::Error>>;

    fn read_capacity(&mut self, lun: u8) -> Result<DeviceCapacity, TransportError<Self::Error>>;

    /// Read `count` blocks of `block_size` bytes into `buffer`, which is
    /// exactly `count * block_size` long.
    fn read_blocks(
        &mut self,
        lun: u8,
        start_block: u32,
        count: u32,
        block_size: u32,
        buffer: &mut [u8],
    ) -> Result<(), TransportError<Self::Error>>;

    /// Write `count` blocks of `block_size` bytes from `buffer`, which is
    /// exactly `count * block_size` long.
    fn write_blocks(
        &mut self,
        lun: u8,
        start_block: u32,
        count: u32,
        block_size: u32,
        buffer: &[u8],
    ) -> Result<(), TransportError<Self::Error>>;

    /// Give up on the device: select configuration 0 so it stops being used.
    fn release(&mut self);
}
