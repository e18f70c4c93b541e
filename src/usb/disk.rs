//! embedded-usbdisk - USB disk
//!
//! Walks an attached mass-storage device through enumeration (attach,
//! interface setup, readiness polling, capacity) and then serves sector I/O
//! from it.
//!
//! This is currently optimised for readability and debugability, not
//! performance.

use embedded_hal::blocking::delay::DelayMs;

use super::{DeviceCapacity, InquiryData, MassStorageHost, SenseData, TransportError};
use crate::diskio::{transfer_len, DiskIo, DiskStatus, Error, IoctlCommand, IoctlResponse};

#[cfg(feature = "log")]
use log::{debug, trace, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace, warn};

/// Erase block size reported by [`IoctlCommand::GetBlockSize`] unless
/// configured otherwise. Mass-storage devices don't tell us theirs.
pub const DEFAULT_ERASE_BLOCK_SIZE: u32 = 4 * 1024;

/// How long [`IoctlCommand::Sync`] waits for the transport to go idle, unless
/// configured otherwise.
pub const DEFAULT_SYNC_TIMEOUT_MS: u32 = 50;

/// What to do when one of the diagnostic setup commands (REQUEST SENSE,
/// PREVENT MEDIUM REMOVAL, INQUIRY) fails during enumeration.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnumerationPolicy {
    /// Give up on the device.
    Strict,
    /// Log a warning and carry on.
    Lenient,
}

/// Options for a [`UsbDisk`].
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UsbDiskConfig {
    /// Logical unit to use. Most sticks only have LUN 0.
    pub lun: u8,
    /// Value reported for [`IoctlCommand::GetBlockSize`].
    pub erase_block_size: u32,
    /// Upper bound for [`IoctlCommand::Sync`], in milliseconds.
    pub sync_timeout_ms: u32,
    /// How strictly to treat diagnostic command failures during enumeration.
    pub policy: EnumerationPolicy,
    /// Report the drive as write protected and refuse writes.
    pub read_only: bool,
}

impl Default for UsbDiskConfig {
    fn default() -> Self {
        UsbDiskConfig {
            lun: 0,
            erase_block_size: DEFAULT_ERASE_BLOCK_SIZE,
            sync_timeout_ms: DEFAULT_SYNC_TIMEOUT_MS,
            policy: EnumerationPolicy::Lenient,
            read_only: false,
        }
    }
}

/// Where a [`UsbDisk`] is in bringing up its device.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnumerationState {
    /// Nothing attempted yet, or reset since.
    Uninitialized,
    /// Waiting for the host stack to configure a device.
    WaitingForAttach,
    /// Device configured; waiting for TEST UNIT READY to pass.
    PollingReady,
    /// Capacity known.
    Enumerated,
    /// Serving I/O.
    Ready,
    /// Enumeration gave up. Call `initialize` again to retry.
    Failed,
}

/// Why enumeration gave up.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EnumerationError<E> {
    /// GET MAX LUN failed.
    MaxLun(TransportError<E>),
    /// The configured LUN isn't on this device.
    LunOutOfRange { lun: u8, max_lun: u8 },
    /// Bulk-only mass storage reset failed.
    ResetInterface(TransportError<E>),
    /// REQUEST SENSE failed (strict policy only).
    RequestSense(TransportError<E>),
    /// PREVENT MEDIUM REMOVAL failed (strict policy only).
    PreventRemoval(TransportError<E>),
    /// INQUIRY failed (strict policy only).
    Inquiry(TransportError<E>),
    /// TEST UNIT READY failed with something other than "busy".
    TestUnitReady(TransportError<E>),
    /// READ CAPACITY failed.
    ReadCapacity(TransportError<E>),
    /// READ CAPACITY reported a block size we can't use.
    InvalidCapacity(DeviceCapacity),
}

/// A USB mass-storage device presented as a [`DiskIo`] drive.
///
/// One `UsbDisk` per drive; it owns the class driver handle for as long as
/// it lives. Waits are cooperative: every loop iteration calls
/// [`MassStorageHost::poll`] so the host stack keeps running.
pub struct UsbDisk<T, D>
where
    T: MassStorageHost,
    D: DelayMs<u32>,
{
    transport: T,
    delay: D,
    config: UsbDiskConfig,
    state: EnumerationState,
    status: DiskStatus,
    capacity: Option<DeviceCapacity>,
    inquiry: Option<InquiryData>,
}

impl<T, D> UsbDisk<T, D>
where
    T: MassStorageHost,
    D: DelayMs<u32>,
{
    /// Create a new disk with default options.
    pub fn new(transport: T, delay: D) -> Self {
        Self::new_with_config(transport, delay, UsbDiskConfig::default())
    }

    /// Create a new disk.
    pub fn new_with_config(transport: T, delay: D, config: UsbDiskConfig) -> Self {
        UsbDisk {
            transport,
            delay,
            config,
            state: EnumerationState::Uninitialized,
            status: DiskStatus::NOINIT,
            capacity: None,
            inquiry: None,
        }
    }

    /// Where enumeration has got to.
    pub fn state(&self) -> EnumerationState {
        self.state
    }

    /// The options this disk was built with.
    pub fn config(&self) -> &UsbDiskConfig {
        &self.config
    }

    /// Capacity found during enumeration.
    pub fn capacity(&self) -> Option<DeviceCapacity> {
        self.capacity
    }

    /// Inquiry data found during enumeration, if the device answered.
    pub fn inquiry(&self) -> Option<&InquiryData> {
        self.inquiry.as_ref()
    }

    /// The class driver handle.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The class driver handle, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give back the class driver handle and delay.
    pub fn free(self) -> (T, D) {
        (self.transport, self.delay)
    }

    /// Forget the device (after a detach, say) so the next `initialize`
    /// enumerates from scratch.
    pub fn reset(&mut self) {
        debug!("Resetting USB disk");
        self.transport.release();
        self.state = EnumerationState::Uninitialized;
        self.status = DiskStatus::NOINIT;
        self.capacity = None;
        self.inquiry = None;
    }

    /// Enumerate the device unless that has already been done, and report
    /// why if it fails. Blocks until a device is attached and ready.
    pub fn enumerate(&mut self) -> Result<DeviceCapacity, EnumerationError<T::Error>> {
        if let (EnumerationState::Ready, Some(capacity)) = (self.state, self.capacity) {
            return Ok(capacity);
        }
        self.status = DiskStatus::NOINIT;
        self.capacity = None;
        self.inquiry = None;

        match self.run_enumeration() {
            Ok(capacity) => {
                self.capacity = Some(capacity);
                self.state = EnumerationState::Ready;
                self.status.remove(DiskStatus::NOINIT);
                if self.config.read_only {
                    self.status.insert(DiskStatus::PROTECT);
                }
                Ok(capacity)
            }
            Err(e) => {
                warn!("Disk enumeration failed in state {:?}", self.state);
                self.transport.release();
                self.state = EnumerationState::Failed;
                Err(e)
            }
        }
    }

    fn run_enumeration(&mut self) -> Result<DeviceCapacity, EnumerationError<T::Error>> {
        self.state = EnumerationState::WaitingForAttach;
        self.wait_for_attach();
        self.configure()?;

        self.state = EnumerationState::PollingReady;
        self.wait_until_ready()?;

        let capacity = self
            .transport
            .read_capacity(self.config.lun)
            .map_err(EnumerationError::ReadCapacity)?;
        if capacity.block_size == 0 || capacity.block_size > u32::from(u16::MAX) {
            return Err(EnumerationError::InvalidCapacity(capacity));
        }
        self.state = EnumerationState::Enumerated;
        debug!(
            "{} blocks of {} bytes",
            capacity.block_count, capacity.block_size
        );
        Ok(capacity)
    }

    fn wait_for_attach(&mut self) {
        debug!("Waiting for device...");
        while !self.transport.is_configured() {
            self.transport.poll();
        }
        debug!("Device attached");
    }

    /// Interface setup done once the host stack has configured the device.
    fn configure(&mut self) -> Result<(), EnumerationError<T::Error>> {
        let lun = self.config.lun;
        let max_lun = self
            .transport
            .max_lun()
            .map_err(EnumerationError::MaxLun)?;
        debug!(
            "Total LUNs: {} - using LUN {}",
            u16::from(max_lun) + 1,
            lun
        );
        if lun > max_lun {
            return Err(EnumerationError::LunOutOfRange { lun, max_lun });
        }

        self.transport
            .reset_interface()
            .map_err(EnumerationError::ResetInterface)?;

        let sense = self
            .transport
            .request_sense(lun)
            .map_err(EnumerationError::RequestSense);
        if let Some(sense) = self.diagnostic("REQUEST SENSE", sense)? {
            log_sense(&sense);
        }

        let prevent = self
            .transport
            .prevent_medium_removal(lun, true)
            .map_err(EnumerationError::PreventRemoval);
        self.diagnostic("PREVENT MEDIUM REMOVAL", prevent)?;

        let inquiry = self
            .transport
            .inquiry(lun)
            .map_err(EnumerationError::Inquiry);
        if let Some(inquiry) = self.diagnostic("INQUIRY", inquiry)? {
            debug!(
                "Vendor \"{}\" Product \"{}\" Revision \"{}\"",
                inquiry.vendor_id(),
                inquiry.product_id(),
                inquiry.revision_id()
            );
            self.inquiry = Some(inquiry);
        }

        debug!("Mass storage interface configured");
        Ok(())
    }

    /// Apply the enumeration policy to the outcome of a diagnostic command.
    fn diagnostic<R>(
        &self,
        command: &str,
        result: Result<R, EnumerationError<T::Error>>,
    ) -> Result<Option<R>, EnumerationError<T::Error>> {
        match (result, self.config.policy) {
            (Ok(r), _) => Ok(Some(r)),
            (Err(e), EnumerationPolicy::Strict) => Err(e),
            (Err(_), EnumerationPolicy::Lenient) => {
                warn!("{} failed, continuing", command);
                Ok(None)
            }
        }
    }

    /// Spin on TEST UNIT READY until the medium is ready. "Busy" is retried
    /// for as long as it takes; anything else is fatal.
    fn wait_until_ready(&mut self) -> Result<(), EnumerationError<T::Error>> {
        debug!("Waiting for ready...");
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match self.transport.test_unit_ready(self.config.lun) {
                Ok(()) => break,
                Err(TransportError::LogicalCommandFailed) => {
                    trace!("Device busy, attempt {}", attempts);
                    self.transport.poll();
                }
                Err(e) => {
                    warn!("TEST UNIT READY failed after {} attempts", attempts);
                    return Err(EnumerationError::TestUnitReady(e));
                }
            }
        }
        debug!("Ready after {} attempts", attempts);
        Ok(())
    }

    /// Poll the transport until it is idle, for at most the configured sync
    /// timeout.
    fn wait_idle(&mut self) -> bool {
        let mut waited_ms = 0;
        loop {
            self.transport.poll();
            if self.transport.is_idle() {
                return true;
            }
            if waited_ms >= self.config.sync_timeout_ms {
                warn!("Transport still busy after {} ms", waited_ms);
                return false;
            }
            self.delay.delay_ms(1u32);
            waited_ms += 1;
        }
    }

    /// Capacity, if the drive is ready for I/O.
    fn ready_capacity(&self) -> Result<DeviceCapacity, Error> {
        if self.status.contains(DiskStatus::NOINIT) {
            return Err(Error::NotReady);
        }
        self.capacity.ok_or(Error::NotReady)
    }
}

fn log_sense(sense: &SenseData) {
    if sense.is_no_sense() {
        trace!("No sense data");
    } else {
        debug!(
            "Sense key {:x}, ASC {:x}, ASCQ {:x}",
            sense.sense_key(),
            sense.additional_sense_code(),
            sense.additional_sense_code_qualifier()
        );
    }
}

impl<T, D> DiskIo for UsbDisk<T, D>
where
    T: MassStorageHost,
    D: DelayMs<u32>,
{
    fn status(&self) -> DiskStatus {
        self.status
    }

    fn initialize(&mut self) -> DiskStatus {
        match self.state {
            EnumerationState::Uninitialized | EnumerationState::Failed => {
                // The status says it all; the reason has already been logged.
                let _ = self.enumerate();
            }
            _ => trace!("Already enumerated"),
        }
        self.status
    }

    fn read(&mut self, buffer: &mut [u8], sector: u32, count: u32) -> Result<(), Error> {
        let capacity = self.ready_capacity()?;
        let len = transfer_len(count, capacity.block_size, buffer.len())?;
        self.transport
            .read_blocks(
                self.config.lun,
                sector,
                count,
                capacity.block_size,
                &mut buffer[..len],
            )
            .map_err(|_e| {
                warn!("Error reading {} blocks at {}", count, sector);
                Error::Io
            })
    }

    fn write(&mut self, buffer: &[u8], sector: u32, count: u32) -> Result<(), Error> {
        let capacity = self.ready_capacity()?;
        if self.status.contains(DiskStatus::PROTECT) {
            return Err(Error::WriteProtected);
        }
        let len = transfer_len(count, capacity.block_size, buffer.len())?;
        self.transport
            .write_blocks(
                self.config.lun,
                sector,
                count,
                capacity.block_size,
                &buffer[..len],
            )
            .map_err(|_e| {
                warn!("Error writing {} blocks at {}", count, sector);
                Error::Io
            })
    }

    fn ioctl(&mut self, command: IoctlCommand) -> Result<IoctlResponse, Error> {
        let capacity = self.ready_capacity()?;
        match command {
            IoctlCommand::Sync => {
                if self.wait_idle() {
                    Ok(IoctlResponse::Synced)
                } else {
                    Err(Error::Io)
                }
            }
            IoctlCommand::GetSectorCount => Ok(IoctlResponse::SectorCount(capacity.block_count)),
            // Enumeration rejects block sizes that don't fit.
            IoctlCommand::GetSectorSize => {
                Ok(IoctlResponse::SectorSize(capacity.block_size as u16))
            }
            IoctlCommand::GetBlockSize => {
                Ok(IoctlResponse::BlockSize(self.config.erase_block_size))
            }
            IoctlCommand::Other(_) => Err(Error::ParamError),
        }
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
