//! # embedded-usbdisk
//!
//! > A FatFs-style disk I/O layer written in Embedded Rust
//!
//! This crate sits between a FAT filesystem (typically Chan's FatFs) and the
//! storage it lives on. The filesystem talks to every drive through the same
//! five operations (`status`, `initialize`, `read`, `write`, `ioctl`); this
//! crate supplies the drives. It is `#![no_std]` and does not use `alloc`.
//!
//! The main event is [`UsbDisk`], which brings up a USB thumb drive through
//! whatever mass-storage host class driver your board has (implement
//! [`MassStorageHost`] for it) and then serves sectors from it. There is also
//! a [`RamDisk`], a [`NoDisk`] placeholder, a [`Drives`] table that maps
//! FatFs drive numbers onto drives, and a [`DiskBlockDevice`] for code that
//! prefers 512-byte [`Block`]s.
//!
//! ## Using the crate
//!
//! ```rust,ignore
//! # struct MsHost;
//! # struct Delay;
//! let mut usb = embedded_usbdisk::UsbDisk::new(ms_host, delay);
//! let mut drives: embedded_usbdisk::Drives<_, 3> =
//!     embedded_usbdisk::Drives::new(embedded_usbdisk::FixedTimeSource::default());
//! drives.attach(embedded_usbdisk::USB_DRIVE, &mut usb).unwrap();
//! write!(uart, "Init USB disk...").unwrap();
//! let status = drives.disk_initialize(embedded_usbdisk::USB_DRIVE);
//! if status.is_ready() {
//!     let mut sector = [0u8; 512];
//!     match drives.disk_read(embedded_usbdisk::USB_DRIVE, &mut sector, 0, 1) {
//!         Ok(()) => writeln!(uart, "OK!").unwrap(),
//!         Err(e) => writeln!(uart, "Err: {:?}", e).unwrap(),
//!     }
//! } else {
//!     writeln!(uart, "Disk enumeration failed: {:?}", status).unwrap();
//! }
//! ```
//!
//! ## Features
//!
//! * `defmt-log`: By turning off the default features and enabling the `defmt-log` feature you can
//! configure this crate to log messages over defmt instead.
//! * `refcell-blockdevice`: `DiskIo` for `RefCell`-wrapped drives.
//!
//! Make sure that either the `log` feature or the `defmt-log` feature is enabled.

#![cfg_attr(not(test), no_std)]
// #![deny(missing_docs)]

// ****************************************************************************
//
// Imports
//
// ****************************************************************************


#[macro_use]
mod structure;

pub mod block_device;
pub mod diskio;
pub mod nodisk;
pub mod ramdisk;
pub mod timestamp;
pub mod usb;

pub use crate::block_device::{Block, BlockCount, BlockDevice, BlockIdx, DiskBlockDevice};
pub use crate::diskio::Error as DiskError;
pub use crate::diskio::{
    result_code, DiskIo, DiskStatus, Drives, IoctlCommand, IoctlResponse, ATA_DRIVE, MMC_DRIVE,
    USB_DRIVE,
};
pub use crate::nodisk::NoDisk;
pub use crate::ramdisk::RamDisk;
pub use crate::timestamp::{FixedTimeSource, TimeSource, Timestamp};
pub use crate::usb::{
    DeviceCapacity, EnumerationError, EnumerationPolicy, EnumerationState, MassStorageHost,
    TransportError, UsbDisk, UsbDiskConfig,
};

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
