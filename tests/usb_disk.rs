use std::collections::VecDeque;

use embedded_hal::blocking::delay::DelayMs;
use embedded_usbdisk::{
    usb::{InquiryData, SenseData},
    DeviceCapacity, DiskError, DiskIo, DiskStatus, EnumerationError, EnumerationPolicy,
    EnumerationState, IoctlCommand, IoctlResponse, MassStorageHost, TransportError, UsbDisk,
    UsbDiskConfig,
};
use hex_literal::hex;

#[derive(Debug, Copy, Clone, PartialEq)]
struct FakeError(u8);

type FakeResult<T> = Result<T, TransportError<FakeError>>;

#[derive(Debug, Default, Clone, PartialEq)]
struct Calls {
    poll: usize,
    max_lun: usize,
    reset_interface: usize,
    request_sense: usize,
    prevent_removal: usize,
    inquiry: usize,
    test_unit_ready: usize,
    read_capacity: usize,
    read_blocks: usize,
    write_blocks: usize,
    release: usize,
}

/// A class driver with scripted answers.
struct FakeHost {
    polls_until_attached: usize,
    max_lun: u8,
    fail_max_lun: bool,
    fail_reset: bool,
    fail_sense: bool,
    fail_prevent: bool,
    fail_inquiry: bool,
    tur_script: VecDeque<FakeResult<()>>,
    capacity: FakeResult<DeviceCapacity>,
    fail_read: bool,
    fail_write: bool,
    busy_checks: usize,
    medium: Vec<u8>,
    calls: Calls,
}

impl FakeHost {
    fn new(block_count: u32, block_size: u32) -> FakeHost {
        FakeHost {
            polls_until_attached: 0,
            max_lun: 0,
            fail_max_lun: false,
            fail_reset: false,
            fail_sense: false,
            fail_prevent: false,
            fail_inquiry: false,
            tur_script: VecDeque::new(),
            capacity: Ok(DeviceCapacity {
                block_count,
                block_size,
            }),
            fail_read: false,
            fail_write: false,
            busy_checks: 0,
            medium: Vec::new(),
            calls: Calls::default(),
        }
    }

    /// A small device whose blocks can actually be read and written.
    fn with_medium(block_count: u32, block_size: u32) -> FakeHost {
        let mut host = FakeHost::new(block_count, block_size);
        host.medium = (0..block_count as usize * block_size as usize)
            .map(|i| (i / block_size as usize) as u8)
            .collect();
        host
    }

    fn fail(code: u8) -> TransportError<FakeError> {
        TransportError::Device(FakeError(code))
    }
}

impl MassStorageHost for FakeHost {
    type Error = FakeError;

    fn poll(&mut self) {
        self.calls.poll += 1;
        self.polls_until_attached = self.polls_until_attached.saturating_sub(1);
    }

    fn is_configured(&self) -> bool {
        self.polls_until_attached == 0
    }

    fn is_idle(&mut self) -> bool {
        if self.busy_checks > 0 {
            self.busy_checks -= 1;
            false
        } else {
            true
        }
    }

    fn max_lun(&mut self) -> FakeResult<u8> {
        self.calls.max_lun += 1;
        if self.fail_max_lun {
            return Err(Self::fail(8));
        }
        Ok(self.max_lun)
    }

    fn reset_interface(&mut self) -> FakeResult<()> {
        self.calls.reset_interface += 1;
        if self.fail_reset {
            return Err(Self::fail(9));
        }
        Ok(())
    }

    fn request_sense(&mut self, _lun: u8) -> FakeResult<SenseData> {
        self.calls.request_sense += 1;
        if self.fail_sense {
            return Err(Self::fail(1));
        }
        Ok(SenseData::from_bytes(&hex!("70 00 06 00 00 00 00 0a 00 00 00 00 28 00")).unwrap())
    }

    fn prevent_medium_removal(&mut self, _lun: u8, _prevent: bool) -> FakeResult<()> {
        self.calls.prevent_removal += 1;
        if self.fail_prevent {
            return Err(Self::fail(2));
        }
        Ok(())
    }

    fn inquiry(&mut self, _lun: u8) -> FakeResult<InquiryData> {
        self.calls.inquiry += 1;
        if self.fail_inquiry {
            return Err(Self::fail(3));
        }
        Ok(InquiryData::from_bytes(&hex!(
            "00 80 06 02 1f 00 00 00 4b 69 6e 67 73 74 6f 6e 44 61 74 61 54 72 61 76 65 6c 65 72 20 32 2e 30 31 2e 30 30"
        ))
        .unwrap())
    }

    fn test_unit_ready(&mut self, _lun: u8) -> FakeResult<()> {
        self.calls.test_unit_ready += 1;
        self.tur_script.pop_front().unwrap_or(Ok(()))
    }

    fn read_capacity(&mut self, _lun: u8) -> FakeResult<DeviceCapacity> {
        self.calls.read_capacity += 1;
        self.capacity
    }

    fn read_blocks(
        &mut self,
        _lun: u8,
        start_block: u32,
        count: u32,
        block_size: u32,
        buffer: &mut [u8],
    ) -> FakeResult<()> {
        self.calls.read_blocks += 1;
        if self.fail_read {
            return Err(Self::fail(5));
        }
        assert_eq!(buffer.len(), (count * block_size) as usize);
        let start = (start_block * block_size) as usize;
        buffer.copy_from_slice(&self.medium[start..start + buffer.len()]);
        Ok(())
    }

    fn write_blocks(
        &mut self,
        _lun: u8,
        start_block: u32,
        count: u32,
        block_size: u32,
        buffer: &[u8],
    ) -> FakeResult<()> {
        self.calls.write_blocks += 1;
        if self.fail_write {
            return Err(Self::fail(6));
        }
        assert_eq!(buffer.len(), (count * block_size) as usize);
        let start = (start_block * block_size) as usize;
        self.medium[start..start + buffer.len()].copy_from_slice(buffer);
        Ok(())
    }

    fn release(&mut self) {
        self.calls.release += 1;
    }
}

#[derive(Debug, Default)]
struct CountingDelay {
    total_ms: u32,
}

impl DelayMs<u32> for CountingDelay {
    fn delay_ms(&mut self, ms: u32) {
        self.total_ms += ms;
    }
}

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn disk(host: FakeHost) -> UsbDisk<FakeHost, CountingDelay> {
    init_log();
    UsbDisk::new(host, CountingDelay::default())
}

fn disk_with(host: FakeHost, config: UsbDiskConfig) -> UsbDisk<FakeHost, CountingDelay> {
    init_log();
    UsbDisk::new_with_config(host, CountingDelay::default(), config)
}

#[test]
fn uninitialized_disk_refuses_everything_without_io() {
    let mut disk = disk(FakeHost::with_medium(4, 512));
    assert_eq!(disk.status(), DiskStatus::NOINIT);

    let mut buffer = [0xAAu8; 512];
    assert_eq!(disk.read(&mut buffer, 0, 1), Err(DiskError::NotReady));
    assert!(buffer.iter().all(|&b| b == 0xAA));
    assert_eq!(disk.write(&buffer, 0, 1), Err(DiskError::NotReady));

    for command in [
        IoctlCommand::Sync,
        IoctlCommand::GetSectorCount,
        IoctlCommand::GetSectorSize,
        IoctlCommand::GetBlockSize,
        IoctlCommand::Other(42),
    ]
    .iter()
    {
        assert_eq!(disk.ioctl(*command), Err(DiskError::NotReady));
    }

    assert_eq!(disk.transport().calls, Calls::default());
    assert_eq!(disk.state(), EnumerationState::Uninitialized);
}

#[test]
fn enumeration_reports_capacity() {
    let mut host = FakeHost::new(1_000_000, 512);
    host.polls_until_attached = 3;
    let mut disk = disk(host);

    assert_eq!(disk.initialize(), DiskStatus::empty());
    assert_eq!(disk.state(), EnumerationState::Ready);
    assert_eq!(
        disk.ioctl(IoctlCommand::GetSectorCount),
        Ok(IoctlResponse::SectorCount(1_000_000))
    );
    assert_eq!(
        disk.ioctl(IoctlCommand::GetSectorSize),
        Ok(IoctlResponse::SectorSize(512))
    );

    let calls = &disk.transport().calls;
    assert!(calls.poll >= 3);
    assert_eq!(calls.test_unit_ready, 1);
    assert_eq!(calls.read_capacity, 1);
    assert_eq!(calls.release, 0);

    let inquiry = disk.inquiry().unwrap();
    assert_eq!(inquiry.vendor_id(), "Kingston");
    assert_eq!(inquiry.product_id(), "DataTraveler 2.0");
    assert_eq!(inquiry.revision_id(), "1.00");
}

#[test]
fn second_initialize_does_no_io() {
    let mut disk = disk(FakeHost::new(1_000_000, 512));
    let first = disk.initialize();
    let calls = disk.transport().calls.clone();

    let second = disk.initialize();
    assert_eq!(first, second);
    assert_eq!(disk.transport().calls, calls);
    assert_eq!(
        disk.enumerate(),
        Ok(DeviceCapacity {
            block_count: 1_000_000,
            block_size: 512
        })
    );
    assert_eq!(disk.transport().calls, calls);
}

#[test]
fn busy_device_is_polled_until_ready() {
    let mut host = FakeHost::new(2048, 512);
    for _ in 0..3 {
        host.tur_script
            .push_back(Err(TransportError::LogicalCommandFailed));
    }
    let mut disk = disk(host);

    assert!(disk.initialize().is_ready());
    assert_eq!(disk.transport().calls.test_unit_ready, 4);
}

#[test]
fn hard_test_unit_ready_failure_aborts_before_capacity() {
    let mut host = FakeHost::new(2048, 512);
    host.tur_script.push_back(Err(FakeHost::fail(4)));
    let mut disk = disk(host);

    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::TestUnitReady(TransportError::Device(
            FakeError(4)
        )))
    );
    assert_eq!(disk.status(), DiskStatus::NOINIT);
    assert_eq!(disk.state(), EnumerationState::Failed);
    assert_eq!(disk.transport().calls.read_capacity, 0);
    assert_eq!(disk.transport().calls.release, 1);

    let mut buffer = [0u8; 512];
    assert_eq!(disk.read(&mut buffer, 0, 1), Err(DiskError::NotReady));
}

#[test]
fn failed_enumeration_can_be_retried() {
    let mut host = FakeHost::new(2048, 512);
    host.tur_script.push_back(Err(FakeHost::fail(4)));
    let mut disk = disk(host);

    assert_eq!(disk.initialize(), DiskStatus::NOINIT);
    assert!(disk.initialize().is_ready());
    assert_eq!(disk.transport().calls.test_unit_ready, 2);
    assert_eq!(disk.transport().calls.read_capacity, 1);
}

#[test]
fn capacity_failure_is_fatal() {
    let mut host = FakeHost::new(2048, 512);
    host.capacity = Err(FakeHost::fail(7));
    let mut disk = disk(host);

    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::ReadCapacity(TransportError::Device(
            FakeError(7)
        )))
    );
    assert_eq!(disk.status(), DiskStatus::NOINIT);
}

#[test]
fn zero_block_size_is_rejected() {
    let mut disk = disk(FakeHost::new(2048, 0));
    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::InvalidCapacity(DeviceCapacity {
            block_count: 2048,
            block_size: 0
        }))
    );
    assert_eq!(disk.status(), DiskStatus::NOINIT);
}

#[test]
fn oversized_block_size_is_rejected() {
    let mut disk = disk(FakeHost::new(10, 65536));
    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::InvalidCapacity(DeviceCapacity {
            block_count: 10,
            block_size: 65536
        }))
    );
    assert_eq!(disk.status(), DiskStatus::NOINIT);
    assert_eq!(disk.transport().calls.release, 1);
}

#[test]
fn max_lun_failure_is_always_fatal() {
    let mut host = FakeHost::new(1000, 512);
    host.fail_max_lun = true;
    let mut disk = disk(host);

    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::MaxLun(TransportError::Device(FakeError(8))))
    );
    assert_eq!(disk.status(), DiskStatus::NOINIT);
    assert_eq!(disk.state(), EnumerationState::Failed);
    let calls = &disk.transport().calls;
    assert_eq!(calls.reset_interface, 0);
    assert_eq!(calls.test_unit_ready, 0);
    assert_eq!(calls.release, 1);
}

#[test]
fn interface_reset_failure_is_always_fatal() {
    let mut host = FakeHost::new(1000, 512);
    host.fail_reset = true;
    let mut disk = disk(host);

    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::ResetInterface(TransportError::Device(
            FakeError(9)
        )))
    );
    assert_eq!(disk.status(), DiskStatus::NOINIT);
    assert_eq!(disk.state(), EnumerationState::Failed);
    let calls = &disk.transport().calls;
    assert_eq!(calls.request_sense, 0);
    assert_eq!(calls.test_unit_ready, 0);
    assert_eq!(calls.release, 1);
}

#[test]
fn write_failure_keeps_disk_ready() {
    let mut host = FakeHost::with_medium(16, 512);
    host.fail_write = true;
    let mut disk = disk(host);
    assert!(disk.initialize().is_ready());

    let buffer = [0x55u8; 1024];
    assert_eq!(disk.write(&buffer, 5, 2), Err(DiskError::Io));
    assert!(disk.status().is_ready());
    assert_eq!(disk.state(), EnumerationState::Ready);
    assert_eq!(disk.transport().calls.write_blocks, 1);
    assert_eq!(disk.transport().calls.release, 0);
}

#[test]
fn read_failure_is_not_retried() {
    let mut host = FakeHost::with_medium(16, 512);
    host.fail_read = true;
    let mut disk = disk(host);
    disk.initialize();

    let mut buffer = [0u8; 512];
    assert_eq!(disk.read(&mut buffer, 0, 1), Err(DiskError::Io));
    assert_eq!(disk.transport().calls.read_blocks, 1);
    assert!(disk.status().is_ready());
}

#[test]
fn sectors_round_trip_through_the_device() {
    let mut disk = disk(FakeHost::with_medium(16, 512));
    disk.initialize();

    let mut buffer = [0u8; 1024];
    disk.read(&mut buffer, 2, 2).unwrap();
    assert!(buffer[..512].iter().all(|&b| b == 2));
    assert!(buffer[512..].iter().all(|&b| b == 3));

    let data = [0xC3u8; 512];
    disk.write(&data, 9, 1).unwrap();
    let mut readback = [0u8; 512];
    disk.read(&mut readback, 9, 1).unwrap();
    assert_eq!(&readback[..], &data[..]);

    assert_eq!(
        disk.ioctl(IoctlCommand::GetSectorCount),
        Ok(IoctlResponse::SectorCount(16))
    );
}

#[test]
fn bad_transfers_never_reach_the_device() {
    let mut disk = disk(FakeHost::with_medium(16, 512));
    disk.initialize();

    let mut short = [0u8; 511];
    assert_eq!(disk.read(&mut short, 0, 1), Err(DiskError::ParamError));
    let mut buffer = [0u8; 512];
    assert_eq!(disk.read(&mut buffer, 0, 0), Err(DiskError::ParamError));
    assert_eq!(disk.write(&buffer, 0, 2), Err(DiskError::ParamError));
    assert_eq!(disk.transport().calls.read_blocks, 0);
    assert_eq!(disk.transport().calls.write_blocks, 0);
}

#[test]
fn erase_block_size_comes_from_config() {
    let mut disk = disk(FakeHost::new(1000, 4096));
    disk.initialize();
    assert_eq!(
        disk.ioctl(IoctlCommand::GetBlockSize),
        Ok(IoctlResponse::BlockSize(4 * 1024))
    );

    let config = UsbDiskConfig {
        erase_block_size: 64 * 1024,
        ..Default::default()
    };
    let mut disk = disk_with(FakeHost::new(1000, 512), config);
    disk.initialize();
    assert_eq!(
        disk.ioctl(IoctlCommand::GetBlockSize),
        Ok(IoctlResponse::BlockSize(64 * 1024))
    );
}

#[test]
fn unknown_ioctl_is_a_parameter_error() {
    let mut disk = disk(FakeHost::new(1000, 512));
    disk.initialize();
    assert_eq!(
        disk.ioctl(IoctlCommand::from_code(0x20)),
        Err(DiskError::ParamError)
    );
}

#[test]
fn sync_waits_for_idle_transport() {
    let mut host = FakeHost::new(1000, 512);
    host.busy_checks = 10;
    let mut disk = disk(host);
    disk.initialize();

    assert_eq!(disk.ioctl(IoctlCommand::Sync), Ok(IoctlResponse::Synced));
    let (_host, delay) = disk.free();
    assert_eq!(delay.total_ms, 10);
}

#[test]
fn sync_gives_up_after_timeout() {
    let mut host = FakeHost::new(1000, 512);
    host.busy_checks = 1000;
    let mut disk = disk(host);
    disk.initialize();

    assert_eq!(disk.ioctl(IoctlCommand::Sync), Err(DiskError::Io));
    assert!(disk.status().is_ready());
    let (_host, delay) = disk.free();
    assert_eq!(delay.total_ms, 50);
}

#[test]
fn lenient_policy_tolerates_diagnostic_failures() {
    let mut host = FakeHost::new(1000, 512);
    host.fail_sense = true;
    host.fail_prevent = true;
    host.fail_inquiry = true;
    let mut disk = disk(host);

    assert!(disk.initialize().is_ready());
    assert!(disk.inquiry().is_none());
    assert_eq!(disk.transport().calls.test_unit_ready, 1);
}

#[test]
fn strict_policy_aborts_on_prevent_removal_failure() {
    let mut host = FakeHost::new(1000, 512);
    host.fail_prevent = true;
    let config = UsbDiskConfig {
        policy: EnumerationPolicy::Strict,
        ..Default::default()
    };
    let mut disk = disk_with(host, config);

    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::PreventRemoval(TransportError::Device(
            FakeError(2)
        )))
    );
    assert_eq!(disk.transport().calls.inquiry, 0);
    assert_eq!(disk.transport().calls.test_unit_ready, 0);
    assert_eq!(disk.transport().calls.release, 1);
}

#[test]
fn strict_policy_aborts_on_request_sense_failure() {
    let mut host = FakeHost::new(1000, 512);
    host.fail_sense = true;
    let config = UsbDiskConfig {
        policy: EnumerationPolicy::Strict,
        ..Default::default()
    };
    let mut disk = disk_with(host, config);

    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::RequestSense(TransportError::Device(
            FakeError(1)
        )))
    );
    assert_eq!(disk.status(), DiskStatus::NOINIT);
    assert_eq!(disk.transport().calls.prevent_removal, 0);
    assert_eq!(disk.transport().calls.test_unit_ready, 0);
    assert_eq!(disk.transport().calls.release, 1);
}

#[test]
fn strict_policy_aborts_on_inquiry_failure() {
    let mut host = FakeHost::new(1000, 512);
    host.fail_inquiry = true;
    let config = UsbDiskConfig {
        policy: EnumerationPolicy::Strict,
        ..Default::default()
    };
    let mut disk = disk_with(host, config);

    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::Inquiry(TransportError::Device(FakeError(3))))
    );
    assert_eq!(disk.status(), DiskStatus::NOINIT);
    assert!(disk.inquiry().is_none());
    assert_eq!(disk.transport().calls.test_unit_ready, 0);
    assert_eq!(disk.transport().calls.release, 1);
}

#[test]
fn missing_lun_is_fatal() {
    let config = UsbDiskConfig {
        lun: 1,
        ..Default::default()
    };
    let mut disk = disk_with(FakeHost::new(1000, 512), config);
    assert_eq!(
        disk.enumerate(),
        Err(EnumerationError::LunOutOfRange { lun: 1, max_lun: 0 })
    );
    assert_eq!(disk.transport().calls.reset_interface, 0);
}

#[test]
fn read_only_disk_refuses_writes() {
    let config = UsbDiskConfig {
        read_only: true,
        ..Default::default()
    };
    let mut disk = disk_with(FakeHost::with_medium(4, 512), config);

    let status = disk.initialize();
    assert!(status.contains(DiskStatus::PROTECT));
    assert!(!status.contains(DiskStatus::NOINIT));
    assert!(status.is_ready());

    let buffer = [0u8; 512];
    assert_eq!(disk.write(&buffer, 0, 1), Err(DiskError::WriteProtected));
    let mut buffer = [0u8; 512];
    assert_eq!(disk.read(&mut buffer, 1, 1), Ok(()));
    assert_eq!(disk.transport().calls.write_blocks, 0);
}

#[test]
fn reset_forces_reenumeration() {
    let mut disk = disk(FakeHost::with_medium(4, 512));
    assert!(disk.initialize().is_ready());

    disk.reset();
    assert_eq!(disk.status(), DiskStatus::NOINIT);
    assert_eq!(disk.state(), EnumerationState::Uninitialized);
    assert!(disk.capacity().is_none());
    let mut buffer = [0u8; 512];
    assert_eq!(disk.read(&mut buffer, 0, 1), Err(DiskError::NotReady));
    assert_eq!(disk.transport().calls.release, 1);

    assert!(disk.initialize().is_ready());
    assert_eq!(disk.transport().calls.read_capacity, 2);
}
