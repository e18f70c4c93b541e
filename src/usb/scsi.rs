//! embedded-usbdisk - SCSI replies
//!
//! The replies a mass-storage class driver hands back for the commands used
//! during enumeration. Class drivers that already decode these can build the
//! types field-by-field; drivers that pass raw bytes through can use the
//! `from_bytes` parsers.

/// Errors from decoding a raw SCSI reply.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ScsiError {
    /// The reply was shorter than the fields we need.
    TooShort { expected: usize, got: usize },
    /// READ CAPACITY(10) reported the maximum LBA, meaning the device is too
    /// large for 32-bit block addressing.
    CapacityTooLarge,
}

/// Geometry of the attached medium.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceCapacity {
    /// Number of addressable blocks.
    pub block_count: u32,
    /// Size of each block, in bytes.
    pub block_size: u32,
}

impl DeviceCapacity {
    /// Length of a READ CAPACITY(10) reply.
    pub const READ_CAPACITY_10_LEN: usize = 8;

    /// Decode a READ CAPACITY(10) reply.
    ///
    /// The device reports the address of its *last* block, so the count is one
    /// more than that.
    pub fn from_read_capacity_10(reply: &[u8]) -> Result<Self, ScsiError> {
        if reply.len() < Self::READ_CAPACITY_10_LEN {
            return Err(ScsiError::TooShort {
                expected: Self::READ_CAPACITY_10_LEN,
                got: reply.len(),
            });
        }
        let last_lba = u32::from_be_bytes([reply[0], reply[1], reply[2], reply[3]]);
        let block_size = u32::from_be_bytes([reply[4], reply[5], reply[6], reply[7]]);
        if last_lba == u32::MAX {
            return Err(ScsiError::CapacityTooLarge);
        }
        Ok(DeviceCapacity {
            block_count: last_lba + 1,
            block_size,
        })
    }

    /// Total size of the medium in bytes.
    pub fn total_bytes(&self) -> u64 {
        u64::from(self.block_count) * u64::from(self.block_size)
    }
}

/// Standard INQUIRY data.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InquiryData {
    data: [u8; InquiryData::LEN],
}

impl InquiryData {
    /// Length of the standard INQUIRY reply.
    pub const LEN: usize = 36;

    /// Decode a standard INQUIRY reply.
    pub fn from_bytes(reply: &[u8]) -> Result<Self, ScsiError> {
        if reply.len() < Self::LEN {
            return Err(ScsiError::TooShort {
                expected: Self::LEN,
                got: reply.len(),
            });
        }
        let mut data = [0u8; Self::LEN];
        data.copy_from_slice(&reply[..Self::LEN]);
        Ok(InquiryData { data })
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    define_field!(peripheral_device_type, u8, 0, 0, 5);
    define_field!(removable, bool, 1, 7);
    define_field!(version, u8, 2);
    define_field!(vendor_id, text, 8, 8);
    define_field!(product_id, text, 16, 16);
    define_field!(revision_id, text, 32, 4);
}

/// Fixed-format REQUEST SENSE data.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SenseData {
    data: [u8; SenseData::LEN],
}

impl SenseData {
    /// Length of a full fixed-format sense reply.
    pub const LEN: usize = 18;
    /// Shortest reply that still carries the additional sense code qualifier.
    pub const MIN_LEN: usize = 14;

    const SENSE_KEY_NO_SENSE: u8 = 0x00;
    const SENSE_KEY_NOT_READY: u8 = 0x02;
    const SENSE_KEY_UNIT_ATTENTION: u8 = 0x06;

    /// Decode a fixed-format REQUEST SENSE reply. Missing trailing bytes read
    /// as zero.
    pub fn from_bytes(reply: &[u8]) -> Result<Self, ScsiError> {
        if reply.len() < Self::MIN_LEN {
            return Err(ScsiError::TooShort {
                expected: Self::MIN_LEN,
                got: reply.len(),
            });
        }
        let mut data = [0u8; Self::LEN];
        let len = reply.len().min(Self::LEN);
        data[..len].copy_from_slice(&reply[..len]);
        Ok(SenseData { data })
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    define_field!(valid, bool, 0, 7);
    define_field!(response_code, u8, 0, 0, 7);
    define_field!(sense_key, u8, 2, 0, 4);
    define_field!(information, be_u32, 3);
    define_field!(additional_sense_length, u8, 7);
    define_field!(additional_sense_code, u8, 12);
    define_field!(additional_sense_code_qualifier, u8, 13);

    /// The device has nothing to report.
    pub fn is_no_sense(&self) -> bool {
        self.sense_key() == Self::SENSE_KEY_NO_SENSE
    }

    /// The medium is present but not ready yet.
    pub fn is_not_ready(&self) -> bool {
        self.sense_key() == Self::SENSE_KEY_NOT_READY
    }

    /// The device was reset or the medium changed since the last command.
    pub fn is_unit_attention(&self) -> bool {
        self.sense_key() == Self::SENSE_KEY_UNIT_ATTENTION
    }
}
