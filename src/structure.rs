//! embedded-usbdisk - Useful macros for parsing SCSI reply structures.
//!
//! SCSI multi-byte fields are big-endian, unlike the FAT structures these
//! macros were first written for.

macro_rules! access_field {
    ($self:expr, $offset:expr, $start_bit:expr, 1) => {
        ($self.data()[$offset] & (1 << $start_bit)) != 0
    };
    ($self:expr, $offset:expr, $start:expr, $num_bits:expr) => {
        ($self.data()[$offset] >> $start) & (((1u16 << $num_bits) - 1) as u8)
    };
}

macro_rules! define_field {
    ($name:ident, bool, $offset:expr, $bit:expr) => {
        doc_comment::doc_comment! {
            concat!("Get the value of the ", stringify!($name), " flag"),
            pub fn $name(&self) -> bool {
                access_field!(self, $offset, $bit, 1)
            }
        }
    };
    ($name:ident, u8, $offset:expr, $start_bit:expr, $num_bits:expr) => {
        doc_comment::doc_comment! {
            concat!("Get the value of the ", stringify!($name), " bit field"),
            pub fn $name(&self) -> u8 {
                access_field!(self, $offset, $start_bit, $num_bits)
            }
        }
    };
    ($name:ident, u8, $offset:expr) => {
        doc_comment::doc_comment! {
            concat!("Get the value of the ", stringify!($name), " field"),
            pub fn $name(&self) -> u8 {
                self.data()[$offset]
            }
        }
    };
    ($name:ident, be_u32, $offset:expr) => {
        doc_comment::doc_comment! {
            concat!("Get the value of the big-endian ", stringify!($name), " field"),
            pub fn $name(&self) -> u32 {
                let d = self.data();
                u32::from_be_bytes([d[$offset], d[$offset + 1], d[$offset + 2], d[$offset + 3]])
            }
        }
    };
    ($name:ident, text, $offset:expr, $len:expr) => {
        doc_comment::doc_comment! {
            concat!(
                "Get the ", stringify!($name),
                " field as text, with trailing padding removed"
            ),
            pub fn $name(&self) -> &str {
                crate::structure::trim_ascii(&self.data()[$offset..$offset + $len])
            }
        }
    };
}

/// Interpret a space/NUL padded ASCII field. Bytes that are not valid UTF-8
/// yield an empty string.
pub(crate) fn trim_ascii(field: &[u8]) -> &str {
    let end = field
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |idx| idx + 1);
    core::str::from_utf8(&field[..end]).unwrap_or("")
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
