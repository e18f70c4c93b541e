//! embedded-usbdisk - Timestamps
//!
//! FAT stores times as a pair of packed 16-bit words, and FatFs asks the
//! platform for the current time as both words glued together
//! (`get_fattime`).

/// A calendar date and time, as FAT can store it: 1980 to 2107, with
/// two-second resolution.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    /// Years since 1980.
    pub year_since_1980: u8,
    /// 0..=11
    pub zero_indexed_month: u8,
    /// 0..=30
    pub zero_indexed_day: u8,
    /// 0..=23
    pub hours: u8,
    /// 0..=59
    pub minutes: u8,
    /// 0..=59
    pub seconds: u8,
}

impl Timestamp {
    /// Build a timestamp from calendar values (1-based month and day).
    pub fn from_calendar(
        year: u16,
        month: u8,
        day: u8,
        hours: u8,
        minutes: u8,
        seconds: u8,
    ) -> Result<Timestamp, &'static str> {
        Ok(Timestamp {
            year_since_1980: match year {
                1980..=2107 => (year - 1980) as u8,
                _ => return Err("Bad year"),
            },
            zero_indexed_month: match month {
                1..=12 => month - 1,
                _ => return Err("Bad month"),
            },
            zero_indexed_day: match day {
                1..=31 => day - 1,
                _ => return Err("Bad day"),
            },
            hours: match hours {
                0..=23 => hours,
                _ => return Err("Bad hours"),
            },
            minutes: match minutes {
                0..=59 => minutes,
                _ => return Err("Bad minutes"),
            },
            seconds: match seconds {
                0..=59 => seconds,
                _ => return Err("Bad seconds"),
            },
        })
    }

    /// Unpack FAT date and time words.
    pub fn from_fat(date: u16, time: u16) -> Timestamp {
        let year = 1980 + (date >> 9);
        let month = ((date >> 5) & 0x000F) as u8;
        let day = (date & 0x001F) as u8;
        let hours = ((time >> 11) & 0x001F) as u8;
        let minutes = ((time >> 5) & 0x003F) as u8;
        let seconds = ((time << 1) & 0x003F) as u8;
        Timestamp {
            year_since_1980: (year - 1980) as u8,
            zero_indexed_month: month.saturating_sub(1),
            zero_indexed_day: day.saturating_sub(1),
            hours,
            minutes,
            seconds,
        }
    }

    /// Pack into FAT `(date, time)` words. Odd seconds round down.
    pub fn to_fat(&self) -> (u16, u16) {
        let date = (u16::from(self.year_since_1980) << 9)
            | (u16::from(self.zero_indexed_month.wrapping_add(1) & 0x0F) << 5)
            | u16::from(self.zero_indexed_day.wrapping_add(1) & 0x1F);
        let time = (u16::from(self.hours & 0x1F) << 11)
            | (u16::from(self.minutes & 0x3F) << 5)
            | u16::from((self.seconds >> 1) & 0x1F);
        (date, time)
    }

    /// The value FatFs expects from `get_fattime`: date in the high half,
    /// time in the low half.
    pub fn fat_datetime(&self) -> u32 {
        let (date, time) = self.to_fat();
        (u32::from(date) << 16) | u32::from(time)
    }
}

/// Something that can tell the filesystem what time it is.
pub trait TimeSource {
    /// The current time.
    fn get_timestamp(&self) -> Timestamp;
}

/// A clock that never moves, for boards without an RTC, or before the RTC has
/// been set.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FixedTimeSource(pub Timestamp);

impl Default for FixedTimeSource {
    /// 2015-01-01 20:00:00
    fn default() -> Self {
        FixedTimeSource(Timestamp {
            year_since_1980: 35,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 20,
            minutes: 0,
            seconds: 0,
        })
    }
}

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        self.0
    }
}
