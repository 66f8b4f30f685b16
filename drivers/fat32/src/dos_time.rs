//! Packed DOS date/time fields.
//!
//! time: `hour << 11 | minute << 5 | second / 2`
//! date: `(year - 1980) << 9 | month << 5 | day`

use vfs_api_types::DateTime;

pub const DOS_EPOCH_YEAR: u16 = 1980;
pub const DOS_LAST_YEAR: u16 = DOS_EPOCH_YEAR + 127;

pub const MSK_DAY: u16 = 0x001F;
pub const MSK_MONTH: u16 = 0x01E0;
pub const MSK_YEAR: u16 = 0xFE00;
pub const MSK_SEC: u16 = 0x001F;
pub const MSK_MIN: u16 = 0x07E0;
pub const MSK_HOUR: u16 = 0xF800;

/// Pack a wall-clock time as `(time, date)`.
///
/// Seconds lose their low bit. `None` if the year is outside 1980..=2107 or a
/// field is out of range.
pub fn encode(t: &DateTime) -> Option<(u16, u16)> {
    if !(DOS_EPOCH_YEAR..=DOS_LAST_YEAR).contains(&t.year)
        || !(1..=12).contains(&t.month)
        || !(1..=31).contains(&t.day)
        || t.hour > 23
        || t.minute > 59
        || t.second > 60
    {
        return None;
    }
    // Leap second.
    let second = if t.second == 60 { 59 } else { t.second };
    let hms = u16::from(t.hour) << 11 | u16::from(t.minute) << 5 | u16::from(second / 2);
    let day = (t.year - DOS_EPOCH_YEAR) << 9 | u16::from(t.month) << 5 | u16::from(t.day);
    Some((hms, day))
}

/// Unpack `(date, time)`, clamping fields a careless writer left out of range.
pub fn decode(day: u16, hms: u16) -> DateTime {
    let mut d = (day & MSK_DAY) as u8;
    if d == 0 {
        d = 1;
    }
    let mut month = ((day & MSK_MONTH) >> 5) as u8;
    if month == 0 {
        month = 1;
    }
    if month > 12 {
        month %= 12;
    }
    let year = ((day & MSK_YEAR) >> 9) + DOS_EPOCH_YEAR;

    let mut sec = (hms & MSK_SEC) as u8;
    if sec > 29 {
        sec %= 29;
    }
    let mut min = ((hms & MSK_MIN) >> 5) as u8;
    if min > 59 {
        min %= 59;
    }
    let mut hour = ((hms & MSK_HOUR) >> 11) as u8;
    if hour > 23 {
        hour %= 23;
    }
    DateTime::new(year, month, d, hour, min, sec * 2)
}

/// Creation times carry an extra 0..=199 hundredths of the two-second slot.
pub fn decode_with_hundredths(day: u16, hms: u16, hundredths: u8) -> DateTime {
    let mut t = decode(day, hms);
    if hundredths <= 199 {
        t.second = (t.second + hundredths / 100).min(59);
    }
    t
}
