//! Calendar date/time conversions and ISO-8601 parsing
//!
//! Implements Howard Hinnant's civil_from_days and days_from_civil algorithms.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
//!
//! These algorithms provide:
//! - O(1) time complexity (no year iteration)
//! - Correct handling of leap years
//! - Valid for all dates in the proleptic Gregorian calendar
//!
//! On top of them sits a small ISO-8601 parser for the timestamps carried by
//! feed events (`2024-05-01T13:45:00`, `2024-05-01 13:45:00.250-05:00`, ...).

use hal_abstractions::Timestamp;

const SECONDS_PER_DAY: u64 = 86400;

/// Broken-down UTC (or local) date and time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CivilDateTime {
    pub year: u16,
    /// 1-12
    pub month: u8,
    /// 1-31
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CivilDateTime {
    /// Convert seconds since the Unix epoch to a civil date and time
    ///
    /// Years past `u16::MAX` are not representable; the year wraps.
    pub fn from_unix(unix_secs: u64) -> Self {
        let days_since_epoch = (unix_secs / SECONDS_PER_DAY) as i64;
        let secs_today = unix_secs % SECONDS_PER_DAY;

        let (year, month, day) = civil_from_days(days_since_epoch);

        Self {
            year,
            month,
            day,
            hour: (secs_today / 3600) as u8,
            minute: ((secs_today % 3600) / 60) as u8,
            second: (secs_today % 60) as u8,
        }
    }

    /// Seconds since the Unix epoch, or `None` before 1970
    pub fn to_unix(&self) -> Option<u64> {
        let days = days_from_civil(self.year, self.month, self.day);
        let secs = days * SECONDS_PER_DAY as i64
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64;
        u64::try_from(secs).ok()
    }

    /// Day of week, 0 = Monday through 6 = Sunday
    pub fn weekday(&self) -> u8 {
        let days = days_from_civil(self.year, self.month, self.day);
        // 1970-01-01 was a Thursday
        (days + 3).rem_euclid(7) as u8
    }

    fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }
}

/// Check if year is a leap year (Gregorian calendar)
///
/// Correctly implements standard leap year rules:
/// - Divisible by 4: leap year
/// - EXCEPT divisible by 100: not a leap year
/// - EXCEPT divisible by 400: leap year
pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Convert days since Unix epoch to civil date (year, month, day)
fn civil_from_days(days_since_epoch: i64) -> (u16, u8, u8) {
    // Shift epoch from 1970-01-01 to 0000-03-01 so the leap day ends the year
    let z = days_since_epoch + 719468;

    // Era = 400-year cycle
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32; // day of era [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365; // [0, 399]
    let y = (yoe as i64) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]

    // Month [0, 11] where 0 = March, 11 = February
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u8;

    let year = if m <= 2 { y + 1 } else { y };

    (year as u16, m, d)
}

/// Convert civil date (year, month, day) to days since Unix epoch
fn days_from_civil(year: u16, month: u8, day: u8) -> i64 {
    let y = year as i64;
    let m = month as i64;
    let d = day as i64;

    // March = month 0, February = month 11
    let (y, m) = if m <= 2 { (y - 1, m + 9) } else { (y, m - 3) };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u32;
    let doy = (153 * (m as u32) + 2) / 5 + (d as u32) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;

    era * 146097 + (doe as i64) - 719468
}

/// ISO-8601 parse errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeParseError {
    /// Input does not follow `YYYY-MM-DD[(T| )HH:MM[:SS[.f+]]][Z|±HH[:MM]]`
    Malformed,
    /// A field is outside its calendar range (month 13, Feb 30, ...)
    InvalidField,
    /// Resulting instant is before the Unix epoch
    OutOfRange,
}

impl core::fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "Malformed ISO-8601 timestamp"),
            Self::InvalidField => write!(f, "Invalid date or time field"),
            Self::OutOfRange => write!(f, "Timestamp before Unix epoch"),
        }
    }
}

impl core::error::Error for TimeParseError {}

/// Parse an ISO-8601 date or date-time into a UTC timestamp
///
/// `naive_offset_secs` (local minus UTC) is applied when the input carries
/// no zone designator.
pub fn parse_iso8601(input: &str, naive_offset_secs: i32) -> Result<Timestamp, TimeParseError> {
    let mut cursor = Cursor::new(input.trim().as_bytes());

    let year = cursor.digits(4)? as u16;
    cursor.expect(b'-')?;
    let month = cursor.digits(2)? as u8;
    cursor.expect(b'-')?;
    let day = cursor.digits(2)? as u8;

    let mut civil = CivilDateTime {
        year,
        month,
        day,
        hour: 0,
        minute: 0,
        second: 0,
    };
    let mut micros = 0u32;
    let mut offset_secs = naive_offset_secs as i64;

    if let Some(b'T' | b't' | b' ') = cursor.peek() {
        cursor.advance();
        civil.hour = cursor.digits(2)? as u8;
        cursor.expect(b':')?;
        civil.minute = cursor.digits(2)? as u8;

        if cursor.peek() == Some(b':') {
            cursor.advance();
            civil.second = cursor.digits(2)? as u8;

            if let Some(b'.' | b',') = cursor.peek() {
                cursor.advance();
                micros = cursor.fraction_micros()?;
            }
        }

        match cursor.peek() {
            Some(b'Z' | b'z') => {
                cursor.advance();
                offset_secs = 0;
            }
            Some(sign @ (b'+' | b'-')) => {
                cursor.advance();
                let hours = cursor.digits(2)? as i64;
                let minutes = match cursor.peek() {
                    Some(b':') => {
                        cursor.advance();
                        cursor.digits(2)? as i64
                    }
                    Some(_) => cursor.digits(2)? as i64,
                    None => 0,
                };
                if hours > 23 || minutes > 59 {
                    return Err(TimeParseError::InvalidField);
                }
                let magnitude = hours * 3600 + minutes * 60;
                offset_secs = if sign == b'-' { -magnitude } else { magnitude };
            }
            _ => {}
        }
    }

    if !cursor.is_empty() {
        return Err(TimeParseError::Malformed);
    }
    if !civil.is_valid() {
        return Err(TimeParseError::InvalidField);
    }

    let local = civil.to_unix().ok_or(TimeParseError::OutOfRange)? as i64;
    let utc = u64::try_from(local - offset_secs).map_err(|_| TimeParseError::OutOfRange)?;
    Ok(Timestamp::new(utc, micros))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn expect(&mut self, byte: u8) -> Result<(), TimeParseError> {
        if self.peek() == Some(byte) {
            self.advance();
            Ok(())
        } else {
            Err(TimeParseError::Malformed)
        }
    }

    /// Exactly `count` ASCII digits
    fn digits(&mut self, count: usize) -> Result<u32, TimeParseError> {
        let mut value = 0u32;
        for _ in 0..count {
            match self.peek() {
                Some(b @ b'0'..=b'9') => {
                    value = value * 10 + (b - b'0') as u32;
                    self.advance();
                }
                _ => return Err(TimeParseError::Malformed),
            }
        }
        Ok(value)
    }

    /// One or more fractional-second digits, truncated to microseconds
    fn fraction_micros(&mut self) -> Result<u32, TimeParseError> {
        let mut micros = 0u32;
        let mut scale = 100_000u32;
        let start = self.pos;
        while let Some(b @ b'0'..=b'9') = self.peek() {
            micros += (b - b'0') as u32 * scale;
            scale /= 10;
            self.advance();
        }
        if self.pos == start {
            return Err(TimeParseError::Malformed);
        }
        Ok(micros)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leap_year() {
        assert!(is_leap_year(2000)); // Divisible by 400
        assert!(is_leap_year(2024)); // Divisible by 4
        assert!(!is_leap_year(1900)); // Divisible by 100, not 400
        assert!(!is_leap_year(2023));
        assert!(!is_leap_year(2100));
    }

    #[test]
    fn test_unix_epoch() {
        let dt = CivilDateTime::from_unix(0);
        assert_eq!(
            dt,
            CivilDateTime {
                year: 1970,
                month: 1,
                day: 1,
                hour: 0,
                minute: 0,
                second: 0
            }
        );
        assert_eq!(dt.weekday(), 3); // Thursday
    }

    #[test]
    fn test_known_dates_convert_both_ways() {
        let test_dates = [
            0u64,       // 1970-01-01 00:00:00
            946684800,  // 2000-01-01 00:00:00
            1709164800, // 2024-02-29 00:00:00
            2147483647, // 2038-01-19 03:14:07
            4102444800, // 2100-01-01 00:00:00
        ];

        for &unix_secs in &test_dates {
            let dt = CivilDateTime::from_unix(unix_secs);
            assert_eq!(dt.to_unix(), Some(unix_secs), "failed for {}", unix_secs);
        }

        let leap_day = CivilDateTime::from_unix(1709164800);
        assert_eq!((leap_day.year, leap_day.month, leap_day.day), (2024, 2, 29));
    }

    #[test]
    fn test_before_epoch_is_none() {
        let dt = CivilDateTime {
            year: 1969,
            month: 12,
            day: 31,
            hour: 23,
            minute: 59,
            second: 59,
        };
        assert_eq!(dt.to_unix(), None);
    }

    #[test]
    fn test_parse_naive_datetime_uses_configured_offset() {
        // 2024-01-01 00:00:00 UTC = 1704067200
        let ts = parse_iso8601("2024-01-01T00:00:00", 0).unwrap();
        assert_eq!(ts, Timestamp::from_secs(1704067200));

        // Local midnight at UTC-5 is 05:00 UTC
        let ts = parse_iso8601("2024-01-01T00:00:00", -5 * 3600).unwrap();
        assert_eq!(ts, Timestamp::from_secs(1704067200 + 5 * 3600));
    }

    #[test]
    fn test_parse_zone_designators() {
        let expected = Timestamp::from_secs(1704067200 + 13 * 3600 + 45 * 60);
        assert_eq!(parse_iso8601("2024-01-01T13:45:00Z", -18000), Ok(expected));
        assert_eq!(parse_iso8601("2024-01-01T08:45:00-05:00", 0), Ok(expected));
        assert_eq!(parse_iso8601("2024-01-01T19:15:00+0530", 0), Ok(expected));
        assert_eq!(parse_iso8601("2024-01-01T14:45:00+01", 0), Ok(expected));
    }

    #[test]
    fn test_parse_variants() {
        let base = 1704067200 + 13 * 3600 + 45 * 60;
        assert_eq!(
            parse_iso8601("2024-01-01 13:45", 0),
            Ok(Timestamp::from_secs(base))
        );
        assert_eq!(
            parse_iso8601("2024-01-01T13:45:07.25Z", 0),
            Ok(Timestamp::new(base + 7, 250_000))
        );
        assert_eq!(
            parse_iso8601("2024-01-01T13:45:07.123456789Z", 0),
            Ok(Timestamp::new(base + 7, 123_456))
        );
        assert_eq!(
            parse_iso8601("2024-01-01", 0),
            Ok(Timestamp::from_secs(1704067200))
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(parse_iso8601("", 0), Err(TimeParseError::Malformed));
        assert_eq!(parse_iso8601("yesterday", 0), Err(TimeParseError::Malformed));
        assert_eq!(parse_iso8601("2024-1-01", 0), Err(TimeParseError::Malformed));
        assert_eq!(
            parse_iso8601("2024-01-01T13:45:00Zjunk", 0),
            Err(TimeParseError::Malformed)
        );
        assert_eq!(parse_iso8601("2024-01-01T13:45:", 0), Err(TimeParseError::Malformed));
        assert_eq!(parse_iso8601("2024-01-01T13:45:00.", 0), Err(TimeParseError::Malformed));
    }

    #[test]
    fn test_parse_rejects_invalid_fields() {
        assert_eq!(parse_iso8601("2024-13-01", 0), Err(TimeParseError::InvalidField));
        assert_eq!(parse_iso8601("2023-02-29", 0), Err(TimeParseError::InvalidField));
        assert_eq!(parse_iso8601("2024-01-01T24:00", 0), Err(TimeParseError::InvalidField));
        assert_eq!(parse_iso8601("1969-12-31T23:00:00Z", 0), Err(TimeParseError::OutOfRange));
    }
}
