//! Calendar arithmetic for `Date` values.
//!
//! Dates are milliseconds since the Unix epoch and every calendar view is
//! UTC. Conversions use the days-from-civil algorithms over the proleptic
//! Gregorian calendar.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Largest magnitude a time value may have.
const MAX_TIME: f64 = 8.64e15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DateParts {
    pub(crate) year: i64,
    /// Zero-based, as `getMonth()` reports it.
    pub(crate) month: u32,
    pub(crate) day: u32,
    /// 0 is Sunday.
    pub(crate) weekday: u32,
    pub(crate) hours: u32,
    pub(crate) minutes: u32,
    pub(crate) seconds: u32,
    pub(crate) millis: u32,
}

pub(crate) fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

/// Clamp a time value to the representable range.
pub(crate) fn time_clip(ms: f64) -> f64 {
    if !ms.is_finite() || ms.abs() > MAX_TIME {
        return f64::NAN;
    }
    ms.trunc() + 0.0
}

pub(crate) fn parts(ms: f64) -> Option<DateParts> {
    if !ms.is_finite() || ms.abs() > MAX_TIME {
        return None;
    }
    let days = (ms / MS_PER_DAY).floor();
    let mut rem = (ms - days * MS_PER_DAY) as u64;
    let days = days as i64;
    let (year, month, day) = civil_from_days(days);
    let millis = (rem % 1000) as u32;
    rem /= 1000;
    let seconds = (rem % 60) as u32;
    rem /= 60;
    let minutes = (rem % 60) as u32;
    let hours = (rem / 60) as u32;
    Some(DateParts {
        year,
        month: month - 1,
        day,
        weekday: (days + 4).rem_euclid(7) as u32,
        hours,
        minutes,
        seconds,
        millis,
    })
}

const MAX_FIELD_YEAR: f64 = 1e9;

/// `Date.UTC` semantics: fields may overflow into their neighbours.
pub(crate) fn from_fields(fields: &[f64]) -> f64 {
    let field = |i: usize, default: f64| fields.get(i).copied().unwrap_or(default);
    let mut year = field(0, f64::NAN);
    let month = field(1, 0.0);
    let day = field(2, 1.0);
    let (h, mi, s, ms) = (field(3, 0.0), field(4, 0.0), field(5, 0.0), field(6, 0.0));
    if [year, month, day, h, mi, s, ms].iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    year = year.trunc();
    if (0.0..=99.0).contains(&year) {
        year += 1900.0;
    }
    let month = month.trunc();
    let year = year + (month / 12.0).floor();
    let month = month.rem_euclid(12.0) as u32 + 1;
    // Far past any clippable time, and keeps the civil arithmetic in range
    if year.abs() > MAX_FIELD_YEAR {
        return f64::NAN;
    }
    let days = days_from_civil(year as i64, month, 1) as f64 + day.trunc() - 1.0;
    time_clip(
        days * MS_PER_DAY + h.trunc() * 3_600_000.0 + mi.trunc() * 60_000.0 + s.trunc() * 1000.0
            + ms.trunc(),
    )
}

pub(crate) fn to_iso_string(ms: f64) -> Option<String> {
    let p = parts(ms)?;
    let year = if (0..=9999).contains(&p.year) {
        format!("{:04}", p.year)
    } else {
        format!("{:+07}", p.year)
    };
    Some(format!(
        "{year}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        p.month + 1,
        p.day,
        p.hours,
        p.minutes,
        p.seconds,
        p.millis
    ))
}

/// Parse the ISO-8601 subset `Date.parse` guarantees. Times without an
/// explicit offset are taken as UTC.
pub(crate) fn parse(text: &str) -> f64 {
    static ISO: OnceLock<Option<Regex>> = OnceLock::new();
    let iso = ISO.get_or_init(|| {
        Regex::new(
            r"^([+-]\d{6}|\d{4})(?:-(\d{2})(?:-(\d{2}))?)?(?:[T ](\d{2}):(\d{2})(?::(\d{2})(?:\.(\d{1,3})\d*)?)?)?(Z|[+-]\d{2}:?\d{2})?$",
        )
        .ok()
    });
    let Some(caps) = iso.as_ref().and_then(|re| re.captures(text.trim())) else {
        return f64::NAN;
    };
    let number = |i: usize, default: f64| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(default)
    };
    let millis = caps.get(7).map_or(0.0, |m| {
        let digits = m.as_str();
        digits.parse::<f64>().unwrap_or(0.0) * 10f64.powi(3 - digits.len() as i32)
    });
    let (month, day) = (number(2, 1.0), number(3, 1.0));
    if !(1.0..=12.0).contains(&month) || !(1.0..=31.0).contains(&day) {
        return f64::NAN;
    }
    let days = days_from_civil(number(1, f64::NAN) as i64, month as u32, day as u32) as f64;
    let mut ms = days * MS_PER_DAY
        + number(4, 0.0) * 3_600_000.0
        + number(5, 0.0) * 60_000.0
        + number(6, 0.0) * 1000.0
        + millis;
    if let Some(offset) = caps.get(8).map(|m| m.as_str()).filter(|o| *o != "Z") {
        let sign = if offset.starts_with('-') { -1.0 } else { 1.0 };
        let digits: String = offset[1..].chars().filter(char::is_ascii_digit).collect();
        let hours = digits[..2].parse::<f64>().unwrap_or(0.0);
        let minutes = digits[2..].parse::<f64>().unwrap_or(0.0);
        ms -= sign * (hours * 60.0 + minutes) * 60_000.0;
    }
    time_clip(ms)
}

fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let yoe = year - era * 400;
    let month = i64::from(month);
    let shifted = if month > 2 { month - 3 } else { month + 9 };
    let doy = (153 * shifted + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_is_a_thursday() {
        let p = parts(0.0).unwrap();
        assert_eq!((p.year, p.month, p.day, p.weekday), (1970, 0, 1, 4));
    }

    #[test]
    fn fields_round_trip_through_parts() {
        let ms = from_fields(&[2024.0, 1.0, 29.0, 13.0, 45.0, 30.0, 250.0]);
        let p = parts(ms).unwrap();
        assert_eq!((p.year, p.month, p.day), (2024, 1, 29));
        assert_eq!((p.hours, p.minutes, p.seconds, p.millis), (13, 45, 30, 250));
    }

    #[test]
    fn month_overflow_rolls_the_year() {
        assert_eq!(from_fields(&[2023.0, 12.0, 1.0]), from_fields(&[2024.0, 0.0, 1.0]));
    }

    #[test]
    fn iso_strings() {
        assert_eq!(to_iso_string(0.0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(parse("1970-01-02"), MS_PER_DAY);
        assert_eq!(parse("2000-01-01T00:00:00.000Z"), 946_684_800_000.0);
        assert_eq!(parse("2000-01-01T02:00:00+02:00"), 946_684_800_000.0);
        assert!(parse("yesterday").is_nan());
        assert!(to_iso_string(f64::NAN).is_none());
        assert!(to_iso_string(1e300).is_none());
    }

    #[test]
    fn out_of_range_fields_are_nan() {
        assert!(from_fields(&[1e20, 0.0]).is_nan());
        assert!(from_fields(&[-1e20, 0.0]).is_nan());
        assert!(from_fields(&[2020.0, 1e20]).is_nan());
        assert!(from_fields(&[2020.0, 0.0, 1e20]).is_nan());
        assert!(from_fields(&[f64::MAX, f64::MAX, f64::MAX]).is_nan());
        // Beyond the clip range but small enough to compute
        assert!(from_fields(&[300_000.0, 0.0]).is_nan());
    }

    #[test]
    fn dates_before_the_epoch() {
        let p = parts(-1.0).unwrap();
        assert_eq!((p.year, p.month, p.day), (1969, 11, 31));
        assert_eq!((p.hours, p.minutes, p.seconds, p.millis), (23, 59, 59, 999));
    }
}
