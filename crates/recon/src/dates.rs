//! Permissive date parsing for hand-maintained sheets.
//!
//! Cells arrive as text: ISO dates written by workbook readers, day-first
//! dates typed by people, Excel serial numbers from CSV exports, and free
//! text such as "PENDIENTE". Anything that is not recognisably a date parses
//! to `None`; callers decide what an unparseable value means.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

/// Date-only layouts, tried in order. Day-first wins over month-first.
/// `%Y` also accepts two digits, so results before `MIN_YEAR` are rejected
/// and the two-digit layouts get their turn.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d/%m/%y",
    "%d-%m-%y",
];

/// Datetime layouts; only the date part is kept.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const MIN_YEAR: i32 = 1900;

/// Largest serial Excel accepts (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if d.year() >= MIN_YEAR {
                return Some(d);
            }
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            if dt.year() >= MIN_YEAR {
                return Some(dt.date());
            }
        }
    }

    parse_excel_serial(s)
}

/// Excel 1900 date system. Counting from 1899-12-30 absorbs the phantom
/// 1900-02-29, so serials from 61 (1900-03-01) on are exact.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.floor() as i64))
}

fn parse_excel_serial(s: &str) -> Option<NaiveDate> {
    if !s.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    let serial: f64 = s.parse().ok()?;
    excel_serial_to_date(serial)
}
