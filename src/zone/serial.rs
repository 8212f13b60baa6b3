use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

/// SOA serial for `at`, laid out as `YYMMDDHHMM`.
pub fn serial_at<Tz: TimeZone>(at: &DateTime<Tz>) -> u64 {
    let year = u64::from(at.year().rem_euclid(100) as u32);
    year * 100_000_000
        + u64::from(at.month()) * 1_000_000
        + u64::from(at.day()) * 10_000
        + u64::from(at.hour()) * 100
        + u64::from(at.minute())
}

pub fn current_serial() -> u64 {
    serial_at(&Local::now())
}
