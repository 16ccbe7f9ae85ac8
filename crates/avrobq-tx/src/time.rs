use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};

const MICROS_PER_SECOND: i64 = 1_000_000;
const MILLIS_PER_SECOND: i64 = 1_000;
/// Days from 0001-01-01 (CE) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Renders a timestamp as ISO-8601 text, keeping its offset.
///
/// Fractional seconds are left out when zero and printed with six digits
/// otherwise: `2024-01-05T10:00:00+00:00`, `2024-01-05T10:00:00.250000+00:00`.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    let format = if ts.timestamp_subsec_micros() == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    };
    ts.to_rfc3339_opts(format, false)
}

pub(crate) fn from_micros(micros: i64) -> Option<DateTime<FixedOffset>> {
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let nanos = micros.rem_euclid(MICROS_PER_SECOND) * 1_000;
    Utc.timestamp_opt(secs, nanos as u32).single().map(Into::into)
}

pub(crate) fn from_millis(millis: i64) -> Option<DateTime<FixedOffset>> {
    let secs = millis.div_euclid(MILLIS_PER_SECOND);
    let nanos = millis.rem_euclid(MILLIS_PER_SECOND) * 1_000_000;
    Utc.timestamp_opt(secs, nanos as u32).single().map(Into::into)
}

pub(crate) fn from_epoch_days(days: i32) -> Option<NaiveDate> {
    UNIX_EPOCH_DAYS_FROM_CE
        .checked_add(days)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}
