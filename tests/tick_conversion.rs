//! Tick ↔ epoch conversion tests.

use chrono::{NaiveDate, TimeZone, Utc};
use framestamp::ticks::{
    UNIX_EPOCH_TICKS, epoch_ms_to_ticks, format_local, ticks_to_datetime, ticks_to_epoch_ms,
};
use proptest::prelude::*;

const TICKS_PER_MS: u64 = 10_000;

fn ticks_at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> u64 {
    let instant = Utc
        .with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .expect("Valid fixture date");
    let since_unix_ms = u64::try_from(instant.timestamp_millis()).expect("Fixture after 1970");
    UNIX_EPOCH_TICKS + since_unix_ms * TICKS_PER_MS
}

// ── fixtures ───────────────────────────────────────────────────────

#[test]
fn unix_epoch_ticks_match_calendar() {
    let year_one = NaiveDate::from_ymd_opt(1, 1, 1).expect("Valid date");
    let unix = NaiveDate::from_ymd_opt(1970, 1, 1).expect("Valid date");
    let days = u64::try_from(unix.signed_duration_since(year_one).num_days()).expect("Positive");
    assert_eq!(days, 719_162);
    assert_eq!(UNIX_EPOCH_TICKS, days * 86_400 * 10_000_000);
}

#[test]
fn unix_epoch_is_zero() {
    assert_eq!(ticks_to_epoch_ms(UNIX_EPOCH_TICKS), 0.0);
}

#[test]
fn tick_zero_is_year_one() {
    let instant = ticks_to_datetime(0).expect("Year 1 is representable");
    let expected = NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("Valid date")
        .and_utc();
    assert_eq!(instant, expected);
    assert!(ticks_to_epoch_ms(0) < 0.0);
}

#[test]
fn leap_day_2000() {
    let ticks = 630_873_792_000_000_000;
    assert_eq!(ticks_to_epoch_ms(ticks), 951_782_400_000.0);
    assert_eq!(ticks, ticks_at(2000, 2, 29, 0, 0, 0));

    let next_day = ticks_at(2000, 3, 1, 0, 0, 0);
    assert_eq!(ticks_to_epoch_ms(next_day) - ticks_to_epoch_ms(ticks), 86_400_000.0);
}

#[test]
fn dates_in_2024() {
    assert_eq!(ticks_to_epoch_ms(638_396_640_000_000_000), 1_704_067_200_000.0);

    let leap_day = ticks_at(2024, 2, 29, 12, 30, 0);
    let datetime = ticks_to_datetime(leap_day).expect("Representable");
    assert_eq!(datetime.to_rfc3339(), "2024-02-29T12:30:00+00:00");
}

#[test]
fn sub_millisecond_precision_is_kept() {
    // 1234.567 ms after the Unix epoch plus 7 sub-microsecond ticks.
    let ticks = UNIX_EPOCH_TICKS + 12_345_670 + 7;
    assert_eq!(ticks_to_epoch_ms(ticks), 1_234.567);
}

#[test]
fn inverse_conversion() {
    let ticks = ticks_at(2023, 11, 14, 22, 13, 20) + 1_234_560;
    let epoch_ms = ticks_to_epoch_ms(ticks);
    assert_eq!(epoch_ms_to_ticks(epoch_ms), Some(ticks));
    assert_eq!(epoch_ms_to_ticks(-62_135_596_800_001.0), None);
    assert_eq!(epoch_ms_to_ticks(f64::NAN), None);
}

proptest! {
    #[test]
    fn conversion_is_strictly_monotonic_at_distinct_microseconds(
        offset in 0_u64..40_000_000_000_000_000,
        step in 10_u64..1_000_000_000,
    ) {
        // 1970 to ~2096, where one microsecond is still above f64 resolution.
        let a = UNIX_EPOCH_TICKS + offset;
        let b = a + step;
        prop_assert!(ticks_to_epoch_ms(a) < ticks_to_epoch_ms(b));
    }

    #[test]
    fn conversion_never_decreases(a in 0_u64..3_155_378_975_999_999_999, step in 0_u64..1_000_000) {
        prop_assert!(ticks_to_epoch_ms(a) <= ticks_to_epoch_ms(a + step));
    }
}

// ── local time ─────────────────────────────────────────────────────

#[test]
fn format_local_applies_offset() {
    let epoch_ms = 1_704_067_200_123.0; // 2024-01-01T00:00:00.123Z
    assert_eq!(format_local(epoch_ms, 0), "00:00:00.123");
    assert_eq!(format_local(epoch_ms, 60), "01:00:00.123");
    assert_eq!(format_local(epoch_ms, -300), "19:00:00.123");
    assert_eq!(format_local(epoch_ms, 330), "05:30:00.123");
}

#[test]
fn format_local_truncates_to_milliseconds() {
    assert_eq!(format_local(1_704_067_200_999.9, 0), "00:00:00.999");
}

#[test]
fn format_local_rejects_out_of_range() {
    assert_eq!(format_local(0.0, 24 * 60), "InvalidLocal");
    assert_eq!(format_local(f64::INFINITY, 0), "InvalidLocal");
    assert_eq!(format_local(1.0e20, 0), "InvalidLocal");
}
