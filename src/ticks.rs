//! Tick ↔ wall-clock conversion.
//!
//! The overlay stores time as a count of 100 ns ticks since
//! `0001-01-01T00:00:00` on the proleptic Gregorian calendar (UTC). The
//! rest of the crate works in milliseconds since the Unix epoch, kept as
//! `f64` so the microsecond part survives.
//!
//! Calendar arithmetic is delegated to [`chrono`]. The one number fixed
//! here is the tick count of the Unix epoch.
//!
//! # Example
//!
//! ```
//! use framestamp::ticks::{epoch_ms_to_ticks, ticks_to_epoch_ms};
//!
//! let ticks = epoch_ms_to_ticks(1_700_000_000_123.456).unwrap();
//! assert_eq!(ticks_to_epoch_ms(ticks), 1_700_000_000_123.456);
//! ```

use chrono::{DateTime, FixedOffset, Utc};

/// Ticks per microsecond.
pub const TICKS_PER_MICROSECOND: u64 = 10;

/// Tick count of `1970-01-01T00:00:00Z`.
pub const UNIX_EPOCH_TICKS: u64 = 621_355_968_000_000_000;

const UNIX_EPOCH_MICROS: i64 = (UNIX_EPOCH_TICKS / TICKS_PER_MICROSECOND) as i64;

/// Whole microseconds between the Unix epoch and `ticks`.
fn micros_since_unix(ticks: u64) -> i64 {
    (ticks / TICKS_PER_MICROSECOND) as i64 - UNIX_EPOCH_MICROS
}

/// Convert a tick count to milliseconds since the Unix epoch.
///
/// Sub-microsecond ticks are truncated; the fractional milliseconds are
/// kept. Instants before 1970 give negative values.
pub fn ticks_to_epoch_ms(ticks: u64) -> f64 {
    micros_since_unix(ticks) as f64 / 1000.0
}

/// Convert a tick count to an absolute UTC instant.
///
/// Returns `None` if the instant lies beyond chrono's representable range.
pub fn ticks_to_datetime(ticks: u64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros_since_unix(ticks))
}

/// Convert milliseconds since the Unix epoch back to a tick count.
///
/// The value is rounded to the nearest microsecond. Returns `None` for
/// instants before the tick epoch.
pub fn epoch_ms_to_ticks(epoch_ms: f64) -> Option<u64> {
    if !epoch_ms.is_finite() {
        return None;
    }
    let micros = (epoch_ms * 1000.0).round() as i64;
    let since_tick_epoch = micros.checked_add(UNIX_EPOCH_MICROS)?;
    u64::try_from(since_tick_epoch)
        .ok()?
        .checked_mul(TICKS_PER_MICROSECOND)
}

/// Format an epoch-millisecond value as `HH:MM:SS.mmm` local time.
///
/// `tz_offset_minutes` is the offset east of UTC. Returns `"InvalidLocal"`
/// when the value or offset cannot be represented.
pub fn format_local(epoch_ms: f64, tz_offset_minutes: i32) -> String {
    let Some(offset) = tz_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
    else {
        return "InvalidLocal".to_string();
    };
    if !epoch_ms.is_finite() {
        return "InvalidLocal".to_string();
    }
    let micros = (epoch_ms * 1000.0).floor() as i64;
    match DateTime::<Utc>::from_timestamp_micros(micros) {
        Some(instant) => instant
            .with_timezone(&offset)
            .format("%H:%M:%S%.3f")
            .to_string(),
        None => "InvalidLocal".to_string(),
    }
}
