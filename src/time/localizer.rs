//! Converts wall-clock times at a coordinate into UTC instants.

use crate::time::error::LocalizeError;
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use log::debug;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tzf_rs::DefaultFinder;

/// Resolves the IANA timezone in force at a coordinate.
pub trait TimezoneLookup: Send + Sync {
    fn timezone_at(&self, latitude: f64, longitude: f64) -> Result<Tz, LocalizeError>;
}

/// Any `Fn(latitude, longitude) -> Option<Tz>` works as a lookup; `None`
/// means no zone covers the coordinate.
impl<F> TimezoneLookup for F
where
    F: Fn(f64, f64) -> Option<Tz> + Send + Sync,
{
    fn timezone_at(&self, latitude: f64, longitude: f64) -> Result<Tz, LocalizeError> {
        self(latitude, longitude).ok_or(LocalizeError::TimezoneResolutionFailed {
            latitude,
            longitude,
        })
    }
}

/// Polygon lookup backed by the timezone boundaries bundled with `tzf-rs`.
///
/// The boundary data is decoded on first use and shared for the life of the
/// process.
#[derive(Debug, Default, Clone, Copy)]
pub struct TzfLookup;

impl TzfLookup {
    fn finder() -> &'static DefaultFinder {
        static FINDER: OnceLock<DefaultFinder> = OnceLock::new();
        FINDER.get_or_init(DefaultFinder::new)
    }
}

impl TimezoneLookup for TzfLookup {
    fn timezone_at(&self, latitude: f64, longitude: f64) -> Result<Tz, LocalizeError> {
        let name = Self::finder().get_tz_name(longitude, latitude);
        // Open ocean is covered by nautical `Etc/GMT±N` zones, not a civil one.
        if name.is_empty() || name.starts_with("Etc/") {
            return Err(LocalizeError::TimezoneResolutionFailed {
                latitude,
                longitude,
            });
        }
        name.parse::<Tz>()
            .map_err(|_| LocalizeError::UnknownTimezone(name.to_string()))
    }
}

/// `true` when `time` looks like `H:MM` or `HH:MM`.
///
/// This only checks the shape; `29:00` passes here and is rejected when
/// parsed.
pub fn validate_time_format(time: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[0-2]?\d:[0-5]\d$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(time))
}

fn parse_time(time: &str) -> Result<NaiveTime, LocalizeError> {
    if !validate_time_format(time) {
        return Err(LocalizeError::InvalidTimeFormat(time.to_string()));
    }
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| LocalizeError::InvalidTimeFormat(time.to_string()))
}

/// Interprets `naive` as wall-clock time in `tz`.
///
/// A time repeated by a DST fall-back maps to its later (standard time)
/// instant. A time skipped by a spring-forward gap is read with the offset
/// in force just before the gap.
pub(crate) fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(_, latest) => latest.with_timezone(&Utc),
        LocalResult::None => {
            let offset = tz
                .from_local_datetime(&(naive - TimeDelta::hours(1)))
                .earliest()
                .map(|dt| dt.offset().fix())
                .unwrap_or_else(|| tz.offset_from_utc_datetime(&naive).fix());
            debug!("{} does not exist in {}, using offset {}", naive, tz, offset);
            (naive - TimeDelta::seconds(i64::from(offset.local_minus_utc()))).and_utc()
        }
    }
}

/// Local-time to UTC conversion at a coordinate.
#[derive(Clone)]
pub struct TimeLocalizer {
    lookup: Arc<dyn TimezoneLookup>,
}

impl fmt::Debug for TimeLocalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeLocalizer").finish_non_exhaustive()
    }
}

impl Default for TimeLocalizer {
    fn default() -> Self {
        Self::new(TzfLookup)
    }
}

impl TimeLocalizer {
    pub fn new(lookup: impl TimezoneLookup + 'static) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    pub fn timezone_at(&self, latitude: f64, longitude: f64) -> Result<Tz, LocalizeError> {
        self.lookup.timezone_at(latitude, longitude)
    }

    /// The UTC instant of wall-clock `time` (`HH:MM`) on `date` at the
    /// coordinate.
    ///
    /// # Errors
    ///
    /// [`LocalizeError::InvalidTimeFormat`] for a malformed time, and
    /// [`LocalizeError::TimezoneResolutionFailed`] when no timezone covers the
    /// coordinate.
    pub fn to_utc(
        &self,
        time: &str,
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
    ) -> Result<DateTime<Utc>, LocalizeError> {
        let time = parse_time(time)?;
        let tz = self.timezone_at(latitude, longitude)?;
        Ok(localize(tz, date.and_time(time)))
    }

    /// Wall-clock time at the coordinate for `instant`.
    pub fn to_local(
        &self,
        instant: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Result<NaiveDateTime, LocalizeError> {
        let tz = self.timezone_at(latitude, longitude)?;
        Ok(instant.with_timezone(&tz).naive_local())
    }
}
