//! Calendar-day arithmetic shared by every economy component.
//!
//! All "same day" and "yesterday" decisions normalize through [`GrowthClock`],
//! which applies a fixed UTC offset so that a timestamp taken late in the
//! evening and one taken the next morning land on different calendar days for
//! the player, regardless of where the process runs.
use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Offset, TimeDelta, TimeZone, Utc,
};
use std::sync::atomic::{AtomicI64, Ordering};

use crate::catalog::Theme;

/// Day-boundary calculator bound to a player's UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthClock {
    offset: FixedOffset,
}

impl Default for GrowthClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl GrowthClock {
    /// Clock whose days start at midnight UTC.
    #[must_use]
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    #[must_use]
    pub const fn with_offset(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Build a clock from an offset in seconds east of UTC.
    /// Returns `None` when the offset is outside ±24h.
    #[must_use]
    pub fn with_offset_seconds(seconds_east: i32) -> Option<Self> {
        FixedOffset::east_opt(seconds_east).map(Self::with_offset)
    }

    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day of `at` in the player's offset.
    #[must_use]
    pub fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    #[must_use]
    pub fn start_of_day(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = self.day_of(at).and_time(NaiveTime::MIN);
        self.offset
            .from_local_datetime(&midnight)
            .single()
            .map_or(at, |local| local.with_timezone(&Utc))
    }

    #[must_use]
    pub fn is_same_day(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        self.day_of(a) == self.day_of(b)
    }

    /// Start of the calendar day before `at`.
    #[must_use]
    pub fn yesterday(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of_day(at) - TimeDelta::days(1)
    }

    /// Seasonal theme of the month `at` falls in.
    #[must_use]
    pub fn theme_of(&self, at: DateTime<Utc>) -> Theme {
        Theme::for_month(self.day_of(at).month())
    }
}

/// A concrete "now" paired with the clock that interprets it.
///
/// Ledger operations take a `Today` rather than reading the wall clock so that
/// tests and the simulation harness can drive time explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Today {
    pub now: DateTime<Utc>,
    pub clock: GrowthClock,
}

impl Today {
    #[must_use]
    pub const fn new(now: DateTime<Utc>, clock: GrowthClock) -> Self {
        Self { now, clock }
    }

    /// Today interpreted in UTC.
    #[must_use]
    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, GrowthClock::utc())
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.clock.day_of(self.now)
    }

    #[must_use]
    pub fn is_same_day(&self, other: DateTime<Utc>) -> bool {
        self.clock.is_same_day(self.now, other)
    }

    #[must_use]
    pub fn yesterday(&self) -> DateTime<Utc> {
        self.clock.yesterday(self.now)
    }

    #[must_use]
    pub fn season(&self) -> Theme {
        self.clock.theme_of(self.now)
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug)]
pub struct FixedClock {
    seconds: AtomicI64,
}

impl FixedClock {
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            seconds: AtomicI64::new(at.timestamp()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.seconds.store(at.timestamp(), Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.seconds
            .fetch_add(days.saturating_mul(86_400), Ordering::SeqCst);
    }

    pub fn advance_hours(&self, hours: i64) {
        self.seconds
            .fetch_add(hours.saturating_mul(3_600), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let seconds = self.seconds.load(Ordering::SeqCst);
        DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::UNIX_EPOCH)
    }
}
