//! Local-day arithmetic for check-ins
//!
//! All attendance is bucketed by the calendar day in the congregation's
//! timezone, not in UTC. A check-in is late when the local wall-clock time is
//! strictly after the service start hour.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Default hour at which services start
pub const DEFAULT_SERVICE_START_HOUR: u32 = 9;

/// Default congregation timezone
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Africa::Lagos;

/// Longest DST gap searched when local midnight does not exist
const MAX_DST_GAP_MINUTES: i64 = 3 * 60;

/// Timezone and lateness cutoff used by the attendance recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckInPolicy {
    tz: Tz,
    service_start: NaiveTime,
}

impl Default for CheckInPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE, DEFAULT_SERVICE_START_HOUR)
    }
}

impl CheckInPolicy {
    /// Hours past 23 are clamped to 23
    pub fn new(tz: Tz, service_start_hour: u32) -> Self {
        let service_start = NaiveTime::from_hms_opt(service_start_hour.min(23), 0, 0)
            .unwrap_or(NaiveTime::MIN);
        Self { tz, service_start }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn service_start(&self) -> NaiveTime {
        self.service_start
    }

    /// Local calendar day containing `at`
    pub fn local_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    /// UTC bounds `[start, start + 24h)` of the local day `day`
    pub fn day_window(&self, day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.start_of_day(day);
        (start, start + Duration::hours(24))
    }

    /// First instant of `day` in the policy timezone
    fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        let midnight = day.and_time(NaiveTime::MIN);

        // Midnight skipped by a DST jump: the day starts at the first local
        // minute that exists
        (0..=MAX_DST_GAP_MINUTES)
            .find_map(|offset| {
                match self
                    .tz
                    .from_local_datetime(&(midnight + Duration::minutes(offset)))
                {
                    LocalResult::Single(t) => Some(t),
                    LocalResult::Ambiguous(earliest, _) => Some(earliest),
                    LocalResult::None => None,
                }
            })
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc())
    }

    /// Whether a check-in at `at` is after the service start
    pub fn is_late(&self, at: DateTime<Utc>) -> bool {
        at.with_timezone(&self.tz).time() > self.service_start
    }
}
