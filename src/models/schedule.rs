//! Crawl cadence configuration.
//!
//! The configured `(period, value)` pair is converted once into a
//! [`Cadence`]: a single tick period plus an optional weekday alignment.

use std::time::Duration;

use chrono::{DateTime, Datelike, Days, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Time unit (or weekday) of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePeriod {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl SchedulePeriod {
    /// Length of one unit and the weekday to align to, if any.
    fn unit(self) -> (Duration, Option<Weekday>) {
        const DAY: u64 = 24 * 60 * 60;
        const WEEK: u64 = 7 * DAY;
        match self {
            Self::Seconds => (Duration::from_secs(1), None),
            Self::Minutes => (Duration::from_secs(60), None),
            Self::Hours => (Duration::from_secs(60 * 60), None),
            Self::Days => (Duration::from_secs(DAY), None),
            Self::Weeks => (Duration::from_secs(WEEK), None),
            Self::Monday => (Duration::from_secs(WEEK), Some(Weekday::Mon)),
            Self::Tuesday => (Duration::from_secs(WEEK), Some(Weekday::Tue)),
            Self::Wednesday => (Duration::from_secs(WEEK), Some(Weekday::Wed)),
            Self::Thursday => (Duration::from_secs(WEEK), Some(Weekday::Thu)),
            Self::Friday => (Duration::from_secs(WEEK), Some(Weekday::Fri)),
            Self::Saturday => (Duration::from_secs(WEEK), Some(Weekday::Sat)),
            Self::Sunday => (Duration::from_secs(WEEK), Some(Weekday::Sun)),
        }
    }
}

/// Schedule as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleDefinition {
    pub period: SchedulePeriod,

    #[serde(default = "default_value")]
    pub value: u64,
}

fn default_value() -> u64 {
    1
}

impl Default for ScheduleDefinition {
    fn default() -> Self {
        Self {
            period: SchedulePeriod::Hours,
            value: 1,
        }
    }
}

impl ScheduleDefinition {
    /// Convert into a cadence, rejecting a zero value.
    pub fn cadence(&self) -> Result<Cadence> {
        if self.value == 0 {
            return Err(AppError::config("schedule value must be > 0"));
        }
        let (unit, weekday) = self.period.unit();
        let factor = u32::try_from(self.value)
            .map_err(|_| AppError::config(format!("schedule value {} is too large", self.value)))?;
        let period = unit
            .checked_mul(factor)
            .ok_or_else(|| AppError::config("schedule period overflows"))?;
        Ok(Cadence { period, weekday })
    }
}

/// Tick period plus optional weekday alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub period: Duration,
    pub weekday: Option<Weekday>,
}

impl Cadence {
    /// Plain interval cadence.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            weekday: None,
        }
    }

    /// Delay before the first tick.
    ///
    /// Interval cadences fire immediately; weekday cadences wait for the
    /// next midnight (UTC) falling on that weekday.
    pub fn first_delay(&self, now: DateTime<Utc>) -> Duration {
        let Some(weekday) = self.weekday else {
            return Duration::ZERO;
        };

        let today = now.date_naive();
        let ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
        let mut target = today
            .checked_add_days(Days::new(u64::from(ahead)))
            .unwrap_or(today)
            .and_time(NaiveTime::MIN)
            .and_utc();
        if target <= now {
            target += chrono::Duration::days(7);
        }
        (target - now).to_std().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn units_convert_to_single_duration() {
        let def = ScheduleDefinition {
            period: SchedulePeriod::Hours,
            value: 6,
        };
        assert_eq!(def.cadence().unwrap(), Cadence::every(Duration::from_secs(6 * 3600)));

        let def = ScheduleDefinition {
            period: SchedulePeriod::Seconds,
            value: 1,
        };
        assert_eq!(def.cadence().unwrap().period, Duration::from_secs(1));
    }

    #[test]
    fn zero_value_is_config_error() {
        let def = ScheduleDefinition {
            period: SchedulePeriod::Minutes,
            value: 0,
        };
        assert!(def.cadence().is_err());
    }

    #[test]
    fn weekday_cadence_is_weekly() {
        let def = ScheduleDefinition {
            period: SchedulePeriod::Friday,
            value: 2,
        };
        let cadence = def.cadence().unwrap();
        assert_eq!(cadence.period, Duration::from_secs(14 * 24 * 3600));
        assert_eq!(cadence.weekday, Some(Weekday::Fri));
    }

    #[test]
    fn interval_fires_immediately() {
        let cadence = Cadence::every(Duration::from_secs(60));
        assert_eq!(cadence.first_delay(Utc::now()), Duration::ZERO);
    }

    #[test]
    fn weekday_waits_for_next_midnight() {
        // 2024-05-01 is a Wednesday
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let friday = Cadence {
            period: Duration::from_secs(7 * 24 * 3600),
            weekday: Some(Weekday::Fri),
        };
        assert_eq!(friday.first_delay(now), Duration::from_secs(38 * 3600));

        // Same weekday, midnight already passed: next week
        let wednesday = Cadence {
            weekday: Some(Weekday::Wed),
            ..friday
        };
        assert_eq!(
            wednesday.first_delay(now),
            Duration::from_secs(7 * 24 * 3600 - 10 * 3600)
        );
    }

    #[test]
    fn period_names_parse_lowercase() {
        let def: ScheduleDefinition = toml::from_str("period = \"monday\"\nvalue = 1").unwrap();
        assert_eq!(def.period, SchedulePeriod::Monday);
    }
}
