//! Time window resolution.
//!
//! Turns the configured max ages and the optional user-supplied date bounds
//! into the `[from, to)` window a discovery query runs over. Timestamps are
//! Unix seconds in UTC; dates are whole UTC days.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{DiscoveryError, Result};
use crate::models::IndexStrategy;

pub const DAY_SECONDS: i64 = 86_400;

/// The two independent max-age sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxAge {
    /// Discovery-specific max age in seconds. `0` defers to `fallback`.
    pub primary: i64,
    /// Retention of the recent-activity index, in seconds.
    pub fallback: i64,
}

impl MaxAge {
    /// Max age applied to requests and used to validate explicit dates.
    pub fn effective(&self) -> i64 {
        if self.primary > 0 {
            self.primary
        } else {
            self.fallback
        }
    }

    /// Additional retention cap imposed by the index itself.
    ///
    /// The recent-activity index holds nothing older than `fallback`, so a
    /// window reaching further back is narrowed to it.
    pub fn retention_for(&self, strategy: IndexStrategy) -> Option<i64> {
        match strategy {
            IndexStrategy::ByRecentActivity => Some(self.fallback),
            IndexStrategy::ByActorHistory => None,
        }
    }

    /// Whether `strategy` returns a shorter window than the effective max age.
    pub fn is_limited_by_retention(&self, strategy: IndexStrategy) -> bool {
        self.retention_for(strategy)
            .is_some_and(|retention| retention < self.effective())
    }
}

/// What to do with an explicit date earlier than the max age allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundPolicy {
    /// Silently move the bound up to the floor.
    Clamp,
    /// Fail with [`DiscoveryError::DateOutOfRange`].
    Reject,
}

/// A user-requested date bound together with its out-of-range policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBound {
    pub date: NaiveDate,
    pub if_too_early: BoundPolicy,
}

impl DateBound {
    pub fn reject(date: NaiveDate) -> Self {
        Self {
            date,
            if_too_early: BoundPolicy::Reject,
        }
    }

    pub fn clamp(date: NaiveDate) -> Self {
        Self {
            date,
            if_too_early: BoundPolicy::Clamp,
        }
    }
}

/// Resolved window: `from` inclusive, `to` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: i64,
    pub to: Option<i64>,
}

impl TimeWindow {
    /// Raise the lower bound to at least `floor`, re-checking the range.
    pub fn narrow_floor(self, floor: i64) -> Result<TimeWindow> {
        let window = TimeWindow {
            from: self.from.max(floor),
            to: self.to,
        };
        check_range(&window)?;
        Ok(window)
    }
}

/// Resolve the discovery window.
///
/// - The floor is `now - max_age_seconds`; without a requested start the
///   window begins exactly there.
/// - Explicit dates are checked against the start of today minus the max
///   age, then clamped or rejected per their [`BoundPolicy`].
/// - A requested end date covers that whole day.
/// - The end never extends past `now + 1 day`.
pub fn resolve(
    max_age_seconds: i64,
    requested_from: Option<DateBound>,
    requested_to: Option<DateBound>,
    now: DateTime<Utc>,
) -> Result<TimeWindow> {
    let now_ts = now.timestamp();
    let floor = now_ts - max_age_seconds;
    let validation_floor = start_of_day(now.date_naive()) - max_age_seconds;

    let from = match requested_from {
        Some(bound) => {
            let requested = start_of_day(bound.date);
            if requested < validation_floor && bound.if_too_early == BoundPolicy::Reject {
                return Err(DiscoveryError::DateOutOfRange { max_age_seconds });
            }
            requested.max(floor)
        }
        None => floor,
    };

    let to = match requested_to {
        Some(bound) => {
            let requested = start_of_day(bound.date);
            if requested < validation_floor && bound.if_too_early == BoundPolicy::Reject {
                return Err(DiscoveryError::DateOutOfRange { max_age_seconds });
            }
            Some((requested + DAY_SECONDS).min(now_ts + DAY_SECONDS))
        }
        None => None,
    };

    let window = TimeWindow { from, to };
    check_range(&window)?;
    if window.from > now_ts {
        return Err(DiscoveryError::RangeInFuture);
    }
    Ok(window)
}

fn check_range(window: &TimeWindow) -> Result<()> {
    match window.to {
        Some(to) if to < window.from => Err(DiscoveryError::ImpossibleRange),
        _ => Ok(()),
    }
}

fn start_of_day(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}
