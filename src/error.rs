//! Error taxonomy for the discovery core.

use crate::time_window::DAY_SECONDS;

pub type Result<T, E = DiscoveryError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// A user-requested date lies before the configured max age.
    #[error("Dates older than {} cannot be searched.", format_period(.max_age_seconds))]
    DateOutOfRange { max_age_seconds: i64 },
    /// The resolved window ends before it starts.
    #[error("The requested date range ends before it starts.")]
    ImpossibleRange,
    /// The resolved window starts after the current time.
    #[error("The requested date range starts in the future.")]
    RangeInFuture,
    /// The chosen index cannot serve the composed predicate.
    #[error("Index strategy '{strategy}' cannot serve this filter.")]
    UnsupportedStrategy { strategy: &'static str },
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error(
        "Discovery query exceeded its execution budget of {budget_ms} ms. \
         The search is read-only and can be retried."
    )]
    BudgetExceeded { budget_ms: u64 },
    #[error("Discovery query failed: {0}. The search is read-only and can be retried.")]
    Sqlx(#[from] sqlx::Error),
}

impl DiscoveryError {
    /// Errors that mean "no results" rather than a failure to report.
    pub fn is_empty_range(&self) -> bool {
        matches!(
            self,
            DiscoveryError::ImpossibleRange | DiscoveryError::RangeInFuture
        )
    }
}

/// Render a max age as whole days, or hours when shorter than a day.
pub(crate) fn format_period(seconds: &i64) -> String {
    let seconds = *seconds;
    if seconds >= DAY_SECONDS {
        let days = seconds / DAY_SECONDS;
        format!("{} day{}", days, if days == 1 { "" } else { "s" })
    } else {
        let hours = (seconds / 3600).max(1);
        format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_out_of_range_message() {
        let err = DiscoveryError::DateOutOfRange {
            max_age_seconds: DAY_SECONDS * 90,
        };
        assert_eq!(err.to_string(), "Dates older than 90 days cannot be searched.");
    }

    #[test]
    fn test_short_periods_render_in_hours() {
        assert_eq!(format_period(&600), "1 hour");
        assert_eq!(format_period(&(3600 * 5)), "5 hours");
        assert_eq!(format_period(&DAY_SECONDS), "1 day");
    }

    #[test]
    fn test_empty_range_classification() {
        assert!(DiscoveryError::ImpossibleRange.is_empty_range());
        assert!(DiscoveryError::RangeInFuture.is_empty_range());
        assert!(!DiscoveryError::DateOutOfRange { max_age_seconds: 1 }.is_empty_range());
    }
}
