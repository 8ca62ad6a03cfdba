//! Calendar-day order count and notional volume tracking.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when the daily order ceiling would be exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("daily order limit reached: {count}/{max}")]
pub struct DailyLimitExceeded {
    /// Orders already counted today.
    pub count: u32,
    /// Configured daily maximum.
    pub max: u32,
}

/// Read-only snapshot of today's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    /// Trading day the counters cover.
    pub date: NaiveDate,
    /// Orders counted today.
    pub order_count: u32,
    /// Notional volume accumulated today.
    pub volume: Decimal,
    /// Configured daily order maximum.
    pub max_orders: u32,
}

/// Tracks order count and notional volume for the current trading day.
///
/// The stored date always equals the current day: any access observed
/// after rollover resets both counters before evaluating.
#[derive(Debug)]
pub struct DailyLimitsTracker {
    date: NaiveDate,
    order_count: u32,
    volume: Decimal,
    max_orders: u32,
}

impl DailyLimitsTracker {
    /// Create a tracker for today with the given order ceiling.
    #[must_use]
    pub fn new(max_orders: u32) -> Self {
        Self {
            date: today(),
            order_count: 0,
            volume: Decimal::ZERO,
            max_orders,
        }
    }

    /// Reserve one order slot for today.
    ///
    /// Rolls the counters over first when the stored date is stale. Fails
    /// without incrementing when the ceiling would be exceeded.
    ///
    /// # Errors
    ///
    /// Returns `DailyLimitExceeded` when `count + 1` would exceed the
    /// configured maximum.
    pub fn check_and_increment_order_count(&mut self) -> Result<u32, DailyLimitExceeded> {
        self.check_and_increment_on(today())
    }

    pub(crate) fn check_and_increment_on(
        &mut self,
        date: NaiveDate,
    ) -> Result<u32, DailyLimitExceeded> {
        self.roll_over_if_stale(date);

        if self.order_count + 1 > self.max_orders {
            return Err(DailyLimitExceeded {
                count: self.order_count,
                max: self.max_orders,
            });
        }

        self.order_count += 1;
        Ok(self.order_count)
    }

    /// Accumulate notional volume for audit/policy use.
    pub fn add_order_volume(&mut self, amount: Decimal) {
        self.add_order_volume_on(amount, today());
    }

    pub(crate) fn add_order_volume_on(&mut self, amount: Decimal, date: NaiveDate) {
        self.roll_over_if_stale(date);
        self.volume += amount;
    }

    /// Read-only snapshot of today's counters.
    #[must_use]
    pub fn get_daily_stats(&mut self) -> DailyStats {
        self.roll_over_if_stale(today());
        DailyStats {
            date: self.date,
            order_count: self.order_count,
            volume: self.volume,
            max_orders: self.max_orders,
        }
    }

    fn roll_over_if_stale(&mut self, date: NaiveDate) {
        if self.date != date {
            tracing::info!(
                previous_day = %self.date,
                current_day = %date,
                orders = self.order_count,
                "daily counters reset on rollover"
            );
            self.date = date;
            self.order_count = 0;
            self.volume = Decimal::ZERO;
        }
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_increments_until_ceiling() {
        let mut tracker = DailyLimitsTracker::new(50);
        let d = day("2026-08-06");

        for i in 1..=50 {
            assert_eq!(tracker.check_and_increment_on(d), Ok(i));
        }

        // 51st fails and the count stays at 50
        let err = tracker.check_and_increment_on(d).unwrap_err();
        assert_eq!(err.count, 50);
        assert_eq!(err.max, 50);
        assert_eq!(tracker.order_count, 50);
    }

    #[test]
    fn test_rollover_resets_counters() {
        let mut tracker = DailyLimitsTracker::new(3);
        let monday = day("2026-08-03");
        let tuesday = day("2026-08-04");

        for _ in 0..3 {
            tracker.check_and_increment_on(monday).unwrap();
        }
        tracker.add_order_volume_on(Decimal::new(15_000, 0), monday);
        assert!(tracker.check_and_increment_on(monday).is_err());

        // First operation after rollover resets count and volume to zero
        assert_eq!(tracker.check_and_increment_on(tuesday), Ok(1));
        assert_eq!(tracker.volume, Decimal::ZERO);
        assert_eq!(tracker.date, tuesday);
    }

    #[test]
    fn test_volume_accumulates() {
        let mut tracker = DailyLimitsTracker::new(10);
        let d = day("2026-08-06");

        tracker.add_order_volume_on(Decimal::new(1_500, 0), d);
        tracker.add_order_volume_on(Decimal::new(2_500, 0), d);
        assert_eq!(tracker.volume, Decimal::new(4_000, 0));
    }

    #[test]
    fn test_stats_snapshot() {
        let mut tracker = DailyLimitsTracker::new(10);
        tracker.check_and_increment_order_count().unwrap();

        let stats = tracker.get_daily_stats();
        assert_eq!(stats.order_count, 1);
        assert_eq!(stats.max_orders, 10);
        assert_eq!(stats.volume, Decimal::ZERO);
    }
}
