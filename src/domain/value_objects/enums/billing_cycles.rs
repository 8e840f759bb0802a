use std::fmt::Display;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum BillingCycle {
    #[default]
    Monthly,
    Yearly,
    OneTime,
}

impl BillingCycle {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "monthly" => Some(BillingCycle::Monthly),
            "yearly" => Some(BillingCycle::Yearly),
            "one_time" => Some(BillingCycle::OneTime),
            _ => None,
        }
    }

    /// Next period end, computed from the current period end rather than
    /// "now" so late renewals never drift the billing anchor. Day-of-month
    /// overflow clamps to the last day of the target month (Jan 31 + 1 month
    /// = Feb 28). One-time cycles have no next period.
    pub fn advance_period_end(&self, current_end: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            BillingCycle::Monthly => current_end.checked_add_months(Months::new(1)),
            BillingCycle::Yearly => current_end.checked_add_months(Months::new(12)),
            BillingCycle::OneTime => None,
        }
    }
}

impl Display for BillingCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cycle = match self {
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
            BillingCycle::OneTime => "one_time",
        };
        write!(f, "{}", cycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_monthly_advance_clamps_end_of_month() {
        let jan_31 = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let advanced = BillingCycle::Monthly.advance_period_end(jan_31).unwrap();
        assert_eq!(advanced, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_monthly_advance_keeps_day_when_valid() {
        let mar_15 = Utc.with_ymd_and_hms(2025, 3, 15, 12, 30, 0).unwrap();
        let advanced = BillingCycle::Monthly.advance_period_end(mar_15).unwrap();
        assert_eq!(advanced, Utc.with_ymd_and_hms(2025, 4, 15, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_yearly_advance_handles_leap_day() {
        let feb_29 = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        let advanced = BillingCycle::Yearly.advance_period_end(feb_29).unwrap();
        assert_eq!(advanced, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_one_time_has_no_next_period() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(BillingCycle::OneTime.advance_period_end(now).is_none());
    }
}
