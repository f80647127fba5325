//! Settlement calendars.
//!
//! The default calendar knows weekends only. Holiday awareness is added by
//! swapping in a [`HolidayCalendar`] (or any other implementation) when
//! building the trade validator.

use std::collections::BTreeSet;

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Business-day rules used by the settlement check.
pub trait SettlementCalendar: Send + Sync {
    fn is_business_day(&self, date: NaiveDate) -> bool;

    /// Advances `days` business days from `date`. Zero days rolls `date`
    /// forward to the next business day if needed.
    fn add_business_days(&self, date: NaiveDate, days: u32) -> Option<NaiveDate> {
        let mut current = date;
        let mut remaining = days;
        while remaining > 0 {
            current = current.checked_add_days(Days::new(1))?;
            if self.is_business_day(current) {
                remaining -= 1;
            }
        }
        self.roll_forward(current)
    }

    /// First business day on or after `date`.
    fn roll_forward(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut current = date;
        // Any sane calendar has a business day within a few weeks.
        for _ in 0..31 {
            if self.is_business_day(current) {
                return Some(current);
            }
            current = current.checked_add_days(Days::new(1))?;
        }
        None
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Saturday and Sunday are the only non-business days.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekendCalendar;

impl SettlementCalendar for WeekendCalendar {
    fn is_business_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date)
    }
}

/// Weekends plus an explicit list of market holidays.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new<I: IntoIterator<Item = NaiveDate>>(holidays: I) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }
}

impl SettlementCalendar for HolidayCalendar {
    fn is_business_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date) && !self.holidays.contains(&date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_t_plus_two_midweek() {
        // Monday 2024-06-17 -> Wednesday 2024-06-19
        assert_eq!(WeekendCalendar.add_business_days(date(2024, 6, 17), 2), Some(date(2024, 6, 19)));
    }

    #[test]
    fn test_t_plus_two_over_weekend() {
        // Thursday -> Monday, Friday -> Tuesday
        assert_eq!(WeekendCalendar.add_business_days(date(2024, 6, 20), 2), Some(date(2024, 6, 24)));
        assert_eq!(WeekendCalendar.add_business_days(date(2024, 6, 21), 2), Some(date(2024, 6, 25)));
    }

    #[test]
    fn test_zero_days_rolls_forward() {
        assert_eq!(WeekendCalendar.add_business_days(date(2024, 6, 22), 0), Some(date(2024, 6, 24)));
        assert_eq!(WeekendCalendar.add_business_days(date(2024, 6, 19), 0), Some(date(2024, 6, 19)));
    }

    #[test]
    fn test_weekend_detection() {
        assert!(is_weekend(date(2024, 6, 22)));
        assert!(is_weekend(date(2024, 6, 23)));
        assert!(!is_weekend(date(2024, 6, 24)));
    }

    #[test]
    fn test_holiday_calendar_skips_holidays() {
        // Juneteenth 2024 fell on a Wednesday.
        let calendar = HolidayCalendar::new([date(2024, 6, 19)]);
        assert!(!calendar.is_business_day(date(2024, 6, 19)));
        assert_eq!(calendar.add_business_days(date(2024, 6, 17), 2), Some(date(2024, 6, 20)));
    }
}
