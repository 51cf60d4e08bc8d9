//! Fiscal calendar arithmetic.
//!
//! A fiscal year starts on the first day of `start_month`. Monthly buckets are
//! calendar months; quarterly buckets are fiscal quarters, labelled by the
//! first day of their first month (which may fall in the previous calendar
//! year).

use chrono::{Datelike, Months, NaiveDate};

use crate::domain::Frequency;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalCalendar {
    start_month: u32,
}

impl Default for FiscalCalendar {
    /// Fiscal year equal to the calendar year.
    fn default() -> Self {
        Self { start_month: 1 }
    }
}

impl FiscalCalendar {
    pub fn new(start_month: u32) -> Result<Self, AppError> {
        if !(1..=12).contains(&start_month) {
            return Err(AppError::malformed(format!(
                "Fiscal year start month must be 1..=12, got {start_month}"
            )));
        }
        Ok(Self { start_month })
    }

    pub fn start_month(&self) -> u32 {
        self.start_month
    }

    /// Zero-based month position within the fiscal year.
    pub fn fiscal_month_index(&self, date: NaiveDate) -> u32 {
        (date.month() + 12 - self.start_month) % 12
    }

    /// Zero-based fiscal quarter.
    pub fn fiscal_quarter_index(&self, date: NaiveDate) -> u32 {
        self.fiscal_month_index(date) / 3
    }

    /// Label of the bucket containing `date`.
    pub fn period_start(&self, date: NaiveDate, frequency: Frequency) -> Option<NaiveDate> {
        let month_start = date.with_day(1)?;
        match frequency {
            Frequency::Monthly => Some(month_start),
            Frequency::Quarterly => {
                let back = self.fiscal_month_index(date) % 3;
                month_start.checked_sub_months(Months::new(back))
            }
        }
    }

    /// Seasonal phase of a period label for dummy-variable regression.
    ///
    /// Cycle 12 uses the fiscal month, cycle 4 the fiscal quarter; any other
    /// cycle length falls back to the observation position.
    pub fn season_phase(&self, period: NaiveDate, cycle: usize, position: usize) -> usize {
        match cycle {
            12 => self.fiscal_month_index(period) as usize,
            4 => self.fiscal_quarter_index(period) as usize,
            0 => 0,
            _ => position % cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn rejects_invalid_start_month() {
        assert!(FiscalCalendar::new(0).is_err());
        assert!(FiscalCalendar::new(13).is_err());
        assert_eq!(FiscalCalendar::new(2).unwrap().start_month(), 2);
    }

    #[test]
    fn february_fiscal_year_indices() {
        let cal = FiscalCalendar::new(2).unwrap();
        assert_eq!(cal.fiscal_month_index(d(2024, 2, 10)), 0);
        assert_eq!(cal.fiscal_month_index(d(2024, 1, 31)), 11);
        assert_eq!(cal.fiscal_quarter_index(d(2024, 4, 30)), 0);
        assert_eq!(cal.fiscal_quarter_index(d(2024, 5, 1)), 1);
    }

    #[test]
    fn quarterly_buckets_follow_fiscal_quarters() {
        let cal = FiscalCalendar::new(2).unwrap();
        assert_eq!(cal.period_start(d(2024, 4, 17), Frequency::Quarterly), Some(d(2024, 2, 1)));
        // January belongs to the quarter that started in November.
        assert_eq!(cal.period_start(d(2024, 1, 5), Frequency::Quarterly), Some(d(2023, 11, 1)));
        assert_eq!(cal.period_start(d(2024, 1, 5), Frequency::Monthly), Some(d(2024, 1, 1)));
    }

    #[test]
    fn season_phase_by_cycle() {
        let cal = FiscalCalendar::default();
        assert_eq!(cal.season_phase(d(2024, 3, 1), 12, 99), 2);
        assert_eq!(cal.season_phase(d(2024, 7, 1), 4, 99), 2);
        assert_eq!(cal.season_phase(d(2024, 7, 1), 5, 7), 2);
    }
}
