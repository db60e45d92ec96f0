//! Daily date-range iteration
//!
//! Ranges are half-open: the start date is included, the end date is
//! not, and every calendar day in between is yielded exactly once.

use crate::error::{DatagenError, Result};
use chrono::NaiveDate;

/// Half-open range of calendar days, `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range from `start` (inclusive) to `end` (exclusive)
    ///
    /// # Errors
    /// - `end` is before `start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(DatagenError::invalid_config(format!(
                "End date {} is before start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Range covering exactly one day
    pub fn single_day(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day.succ_opt().unwrap_or(day),
        }
    }

    /// First date of the range (included)
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// End date of the range (excluded)
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days the range covers
    #[allow(clippy::cast_sign_loss)]
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize
    }

    /// Whether the range covers no days
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Iterate the days of the range
    pub fn iter(&self) -> Days {
        Days {
            next: self.start,
            end: self.end,
        }
    }
}

impl IntoIterator for DateRange {
    type Item = NaiveDate;
    type IntoIter = Days;

    fn into_iter(self) -> Days {
        self.iter()
    }
}

impl IntoIterator for &DateRange {
    type Item = NaiveDate;
    type IntoIter = Days;

    fn into_iter(self) -> Days {
        self.iter()
    }
}

/// Iterator over the days of a [`DateRange`]
#[derive(Debug, Clone)]
pub struct Days {
    next: NaiveDate,
    end: NaiveDate,
}

impl Iterator for Days {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        // succ_opt only fails at NaiveDate::MAX, which `end` cannot exceed
        self.next = self.next.succ_opt()?;
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        #[allow(clippy::cast_sign_loss)]
        let remaining = (self.end - self.next).num_days().max(0) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Days {}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_start_inclusive_end_exclusive() {
        let range = DateRange::new(date(2020, 1, 30), date(2020, 2, 2)).unwrap();
        let days: Vec<NaiveDate> = range.iter().collect();
        assert_eq!(
            days,
            vec![date(2020, 1, 30), date(2020, 1, 31), date(2020, 2, 1)]
        );
        assert_eq!(range.len(), 3);
    }

    #[test]
    fn test_each_day_exactly_once() {
        let range = DateRange::new(date(2019, 12, 25), date(2020, 1, 5)).unwrap();
        let days: Vec<NaiveDate> = range.iter().collect();
        assert_eq!(days.len(), 11);
        let mut dedup = days.clone();
        dedup.dedup();
        assert_eq!(days, dedup);
        for pair in days.windows(2) {
            assert_eq!(pair[0].succ_opt().unwrap(), pair[1]);
        }
    }

    #[test]
    fn test_empty_range_yields_nothing() {
        let range = DateRange::new(date(2020, 6, 1), date(2020, 6, 1)).unwrap();
        assert!(range.is_empty());
        assert_eq!(range.iter().count(), 0);
    }

    #[test]
    fn test_reversed_range_rejected() {
        let err = DateRange::new(date(2020, 6, 2), date(2020, 6, 1)).unwrap_err();
        assert!(err.to_string().contains("before start date"));
    }

    #[test]
    fn test_single_day() {
        let range = DateRange::single_day(date(2022, 2, 28));
        let days: Vec<NaiveDate> = range.iter().collect();
        assert_eq!(days, vec![date(2022, 2, 28)]);
    }

    #[test]
    fn test_leap_day_included() {
        let range = DateRange::new(date(2020, 2, 28), date(2020, 3, 1)).unwrap();
        let days: Vec<NaiveDate> = range.iter().collect();
        assert_eq!(days, vec![date(2020, 2, 28), date(2020, 2, 29)]);
    }

    #[test]
    fn test_size_hint_matches() {
        let range = DateRange::new(date(2021, 1, 1), date(2021, 1, 11)).unwrap();
        let iter = range.iter();
        assert_eq!(iter.len(), 10);
        assert_eq!(iter.count(), 10);
    }
}
