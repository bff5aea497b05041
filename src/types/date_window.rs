//! Inclusive date windows for chunking datagetter queries.

use chrono::{Days, NaiveDate};
use std::ops::RangeInclusive;

/// One begin/end window of a chunked fetch, both ends inclusive as the
/// service interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Self {
        DateWindow { begin, end }
    }

    /// One window per calendar year, January 1 through December 31.
    pub fn yearly(years: RangeInclusive<i32>) -> Vec<DateWindow> {
        years
            .filter_map(|year| {
                Some(DateWindow::new(
                    NaiveDate::from_ymd_opt(year, 1, 1)?,
                    NaiveDate::from_ymd_opt(year, 12, 31)?,
                ))
            })
            .collect()
    }

    /// Windows of `step_days` spanning the years, built from consecutive
    /// pairs of step points. Adjacent windows share their boundary day; the
    /// dedup pass absorbs the one-day overlap.
    pub fn stepped(years: RangeInclusive<i32>, step_days: u32) -> Vec<DateWindow> {
        let Some(start) = NaiveDate::from_ymd_opt(*years.start(), 1, 1) else {
            return Vec::new();
        };
        let Some(last) = NaiveDate::from_ymd_opt(*years.end(), 12, 31) else {
            return Vec::new();
        };
        let mut points = Vec::new();
        let mut point = start;
        while point <= last {
            points.push(point);
            match point.checked_add_days(Days::new(step_days as u64)) {
                Some(next) => point = next,
                None => break,
            }
        }
        points
            .windows(2)
            .map(|pair| DateWindow::new(pair[0], pair[1]))
            .collect()
    }

    pub(crate) fn begin_param(&self) -> String {
        self.begin.format("%Y%m%d").to_string()
    }

    pub(crate) fn end_param(&self) -> String {
        self.end.format("%Y%m%d").to_string()
    }
}
