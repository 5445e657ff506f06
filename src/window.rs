//! Date windows for fetch queries and file naming.

use crate::error::{DigestError, Result};
use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static FILE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2})_to_(\d{4}-\d{2}-\d{2})").expect("valid file key regex")
});

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The last `days` days up to and including `today`.
    pub fn last_days(days: u32, today: NaiveDate) -> Result<Self> {
        let start = today.checked_sub_days(Days::new(days.into())).ok_or_else(|| {
            DigestError::Validation(format!("--days {} reaches past the earliest date", days))
        })?;
        Ok(Self { start, end: today })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// `YYYY-MM-DD_to_YYYY-MM-DD`, the key used in listing and report file names.
    pub fn file_key(&self) -> String {
        format!("{}_to_{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }

    /// Recover a window from any file name containing `YYYY-MM-DD_to_YYYY-MM-DD`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let caps = FILE_KEY_RE.captures(name)?;
        let start = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d").ok()?;
        Some(Self { start, end })
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_last_days() {
        let window = DateWindow::last_days(3, date(2024, 10, 4)).unwrap();
        assert_eq!(window.start, date(2024, 10, 1));
        assert_eq!(window.end, date(2024, 10, 4));
        assert!(window.contains(date(2024, 10, 1)));
        assert!(window.contains(date(2024, 10, 4)));
        assert!(!window.contains(date(2024, 9, 30)));
        assert!(!window.contains(date(2024, 10, 5)));
    }

    #[test]
    fn test_last_days_crosses_month() {
        let window = DateWindow::last_days(2, date(2024, 3, 1)).unwrap();
        assert_eq!(window.start, date(2024, 2, 28));
    }

    #[test]
    fn test_last_days_overflow_is_rejected() {
        let err = DateWindow::last_days(u32::MAX, date(2024, 10, 4)).unwrap_err();
        assert!(matches!(err, DigestError::Validation(_)));
    }

    #[test]
    fn test_file_key_round_trip() {
        let window = DateWindow::new(date(2024, 10, 1), date(2024, 10, 4));
        assert_eq!(window.file_key(), "2024-10-01_to_2024-10-04");
        let parsed = DateWindow::from_file_name("papers/cv_papers_2024-10-01_to_2024-10-04.md");
        assert_eq!(parsed, Some(window));
    }

    #[test]
    fn test_from_file_name_rejects_garbage() {
        assert_eq!(DateWindow::from_file_name("notes.md"), None);
        assert_eq!(DateWindow::from_file_name("cv_papers_2024-13-01_to_2024-10-04.md"), None);
    }

    #[test]
    fn test_display() {
        let window = DateWindow::new(date(2024, 10, 1), date(2024, 10, 4));
        assert_eq!(window.to_string(), "2024-10-01 to 2024-10-04");
    }
}
