use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeriodParseError {
    #[error("period '{0}' is not in YYYY-MM format")]
    Format(String),

    #[error("period '{0}' has an out of range month")]
    Month(String),
}

/// A calendar month, stored as the first day of that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Period)
    }

    /// Truncates any date to the month it falls in.
    pub fn from_date(date: NaiveDate) -> Self {
        // day 1 exists for every valid (year, month)
        Period(date.with_day(1).unwrap_or(date))
    }

    /// Parses a `YYYY-MM` key. The month may be written with one or two digits.
    pub fn parse(raw: &str) -> Result<Self, PeriodParseError> {
        let s = raw.trim();
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| PeriodParseError::Format(raw.to_string()))?;

        let well_formed = year.len() == 4
            && (1..=2).contains(&month.len())
            && year.bytes().all(|b| b.is_ascii_digit())
            && month.bytes().all(|b| b.is_ascii_digit());
        if !well_formed {
            return Err(PeriodParseError::Format(raw.to_string()));
        }

        let year: i32 = year
            .parse()
            .map_err(|_| PeriodParseError::Format(raw.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| PeriodParseError::Format(raw.to_string()))?;

        Period::new(year, month).ok_or_else(|| PeriodParseError::Month(raw.to_string()))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Canonical `YYYY-MM` key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.0.year(), self.0.month())
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::parse(s)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Period::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_keys_round_trip() {
        for key in ["2024-01", "1999-12", "2030-06", "0001-01"] {
            let p = Period::parse(key).unwrap();
            assert_eq!(p.key(), key);
            assert_eq!(Period::parse(&p.key()).unwrap(), p);
        }
    }

    #[test]
    fn test_single_digit_month_is_canonicalized() {
        let p = Period::parse(" 2024-3 ").unwrap();
        assert_eq!(p.key(), "2024-03");
        assert_eq!(p.first_day(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_malformed_periods_are_rejected() {
        for raw in [
            "", "2024", "2024-", "24-01", "2024/01", "2024-01-15", "2024-13", "2024-00",
            "abcd-ef", "+024-01", "2024-001",
        ] {
            assert!(Period::parse(raw).is_err(), "expected '{}' to be rejected", raw);
        }
    }

    #[test]
    fn test_from_date_truncates_to_month() {
        let d = NaiveDate::from_ymd_opt(2023, 11, 27).unwrap();
        let p = Period::from_date(d);
        assert_eq!(p.first_day(), NaiveDate::from_ymd_opt(2023, 11, 1).unwrap());
        assert_eq!(p.year(), 2023);
        assert_eq!(p.month(), 11);
    }

    #[test]
    fn test_ordering_follows_calendar() {
        let a = Period::parse("2023-12").unwrap();
        let b = Period::parse("2024-01").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_serde_uses_key_string() {
        let p = Period::new(2024, 2).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"2024-02\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(serde_json::from_str::<Period>("\"2024-02-01\"").is_err());
    }
}
