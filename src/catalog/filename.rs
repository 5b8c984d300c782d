//! Parsing of CORDEX file names.
//!
//! Files downloaded from ESGF are named
//! `<var>_<domain>_<gcm>_<experiment>_<ensemble>_<rcm>_<version>_<frequency>_<start>-<end>.nc`,
//! where `<start>` and `<end>` are `YYYYMM` for monthly data and
//! `YYYYMMDD` for daily data. Derived files keep the same stem, use a
//! `YYYY-YYYY` span and append a suffix such as `_yearmax` or
//! `_yearmax_ldn`.

use std::{fmt, str::FromStr, sync::OnceLock};

use chrono::NaiveDate;
use regex::Regex;

use crate::errors::CatalogError;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?P<base>.+_)(?P<start>\d{4}(?:\d{2}){0,2})-(?P<end>\d{4}(?:\d{2}){0,2})(?:_(?P<suffix>[^.]+))?\.(?P<ext>[A-Za-z0-9]+)$",
        )
        .expect("file name pattern is valid")
    })
}

/// A point in time at the precision used in a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl Period {
    fn parse(digits: &str) -> Option<Self> {
        let year = digits.get(0..4)?.parse::<i32>().ok()?;
        let month = digits.get(4..6).map(str::parse::<u32>).transpose().ok()?;
        let day = digits.get(6..8).map(str::parse::<u32>).transpose().ok()?;

        NaiveDate::from_ymd_opt(year, month.unwrap_or(1), day.unwrap_or(1))?;

        Some(Period { year, month, day })
    }

    /// Drops the day, keeping year and month.
    pub fn to_monthly(self) -> Self {
        Period { day: None, ..self }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "{:02}", month)?;
        }
        if let Some(day) = self.day {
            write!(f, "{:02}", day)?;
        }

        Ok(())
    }
}

/// The components of a file name that follows the naming scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFileName {
    /// Everything before the time span, including the trailing `_`.
    pub base: String,
    pub start: Period,
    pub end: Period,
    pub suffix: Option<String>,
    pub extension: String,
}

impl DatasetFileName {
    pub fn parse(name: &str) -> Result<Self, CatalogError> {
        let bad = || CatalogError::BadFileName(name.to_string());

        let caps = pattern().captures(name).ok_or_else(bad)?;
        let start_digits = &caps["start"];
        let end_digits = &caps["end"];
        if start_digits.len() != end_digits.len() {
            return Err(bad());
        }

        let start = Period::parse(start_digits).ok_or_else(bad)?;
        let end = Period::parse(end_digits).ok_or_else(bad)?;
        if start > end {
            return Err(bad());
        }

        Ok(DatasetFileName {
            base: caps["base"].to_string(),
            start,
            end,
            suffix: caps.name("suffix").map(|m| m.as_str().to_string()),
            extension: caps["ext"].to_string(),
        })
    }

    pub fn start_year(&self) -> i32 {
        self.start.year
    }

    pub fn end_year(&self) -> i32 {
        self.end.year
    }

    /// True if the suffix is exactly the `_`-separated `parts`.
    pub fn has_suffix(&self, parts: &[&str]) -> bool {
        self.suffix.as_deref() == Some(parts.join("_").as_str())
    }

    /// Same name with `YYYYMMDD` periods shortened to `YYYYMM`.
    pub fn to_monthly(&self) -> Self {
        DatasetFileName {
            start: self.start.to_monthly(),
            end: self.end.to_monthly(),
            ..self.clone()
        }
    }

    pub fn is_daily(&self) -> bool {
        self.start.day.is_some()
    }
}

impl FromStr for DatasetFileName {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetFileName::parse(s)
    }
}

impl fmt::Display for DatasetFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}-{}", self.base, self.start, self.end)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "_{}", suffix)?;
        }
        write!(f, ".{}", self.extension)
    }
}

// -- Tests -------------------------------------------------------------------
