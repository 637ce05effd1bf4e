use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PeriodError {
    #[error("expected a 6-digit year-month code, got '{0}'")]
    Malformed(String),
    #[error("month out of range in '{0}'")]
    InvalidMonth(String),
}

/// A calendar year-month bucket, written as a 6-digit `YYYYMM` code.
///
/// The derived ordering compares year then month, which is the same order as
/// comparing the zero-padded codes as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: u16,
    month: u8,
}

impl Period {
    pub fn new(year: u16, month: u8) -> Result<Self, PeriodError> {
        let period = Self { year, month };
        if year > 9999 || !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(period.code()));
        }
        Ok(period)
    }

    pub fn parse(raw: &str) -> Result<Self, PeriodError> {
        static CODE_RE: OnceLock<Regex> = OnceLock::new();
        let re = CODE_RE.get_or_init(|| Regex::new(r"^(\d{4})(\d{2})$").unwrap());

        let trimmed = raw.trim();
        let caps = re
            .captures(trimmed)
            .ok_or_else(|| PeriodError::Malformed(raw.to_string()))?;
        let year: u16 = caps[1]
            .parse()
            .map_err(|_| PeriodError::Malformed(raw.to_string()))?;
        let month: u8 = caps[2]
            .parse()
            .map_err(|_| PeriodError::Malformed(raw.to_string()))?;
        if !(1..=12).contains(&month) {
            return Err(PeriodError::InvalidMonth(trimmed.to_string()));
        }
        Ok(Self { year, month })
    }

    /// Accepts the code as a JSON string or as a JSON integer such as `202403`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, PeriodError> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Number(n) => match (n.as_u64(), n.as_f64()) {
                (Some(code), _) => Self::parse(&code.to_string()),
                (None, Some(f)) if f.fract() == 0.0 && f >= 0.0 => {
                    Self::parse(&format!("{:.0}", f))
                }
                _ => Err(PeriodError::Malformed(n.to_string())),
            },
            other => Err(PeriodError::Malformed(other.to_string())),
        }
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn code(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(i32::from(self.year), u32::from(self.month), 1)
    }

    /// Human-readable label, e.g. `Mar 2024`.
    pub fn label(&self) -> String {
        self.first_day()
            .map(|d| d.format("%b %Y").to_string())
            .unwrap_or_else(|| self.code())
    }

    /// Sort key taken from the calendar date rather than the code text.
    pub fn chronological_key(&self) -> (i32, u32) {
        self.first_day()
            .map(|d| (d.year(), d.month0()))
            .unwrap_or((i32::from(self.year), u32::from(self.month) - 1))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Period::parse(&s)
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.code()
    }
}

impl std::str::FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::parse(s)
    }
}
