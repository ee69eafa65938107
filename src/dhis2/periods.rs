//! DHIS2 period identifiers and inclusive period ranges.

use std::fmt;
use std::str::FromStr;
use time::macros::format_description;
use time::{Date, Duration, Month, Weekday};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("invalid period: {0}")]
    Invalid(String),
    #[error("period range mixes period types: {start} and {end}")]
    MismatchedTypes { start: String, end: String },
    #[error("period range ends before it starts: {start} to {end}")]
    Reversed { start: String, end: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Period {
    Day(Date),
    /// ISO week of an ISO week-year.
    Week { year: i32, week: u8 },
    Month { year: i32, month: u8 },
    BiMonth { year: i32, bimonth: u8 },
    Quarter { year: i32, quarter: u8 },
    SixMonth { year: i32, half: u8 },
    Year(i32),
}

impl Period {
    fn same_type(&self, other: &Period) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// The period directly following this one.
    pub fn next(self) -> Option<Period> {
        Some(match self {
            Period::Day(d) => Period::Day(d.next_day()?),
            Period::Week { year, week } => {
                let monday = Date::from_iso_week_date(year, week, Weekday::Monday).ok()?;
                let (year, week, _) = monday.checked_add(Duration::weeks(1))?.to_iso_week_date();
                Period::Week { year, week }
            }
            Period::Month { year, month } => step(year, month, 12, |year, month| Period::Month { year, month }),
            Period::BiMonth { year, bimonth } => {
                step(year, bimonth, 6, |year, bimonth| Period::BiMonth { year, bimonth })
            }
            Period::Quarter { year, quarter } => {
                step(year, quarter, 4, |year, quarter| Period::Quarter { year, quarter })
            }
            Period::SixMonth { year, half } => step(year, half, 2, |year, half| Period::SixMonth { year, half }),
            Period::Year(y) => Period::Year(y.checked_add(1)?),
        })
    }

    /// Every period from `self` to `end`, both included.
    pub fn range(self, end: Period) -> Result<Vec<Period>, PeriodError> {
        if !self.same_type(&end) {
            return Err(PeriodError::MismatchedTypes {
                start: self.to_string(),
                end: end.to_string(),
            });
        }
        if end < self {
            return Err(PeriodError::Reversed {
                start: self.to_string(),
                end: end.to_string(),
            });
        }

        let mut out = vec![self];
        let mut cur = self;
        while cur != end {
            cur = cur
                .next()
                .ok_or_else(|| PeriodError::Invalid(cur.to_string()))?;
            out.push(cur);
        }
        Ok(out)
    }
}

fn step(year: i32, index: u8, per_year: u8, make: impl Fn(i32, u8) -> Period) -> Period {
    if index >= per_year {
        make(year + 1, 1)
    } else {
        make(year, index + 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Day(d) => write!(f, "{:04}{:02}{:02}", d.year(), u8::from(d.month()), d.day()),
            Period::Week { year, week } => write!(f, "{year}W{week}"),
            Period::Month { year, month } => write!(f, "{year}{month:02}"),
            Period::BiMonth { year, bimonth } => write!(f, "{year}{bimonth:02}B"),
            Period::Quarter { year, quarter } => write!(f, "{year}Q{quarter}"),
            Period::SixMonth { year, half } => write!(f, "{year}S{half}"),
            Period::Year(y) => write!(f, "{y}"),
        }
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PeriodError::Invalid(s.to_string());
        let s = s.trim();
        if s.len() < 4 || !s.is_ascii() {
            return Err(invalid());
        }
        let (year, rest) = s.split_at(4);
        let year: i32 = parse_digits(year).ok_or_else(invalid)?;

        let p = if rest.is_empty() {
            Period::Year(year)
        } else if let Some(w) = rest.strip_prefix('W') {
            let week: u8 = parse_digits(w).ok_or_else(invalid)?;
            Date::from_iso_week_date(year, week, Weekday::Monday).map_err(|_| invalid())?;
            Period::Week { year, week }
        } else if let Some(q) = rest.strip_prefix('Q') {
            let quarter = parse_digits(q).filter(|q| (1..=4).contains(q)).ok_or_else(invalid)?;
            Period::Quarter { year, quarter }
        } else if let Some(h) = rest.strip_prefix('S') {
            let half = parse_digits(h).filter(|h| (1..=2).contains(h)).ok_or_else(invalid)?;
            Period::SixMonth { year, half }
        } else if let Some(b) = rest.strip_suffix('B') {
            if b.len() != 2 {
                return Err(invalid());
            }
            let bimonth = parse_digits(b).filter(|b| (1..=6).contains(b)).ok_or_else(invalid)?;
            Period::BiMonth { year, bimonth }
        } else if rest.len() == 2 {
            let month: u8 = parse_digits(rest).ok_or_else(invalid)?;
            Month::try_from(month).map_err(|_| invalid())?;
            Period::Month { year, month }
        } else if rest.len() == 4 {
            let date = Date::parse(s, format_description!("[year][month][day]")).map_err(|_| invalid())?;
            Period::Day(date)
        } else {
            return Err(invalid());
        };
        Ok(p)
    }
}

fn parse_digits<T: FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Expand a start/end pair of period identifiers into identifiers.
pub fn period_range(start: &str, end: &str) -> Result<Vec<String>, PeriodError> {
    let start: Period = start.parse()?;
    let end: Period = end.parse()?;
    Ok(start.range(end)?.iter().map(Period::to_string).collect())
}
