//! Cursor pagination and time-bucket resolution for diary listings.

use std::str::FromStr;

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::{Diary, Id};

/// Page size used by every cursor-paged listing.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Anything listed newest-first by a monotonically increasing id.
pub trait Cursor {
    fn cursor(&self) -> Id;
}

impl Cursor for Diary {
    fn cursor(&self) -> Id {
        self.id
    }
}

/// Next older slice of `items` (already ordered by id descending).
///
/// With no `last_index` the slice starts at the newest item; otherwise only items
/// strictly older than `last_index` qualify. A full page (`len == page_size`) is the
/// caller's signal that another page may follow.
pub fn page_before<T: Cursor>(items: Vec<T>, last_index: Option<Id>, page_size: usize) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| last_index.map_or(true, |last| item.cursor() < last))
        .take(page_size)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Day,
    Week,
    Month,
}

impl TimeUnit {
    pub const ALLOWED: &'static str = "Day, Week, Month";
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Day" => Ok(TimeUnit::Day),
            "Week" => Ok(TimeUnit::Week),
            "Month" => Ok(TimeUnit::Month),
            _ => Err(format!("type must be one of the following values: {}", TimeUnit::ALLOWED)),
        }
    }
}

/// Inclusive UTC window covering whole calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn from_days(start: NaiveDate, end: NaiveDate) -> Self {
        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
        Self {
            start: Utc.from_utc_datetime(&start.and_time(NaiveTime::default())),
            end: Utc.from_utc_datetime(&end.and_time(end_of_day)),
        }
    }

    pub fn last_months(now: DateTime<Utc>, months: u32) -> Self {
        let start = now
            .checked_sub_months(Months::new(months))
            .unwrap_or(now - Duration::days(30 * i64::from(months)));
        Self { start, end: now }
    }

    pub fn as_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }
}

/// Strict `YYYY-MM-DD`; `24-01-01` and friends are rejected.
pub fn parse_day(field: &str, raw: &str) -> Result<NaiveDate, String> {
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(format!("{field} must be a valid date (YYYY-MM-DD)"));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| format!("{field} must be a valid date (YYYY-MM-DD)"))
}

/// How a per-user listing is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Page { last_index: Option<Id> },
    Range(DateRange),
}

/// Resolve the listing strategy from raw query values.
///
/// `Day` pages by cursor and ignores dates; `Week` and `Month` need both dates.
pub fn select(
    unit: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
    last_index: Option<Id>,
) -> Result<Selection, Vec<String>> {
    let unit = match unit {
        Some(raw) => raw.parse::<TimeUnit>().map_err(|e| vec![e])?,
        None => return Err(vec![format!("type must be one of the following values: {}", TimeUnit::ALLOWED)]),
    };
    if unit == TimeUnit::Day {
        return Ok(Selection::Page { last_index });
    }

    let mut errors = Vec::new();
    let start = required_day("startDate", start_date, &mut errors);
    let end = required_day("endDate", end_date, &mut errors);
    match (start, end) {
        (Some(start), Some(end)) if errors.is_empty() => Ok(Selection::Range(DateRange::from_days(start, end))),
        _ => Err(errors),
    }
}

fn required_day(field: &str, raw: Option<&str>, errors: &mut Vec<String>) -> Option<NaiveDate> {
    match raw {
        None | Some("") => {
            errors.push(format!("{field} should not be empty"));
            None
        }
        Some(raw) => parse_day(field, raw).map_err(|e| errors.push(e)).ok(),
    }
}

/// Range for aggregation endpoints: malformed dates fail, a missing bound falls
/// back to the trailing `fallback_months` window ending now.
pub fn range_or_recent(
    start_date: Option<&str>,
    end_date: Option<&str>,
    fallback_months: u32,
    now: DateTime<Utc>,
) -> Result<DateRange, Vec<String>> {
    let mut errors = Vec::new();
    let start = start_date.map(|raw| parse_day("startDate", raw)).transpose().map_err(|e| errors.push(e)).ok().flatten();
    let end = end_date.map(|raw| parse_day("lastDate", raw)).transpose().map_err(|e| errors.push(e)).ok().flatten();
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(match (start, end) {
        (Some(start), Some(end)) => DateRange::from_days(start, end),
        _ => DateRange::last_months(now, fallback_months),
    })
}
