//! Filter criteria: keyword set plus an optional inclusive date range.
//!
//! Keywords come from a comma-separated string (`"invoice, receipt"`).
//! Date bounds accept `YYYY-MM-DD`, `DD/MM/YYYY`, `YYYY-MM` and `YYYY`;
//! partial dates expand to the first day of the period for the lower bound
//! and to the last day for the upper bound.

use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::model::message::Message;

/// Which messages qualify for processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FilterCriteria {
    /// Lower-cased keywords, OR-matched against the subject.
    pub keywords: Vec<String>,

    /// Inclusive lower bound on the received date.
    pub date_from: Option<NaiveDate>,

    /// Inclusive upper bound on the received date.
    pub date_to: Option<NaiveDate>,

    /// Skip messages already marked as read.
    #[serde(default)]
    pub unread_only: bool,
}

impl FilterCriteria {
    /// Build criteria from keywords and already-parsed bounds.
    ///
    /// Keywords are trimmed and lower-cased; empty ones are dropped.
    pub fn new<I, S>(keywords: I, date_from: Option<NaiveDate>, date_to: Option<NaiveDate>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !normalized.contains(&keyword) {
                normalized.push(keyword);
            }
        }
        Self {
            keywords: normalized,
            date_from,
            date_to,
            unread_only: false,
        }
    }

    /// Restrict the selection to unread messages.
    pub fn with_unread_only(mut self, unread_only: bool) -> Self {
        self.unread_only = unread_only;
        self
    }

    /// Parse criteria from user input.
    ///
    /// A bound that is empty or cannot be parsed is logged and treated as
    /// unbounded on that side.
    pub fn parse(keywords: &str, date_from: Option<&str>, date_to: Option<&str>) -> Self {
        let from = date_from.and_then(|s| parse_bound(s, Bound::Start));
        let to = date_to.and_then(|s| parse_bound(s, Bound::End));
        Self::new(keywords.split(','), from, to)
    }

    /// True if the subject contains at least one keyword (case-insensitive).
    ///
    /// An empty keyword set matches nothing.
    pub fn matches_keywords(&self, subject: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let subject = subject.to_lowercase();
        self.keywords.iter().any(|k| subject.contains(k.as_str()))
    }

    /// True if `date` lies within the (inclusive) range. Missing bounds are open.
    pub fn matches_date(&self, date: NaiveDate) -> bool {
        self.date_from.is_none_or(|from| date >= from) && self.date_to.is_none_or(|to| date <= to)
    }

    /// Full qualification predicate.
    pub fn matches(&self, message: &Message) -> bool {
        (!self.unread_only || message.unread)
            && self.matches_keywords(&message.subject)
            && self.matches_date(message.received.date_naive())
    }

    pub fn has_date_range(&self) -> bool {
        self.date_from.is_some() || self.date_to.is_some()
    }
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_bound(raw: &str, bound: Bound) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let parsed = match bound {
        Bound::Start => parse_flexible_date_start(raw),
        Bound::End => parse_flexible_date_end(raw),
    };
    if parsed.is_none() {
        warn!(value = raw, "ignoring unparsable date bound");
    }
    parsed
}

/// Parse a full date: `2024-01-04` or `04/01/2024`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}

/// Parse a flexible date, returning the first day of the period.
fn parse_flexible_date_start(s: &str) -> Option<NaiveDate> {
    if let Some(d) = parse_date(s) {
        return Some(d);
    }
    let (year, month) = parse_partial(s)?;
    NaiveDate::from_ymd_opt(year, month.unwrap_or(1), 1)
}

/// Parse a flexible date, returning the last day of the period.
fn parse_flexible_date_end(s: &str) -> Option<NaiveDate> {
    if let Some(d) = parse_date(s) {
        return Some(d);
    }
    match parse_partial(s)? {
        (year, Some(month)) => {
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            let next = first.checked_add_months(chrono::Months::new(1))?;
            next.pred_opt()
        }
        (year, None) => NaiveDate::from_ymd_opt(year, 12, 31),
    }
}

/// `YYYY-MM` or `YYYY`.
fn parse_partial(s: &str) -> Option<(i32, Option<u32>)> {
    let parts: Vec<&str> = s.split('-').collect();
    match parts.as_slice() {
        [year, month] if year.len() == 4 => {
            let month: u32 = month.parse().ok()?;
            (1..=12)
                .contains(&month)
                .then_some((year.parse().ok()?, Some(month)))
        }
        [year] if year.len() == 4 => {
            let year: i32 = year.parse().ok()?;
            NaiveDate::from_ymd_opt(year, 1, 1).map(|d| (d.year(), None))
        }
        _ => None,
    }
}
