//! Pattern analysis over a user's profile and transactions
//!
//! Everything here is pure: callers fetch data from the store and pass it
//! in together with the reference date. "No data" always yields an empty
//! result, never an error.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::config::RuleSettings;
use crate::error::{Error, Result};
use crate::models::{Profile, Transaction};

/// The date's month/day in `year`. Feb 29 falls back to Feb 28 in common years.
pub fn occurrence_in_year(date: NaiveDate, year: i32) -> NaiveDate {
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(date)
}

/// Days from `today` until the next anniversary of `date` (0 if it is today).
///
/// Always in `0..=365`.
pub fn days_until_next_occurrence(date: NaiveDate, today: NaiveDate) -> i64 {
    let this_year = occurrence_in_year(date, today.year());
    let next = if this_year < today {
        occurrence_in_year(date, today.year() + 1)
    } else {
        this_year
    };
    (next - today).num_days()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialDateKind {
    SpouseBirthday,
    OwnBirthday,
}

/// An upcoming special date inside its alert window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialDate {
    pub kind: SpecialDateKind,
    pub person: Option<String>,
    /// The birth date as stored on the profile
    pub anchor: NaiveDate,
    /// Next occurrence on or after today
    pub next_occurrence: NaiveDate,
    pub days_until: i64,
}

/// Special dates that fall inside their windows.
///
/// Spouse birthdays fire for `0 < days <= spouse_window_days`. The user's
/// own birthday fires only at exactly `self_window_days`.
pub fn scan_special_dates(
    profile: Option<&Profile>,
    today: NaiveDate,
    rules: &RuleSettings,
) -> Vec<SpecialDate> {
    let Some(profile) = profile else {
        return Vec::new();
    };
    let mut found = Vec::new();

    if let Some((name, birth)) = profile.spouse() {
        let days = days_until_next_occurrence(birth, today);
        if days > 0 && days <= rules.spouse_window_days {
            found.push(SpecialDate {
                kind: SpecialDateKind::SpouseBirthday,
                person: Some(name.to_string()),
                anchor: birth,
                next_occurrence: today + Duration::days(days),
                days_until: days,
            });
        }
    }

    if let Some(birth) = profile.birth_date {
        let days = days_until_next_occurrence(birth, today);
        if days == rules.self_window_days {
            found.push(SpecialDate {
                kind: SpecialDateKind::OwnBirthday,
                person: None,
                anchor: birth,
                next_occurrence: today + Duration::days(days),
                days_until: days,
            });
        }
    }

    found
}

/// Occurrence count for one (category, description) pair inside a window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringGroup {
    pub category: String,
    pub description: String,
    pub count: u32,
    pub last_date: NaiveDate,
}

/// A recurring group with its estimated interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recurrence {
    pub category: String,
    pub description: String,
    pub count: u32,
    /// `window_days / count`
    pub average_interval_days: f64,
    pub days_since_last: i64,
    pub due: bool,
}

/// Estimate intervals for recurring groups and flag the ones that look due.
///
/// The interval is `window_days / count`, a crude frequency estimate: it
/// overfires for bursty purchases and underfires for irregular ones.
/// Groups below `min_occurrences` are skipped. Order follows the input.
pub fn scan_recurrences(
    groups: &[RecurringGroup],
    today: NaiveDate,
    rules: &RuleSettings,
) -> Vec<Recurrence> {
    groups
        .iter()
        .filter(|g| g.count >= rules.min_occurrences && g.count > 0)
        .map(|g| {
            let average = rules.recurrence_window_days as f64 / g.count as f64;
            let days_since_last = (today - g.last_date).num_days();
            Recurrence {
                category: g.category.clone(),
                description: g.description.clone(),
                count: g.count,
                average_interval_days: average,
                days_since_last,
                due: days_since_last as f64 >= average - rules.due_slack_days,
            }
        })
        .collect()
}

/// A place the user keeps returning to around a special date
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoOccurrence {
    pub description: String,
    /// Matching transactions across all examined years
    pub count: usize,
    /// Distinct years it appeared in
    pub years: usize,
}

/// Most frequent `co_occurrence_category` description within
/// ±`co_occurrence_window_days` of `anchor`'s month/day, over the previous
/// `co_occurrence_years` years (the current year excluded).
///
/// Returns `None` unless the winner appears in at least
/// `co_occurrence_min_years` distinct years. Ties on count go to the
/// alphabetically first description.
pub fn find_co_occurrence(
    transactions: &[Transaction],
    anchor: NaiveDate,
    today: NaiveDate,
    rules: &RuleSettings,
) -> Option<CoOccurrence> {
    let category = rules.co_occurrence_category.to_lowercase();
    let window = Duration::days(rules.co_occurrence_window_days);
    let mut seen: HashMap<&str, (usize, BTreeSet<i32>)> = HashMap::new();

    for year in (today.year() - rules.co_occurrence_years)..today.year() {
        let center = occurrence_in_year(anchor, year);
        let (start, end) = (center - window, center + window);

        for tx in transactions {
            let day = tx.date.date();
            if day < start || day > end || tx.category.to_lowercase() != category {
                continue;
            }
            if tx.description.trim().is_empty() {
                continue;
            }
            let entry = seen.entry(tx.description.as_str()).or_default();
            entry.0 += 1;
            entry.1.insert(year);
        }
    }

    let (description, (count, years)) = seen
        .into_iter()
        .max_by(|(da, (ca, _)), (db, (cb, _))| ca.cmp(cb).then_with(|| db.cmp(da)))?;

    if years.len() < rules.co_occurrence_min_years {
        return None;
    }

    Some(CoOccurrence {
        description: description.to_string(),
        count,
        years: years.len(),
    })
}

/// "Has the user bought this kind of thing before?" signal
#[derive(Debug, Clone)]
pub struct Affinity {
    pub category: String,
    keywords: Regex,
}

impl Affinity {
    pub fn new(category: &str, keyword_pattern: &str) -> Result<Self> {
        let keywords = Regex::new(keyword_pattern)
            .map_err(|e| Error::InvalidData(format!("bad affinity pattern: {}", e)))?;
        Ok(Self {
            category: category.to_lowercase(),
            keywords,
        })
    }

    /// Flower purchases: the `flowers` category or "flor"/"flower" in the description
    pub fn flowers() -> Result<Self> {
        Self::new("flowers", r"(?i)flor|flower")
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        tx.category.to_lowercase() == self.category || self.keywords.is_match(&tx.description)
    }

    /// At least `min_count` matching transactions
    pub fn holds(&self, transactions: &[Transaction], min_count: usize) -> bool {
        transactions.iter().filter(|tx| self.matches(tx)).count() >= min_count
    }
}
