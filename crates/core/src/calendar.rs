//! Per-date aggregates for the calendar heat map and the completion chart.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use url::Url;

use crate::model::{Problem, ProblemId, SlotIndex};
use crate::scheduler;
use crate::time::{self, DateError};

/// An open review of one problem on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReview {
    pub problem_id: ProblemId,
    pub name: String,
    pub link: Option<Url>,
    pub slot: SlotIndex,
}

/// Heat-map intensity for a day's number of open reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeatLevel {
    None,
    Light,
    Medium,
    Heavy,
}

impl HeatLevel {
    #[must_use]
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => HeatLevel::None,
            1..=4 => HeatLevel::Light,
            5..=9 => HeatLevel::Medium,
            _ => HeatLevel::Heavy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub pending: usize,
    pub heat: HeatLevel,
    pub is_today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

impl MonthView {
    #[must_use]
    pub fn total_pending(&self) -> usize {
        self.days.iter().map(|d| d.pending).sum()
    }
}

/// Every open review grouped by its due date.
#[must_use]
pub fn pending_by_date(problems: &[Problem]) -> BTreeMap<NaiveDate, Vec<PendingReview>> {
    let mut map: BTreeMap<NaiveDate, Vec<PendingReview>> = BTreeMap::new();
    for problem in problems {
        for slot in problem.schedule().iter().filter(|s| !s.done) {
            map.entry(slot.due_date).or_default().push(PendingReview {
                problem_id: problem.id().clone(),
                name: problem.name().to_owned(),
                link: problem.link().cloned(),
                slot: slot.index,
            });
        }
    }
    map
}

/// Open reviews due on exactly `date`, in problem order then slot order.
#[must_use]
pub fn reviews_on(problems: &[Problem], date: NaiveDate) -> Vec<PendingReview> {
    pending_by_date(problems).remove(&date).unwrap_or_default()
}

/// One entry per day of `year`-`month` with its open-review count.
///
/// # Errors
///
/// Returns `DateError::InvalidMonth` if the month does not exist or lies
/// outside years 0000..=9999.
pub fn month_view(
    problems: &[Problem],
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Result<MonthView, DateError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .filter(|first| time::in_range(*first))
        .ok_or(DateError::InvalidMonth { year, month })?;
    let next = first
        .checked_add_months(Months::new(1))
        .ok_or(DateError::InvalidMonth { year, month })?;

    let pending = pending_by_date(problems);
    let days = first
        .iter_days()
        .take_while(|d| *d < next)
        .map(|date| {
            let count = pending.get(&date).map_or(0, Vec::len);
            CalendarDay {
                date,
                pending: count,
                heat: HeatLevel::from_count(count),
                is_today: date == today,
            }
        })
        .collect();

    Ok(MonthView { year, month, days })
}

/// Month containing `date` shifted by `delta` months (for prev/next navigation).
#[must_use]
pub fn shift_month(date: NaiveDate, delta: i32) -> (i32, u32) {
    let first = date.with_day(1).unwrap_or(date);
    let shifted = if delta >= 0 {
        first.checked_add_months(Months::new(delta.unsigned_abs()))
    } else {
        first.checked_sub_months(Months::new(delta.unsigned_abs()))
    }
    .unwrap_or(first);
    (shifted.year(), shifted.month())
}

/// Number of completed reviews per slot date, oldest first.
///
/// With flip toggles the slot date of a completed review is its completion
/// day; with complete-only toggles it is the scheduled day.
#[must_use]
pub fn completions_by_date(problems: &[Problem]) -> Vec<(NaiveDate, usize)> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for slot in problems.iter().flat_map(|p| p.schedule().iter()) {
        if slot.done {
            *counts.entry(slot.due_date).or_default() += 1;
        }
    }
    counts.into_iter().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReviewStats {
    pub problems: usize,
    pub total_reviews: usize,
    pub completed_reviews: usize,
    pub due_today: usize,
    pub fully_reviewed: usize,
}

#[must_use]
pub fn stats(problems: &[Problem], today: NaiveDate) -> ReviewStats {
    ReviewStats {
        problems: problems.len(),
        total_reviews: problems.len() * SlotIndex::COUNT,
        completed_reviews: problems.iter().map(|p| p.schedule().completed_count()).sum(),
        due_today: scheduler::due_today(problems, today).len(),
        fully_reviewed: problems.iter().filter(|p| p.schedule().is_complete()).count(),
    }
}
