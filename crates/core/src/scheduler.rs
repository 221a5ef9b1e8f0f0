use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use thiserror::Error;

use crate::model::{Problem, ProblemId, ReviewSchedule, SlotIndex};
use crate::time::{DateError, add_days, format_date, parse_date};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchedulerError {
    #[error("problem {0} not found")]
    NotFound(ProblemId),
    #[error(transparent)]
    InvalidDate(#[from] DateError),
    #[error("unknown toggle mode: {0:?} (expected complete-only or flip)")]
    UnknownToggleMode(String),
    #[error("unknown sort key: {0:?} (expected solved, difficulty or id)")]
    UnknownSortKey(String),
}

//
// ─── REVIEW DATES ──────────────────────────────────────────────────────────────
//

/// Gap in days between consecutive reviews, starting from the solved date.
///
/// Cumulative offsets from the solved date are 1, 3, 7, 14 and 28 days.
pub const REVIEW_STEPS: [u64; SlotIndex::COUNT] = [1, 2, 4, 7, 14];

/// Computes the five review due dates for a problem solved on `solved`.
///
/// Pure: the result depends only on `solved`.
///
/// # Errors
///
/// Returns `DateError::OutOfRange` if a review would fall after 9999-12-31.
///
/// # Examples
///
/// ```
/// # use tracker_core::scheduler::compute_review_dates;
/// # use chrono::NaiveDate;
/// let solved = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let dates = compute_review_dates(solved).unwrap();
/// assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
/// assert_eq!(dates[4], NaiveDate::from_ymd_opt(2024, 1, 29).unwrap());
/// ```
pub fn compute_review_dates(
    solved: NaiveDate,
) -> Result<[NaiveDate; SlotIndex::COUNT], DateError> {
    let mut dates = [solved; SlotIndex::COUNT];
    let mut current = solved;
    for (date, step) in dates.iter_mut().zip(REVIEW_STEPS) {
        current = add_days(current, step)?;
        *date = current;
    }
    Ok(dates)
}

/// String form of [`compute_review_dates`]: `YYYY-MM-DD` in, `YYYY-MM-DD` out.
///
/// # Errors
///
/// Returns `SchedulerError::InvalidDate` if `solved` is not a calendar date
/// or its reviews leave the four-digit year range.
pub fn compute_review_dates_str(solved: &str) -> Result<[String; SlotIndex::COUNT], SchedulerError> {
    let solved = parse_date(solved)?;
    Ok(compute_review_dates(solved)?.map(format_date))
}

/// Fresh, fully open schedule for a problem solved on `solved`.
///
/// # Errors
///
/// Same as [`compute_review_dates`].
pub fn new_schedule(solved: NaiveDate) -> Result<ReviewSchedule, DateError> {
    compute_review_dates(solved).map(ReviewSchedule::from_dates)
}

//
// ─── CLASSIFICATION ────────────────────────────────────────────────────────────
//

/// True if any slot is open and due on or before `today`.
///
/// Overdue reviews count as due today; there is no separate overdue bucket.
#[must_use]
pub fn is_due(problem: &Problem, today: NaiveDate) -> bool {
    problem.schedule().iter().any(|slot| slot.is_due(today))
}

/// Problems with at least one due review, in source order.
pub fn due_today<'a>(
    problems: impl IntoIterator<Item = &'a Problem>,
    today: NaiveDate,
) -> Vec<&'a Problem> {
    problems.into_iter().filter(|p| is_due(p, today)).collect()
}

/// The Sunday..=Saturday week containing `today`, clamped to the dates
/// chrono can represent.
#[must_use]
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let back = Days::new(u64::from(today.weekday().num_days_from_sunday()));
    let sunday = today.checked_sub_days(back).unwrap_or(NaiveDate::MIN);
    let saturday = sunday.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);
    (sunday, saturday)
}

/// Problems **solved** during the week containing `today`, in source order.
///
/// Keyed off the solved date, not off any review due date.
pub fn due_this_week<'a>(
    problems: impl IntoIterator<Item = &'a Problem>,
    today: NaiveDate,
) -> Vec<&'a Problem> {
    let (start, end) = week_bounds(today);
    problems
        .into_iter()
        .filter(|p| (start..=end).contains(&p.solved_date()))
        .collect()
}

//
// ─── SORT & FILTER ─────────────────────────────────────────────────────────────
//

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SortKey {
    /// Oldest solved first.
    #[default]
    SolvedDate,
    /// Lexicographic by difficulty label; problems without one go last.
    Difficulty,
    /// Numeric ids by value, then textual ids.
    Identifier,
}

impl SortKey {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::SolvedDate => "solved",
            SortKey::Difficulty => "difficulty",
            SortKey::Identifier => "id",
        }
    }

    fn compare(self, a: &Problem, b: &Problem) -> Ordering {
        match self {
            SortKey::SolvedDate => a.solved_date().cmp(&b.solved_date()),
            SortKey::Difficulty => match (a.difficulty(), b.difficulty()) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortKey::Identifier => a.id().cmp(b.id()),
        }
    }
}

impl FromStr for SortKey {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solved" | "solved_date" | "date" => Ok(SortKey::SolvedDate),
            "difficulty" => Ok(SortKey::Difficulty),
            "id" | "identifier" => Ok(SortKey::Identifier),
            _ => Err(SchedulerError::UnknownSortKey(s.to_owned())),
        }
    }
}

/// Stable sort: problems comparing equal keep their input order.
pub fn sort_problems<'a>(
    problems: impl IntoIterator<Item = &'a Problem>,
    key: SortKey,
) -> Vec<&'a Problem> {
    let mut out: Vec<&Problem> = problems.into_iter().collect();
    out.sort_by(|a, b| key.compare(a, b));
    out
}

/// Case-insensitive substring match on the name. An empty query matches all.
pub fn filter_by_name<'a>(
    problems: impl IntoIterator<Item = &'a Problem>,
    query: &str,
) -> Vec<&'a Problem> {
    let needle = query.to_lowercase();
    problems
        .into_iter()
        .filter(|p| needle.is_empty() || p.name().to_lowercase().contains(&needle))
        .collect()
}

//
// ─── STATE TRANSITIONS ─────────────────────────────────────────────────────────
//

/// How a user toggle on a review slot behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToggleMode {
    /// Marks the slot done; a done slot stays done.
    #[default]
    CompleteOnly,
    /// Negates `done`. Completing records today as the slot date; reopening
    /// leaves the date as it is.
    Flip,
}

impl ToggleMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ToggleMode::CompleteOnly => "complete-only",
            ToggleMode::Flip => "flip",
        }
    }
}

impl fmt::Display for ToggleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToggleMode {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "complete-only" | "complete_only" | "complete" => Ok(ToggleMode::CompleteOnly),
            "flip" => Ok(ToggleMode::Flip),
            _ => Err(SchedulerError::UnknownToggleMode(s.to_owned())),
        }
    }
}

/// Toggle semantics plus whether missed reviews roll forward on load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulePolicy {
    pub toggle: ToggleMode,
    pub sweep_on_load: bool,
}

impl SchedulePolicy {
    /// Hosted-database behavior: complete-only toggles, dates never rewritten.
    #[must_use]
    pub fn backend() -> Self {
        Self {
            toggle: ToggleMode::CompleteOnly,
            sweep_on_load: false,
        }
    }

    /// Local-storage behavior: flip toggles, missed reviews swept to today.
    #[must_use]
    pub fn local() -> Self {
        Self {
            toggle: ToggleMode::Flip,
            sweep_on_load: true,
        }
    }

    #[must_use]
    pub fn for_toggle(toggle: ToggleMode) -> Self {
        match toggle {
            ToggleMode::CompleteOnly => Self::backend(),
            ToggleMode::Flip => Self::local(),
        }
    }
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self::backend()
    }
}

/// Applies review state transitions under a `SchedulePolicy`.
///
/// # Examples
///
/// ```
/// # use tracker_core::model::{ProblemDraft, SlotIndex};
/// # use tracker_core::scheduler::{ReviewScheduler, SchedulePolicy};
/// # use tracker_core::time::fixed_today;
/// let mut problem = ProblemDraft::new("1000", "A+B").validate(fixed_today())?;
/// let scheduler = ReviewScheduler::new(SchedulePolicy::backend());
///
/// let done = scheduler.toggle_slot(&mut problem, SlotIndex::FIRST, fixed_today());
/// assert!(done);
/// # Ok::<(), tracker_core::model::ProblemError>(())
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ReviewScheduler {
    policy: SchedulePolicy,
}

impl ReviewScheduler {
    #[must_use]
    pub fn new(policy: SchedulePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    /// Toggle one slot and return its new `done` state.
    pub fn toggle_slot(&self, problem: &mut Problem, slot: SlotIndex, today: NaiveDate) -> bool {
        let target = problem.schedule_mut().slot_mut(slot);
        match self.policy.toggle {
            ToggleMode::CompleteOnly => target.done = true,
            ToggleMode::Flip => {
                target.done = !target.done;
                if target.done {
                    target.due_date = today;
                }
            }
        }
        target.done
    }

    /// Toggle a slot of the problem with `id` inside `problems`.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotFound` if no problem has that id; the
    /// list is left unchanged.
    pub fn toggle_in(
        &self,
        problems: &mut [Problem],
        id: &ProblemId,
        slot: SlotIndex,
        today: NaiveDate,
    ) -> Result<bool, SchedulerError> {
        let problem = problems
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or_else(|| SchedulerError::NotFound(id.clone()))?;
        Ok(self.toggle_slot(problem, slot, today))
    }

    /// Runs [`sweep_missed_reviews`] if the policy asks for it.
    pub fn sweep_on_load(&self, problems: &mut [Problem], today: NaiveDate) -> Vec<ProblemId> {
        if self.policy.sweep_on_load {
            sweep_missed_reviews(problems, today)
        } else {
            Vec::new()
        }
    }
}

/// Rolls every open slot dated before `today` forward to `today`.
///
/// Returns the ids of problems that changed. Running it again with the same
/// `today` changes nothing.
pub fn sweep_missed_reviews(problems: &mut [Problem], today: NaiveDate) -> Vec<ProblemId> {
    let mut changed = Vec::new();
    for problem in problems.iter_mut() {
        let mut touched = false;
        for slot in problem.schedule_mut().iter_mut() {
            if slot.is_missed(today) {
                slot.due_date = today;
                touched = true;
            }
        }
        if touched {
            changed.push(problem.id().clone());
        }
    }
    changed
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProblemDraft, ProblemError};

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn problem(id: &str, name: &str, solved: &str) -> Problem {
        ProblemDraft::new(id, name)
            .solved_on(solved)
            .validate(d(solved))
            .unwrap()
    }

    fn slot(n: u8) -> SlotIndex {
        SlotIndex::new(n).unwrap()
    }

    #[test]
    fn review_dates_match_known_example() {
        let dates = compute_review_dates_str("2024-01-01").unwrap();
        assert_eq!(
            dates,
            ["2024-01-02", "2024-01-04", "2024-01-08", "2024-01-15", "2024-01-29"]
        );
    }

    #[test]
    fn review_dates_cross_month_and_leap_day() {
        let dates = compute_review_dates_str("2024-02-27").unwrap();
        assert_eq!(
            dates,
            ["2024-02-28", "2024-03-01", "2024-03-05", "2024-03-12", "2024-03-26"]
        );
    }

    #[test]
    fn review_dates_reject_unparseable_input() {
        assert!(matches!(
            compute_review_dates_str("01/02/2024"),
            Err(SchedulerError::InvalidDate(_))
        ));
    }

    #[test]
    fn review_dates_stay_within_four_digit_years() {
        assert!(matches!(
            compute_review_dates_str("9999-12-31"),
            Err(SchedulerError::InvalidDate(DateError::OutOfRange { .. }))
        ));
        assert!(matches!(
            compute_review_dates_str("+262142-12-20"),
            Err(SchedulerError::InvalidDate(DateError::InvalidDate { .. }))
        ));
        assert!(compute_review_dates(NaiveDate::MAX).is_err());
        let dates = compute_review_dates_str("9999-12-03").unwrap();
        assert_eq!(dates[4], "9999-12-31");
    }

    #[test]
    fn late_solved_date_is_rejected_by_the_form() {
        let err = ProblemDraft::new("1", "x")
            .solved_on("9999-12-31")
            .validate(d("2024-06-12"))
            .unwrap_err();
        assert!(matches!(err, ProblemError::InvalidDate(DateError::OutOfRange { .. })));
        assert!(
            ProblemDraft::new("1", "x")
                .solved_on("+262142-12-20")
                .validate(d("2024-06-12"))
                .is_err()
        );
    }

    #[test]
    fn week_bounds_clamp_at_the_calendar_edges() {
        let (start, end) = week_bounds(NaiveDate::MAX);
        assert!(start <= NaiveDate::MAX && end == NaiveDate::MAX);
        let (start, _) = week_bounds(NaiveDate::MIN);
        assert_eq!(start, NaiveDate::MIN);
    }

    #[test]
    fn due_today_includes_overdue_and_skips_future() {
        let today = d("2024-06-12");
        let overdue = problem("1", "overdue", "2024-06-01");
        let due_now = problem("2", "due now", "2024-06-11");
        let future = problem("3", "future", "2024-06-12");
        let list = vec![overdue, due_now, future];

        let due: Vec<_> = due_today(&list, today)
            .into_iter()
            .map(|p| p.id().as_str())
            .collect();
        assert_eq!(due, ["1", "2"]);
    }

    #[test]
    fn fully_done_problem_is_never_due() {
        let scheduler = ReviewScheduler::new(SchedulePolicy::backend());
        let mut p = problem("1", "done", "2020-01-01");
        for s in SlotIndex::all() {
            scheduler.toggle_slot(&mut p, s, d("2020-01-01"));
        }
        assert!(!is_due(&p, d("2030-01-01")));
    }

    #[test]
    fn week_bounds_run_sunday_to_saturday() {
        assert_eq!(
            week_bounds(d("2024-06-12")),
            (d("2024-06-09"), d("2024-06-15"))
        );
        assert_eq!(
            week_bounds(d("2024-06-09")),
            (d("2024-06-09"), d("2024-06-15"))
        );
        assert_eq!(
            week_bounds(d("2024-06-15")),
            (d("2024-06-09"), d("2024-06-15"))
        );
    }

    #[test]
    fn this_week_is_keyed_off_solved_date() {
        let list = vec![
            problem("a", "saturday before", "2024-06-08"),
            problem("b", "sunday", "2024-06-09"),
            problem("c", "saturday", "2024-06-15"),
            problem("d", "next sunday", "2024-06-16"),
        ];
        let week: Vec<_> = due_this_week(&list, d("2024-06-12"))
            .into_iter()
            .map(|p| p.id().as_str())
            .collect();
        assert_eq!(week, ["b", "c"]);
    }

    #[test]
    fn complete_only_toggle_never_reopens() {
        let scheduler = ReviewScheduler::new(SchedulePolicy::backend());
        let mut p = problem("1", "x", "2024-06-01");
        let original = p.slot(slot(2)).due_date;

        assert!(scheduler.toggle_slot(&mut p, slot(2), d("2024-06-12")));
        assert!(scheduler.toggle_slot(&mut p, slot(2), d("2024-06-12")));
        assert!(p.slot(slot(2)).done);
        assert_eq!(p.slot(slot(2)).due_date, original);
    }

    #[test]
    fn flip_toggle_stamps_completion_date_and_keeps_it_on_reopen() {
        let scheduler = ReviewScheduler::new(SchedulePolicy::local());
        let mut p = problem("1", "x", "2024-06-01");
        let today = d("2024-06-12");

        assert!(scheduler.toggle_slot(&mut p, slot(3), today));
        assert_eq!(p.slot(slot(3)).due_date, today);

        assert!(!scheduler.toggle_slot(&mut p, slot(3), d("2024-06-20")));
        assert!(!p.slot(slot(3)).done);
        assert_eq!(p.slot(slot(3)).due_date, today);
    }

    #[test]
    fn slots_complete_in_any_order() {
        let scheduler = ReviewScheduler::default();
        let mut p = problem("1", "x", "2024-06-01");
        scheduler.toggle_slot(&mut p, slot(5), d("2024-06-02"));
        assert!(p.slot(slot(5)).done);
        assert!(!p.slot(slot(1)).done);
    }

    #[test]
    fn toggle_in_reports_missing_problem() {
        let scheduler = ReviewScheduler::default();
        let mut list = vec![problem("1", "x", "2024-06-01")];
        let before = list.clone();
        let missing = ProblemId::new("404").unwrap();

        let err = scheduler
            .toggle_in(&mut list, &missing, slot(1), d("2024-06-12"))
            .unwrap_err();
        assert_eq!(err, SchedulerError::NotFound(missing));
        assert_eq!(list, before);
    }

    #[test]
    fn sweep_rolls_missed_reviews_forward_and_is_idempotent() {
        let today = d("2024-06-12");
        let mut list = vec![
            problem("1", "old", "2024-06-01"),
            problem("2", "fresh", "2024-06-12"),
        ];
        let changed = sweep_missed_reviews(&mut list, today);
        assert_eq!(changed, [ProblemId::new("1").unwrap()]);

        // 06-02, 06-04, 06-08 were missed; 06-15 and 06-29 stay.
        let dates: Vec<_> = list[0].schedule().iter().map(|s| s.due_date).collect();
        assert_eq!(
            dates,
            [today, today, today, d("2024-06-15"), d("2024-06-29")]
        );

        let once = list.clone();
        assert!(sweep_missed_reviews(&mut list, today).is_empty());
        assert_eq!(list, once);
    }

    #[test]
    fn sweep_skips_done_slots() {
        let scheduler = ReviewScheduler::new(SchedulePolicy::backend());
        let mut list = vec![problem("1", "x", "2024-06-01")];
        scheduler.toggle_slot(&mut list[0], slot(1), d("2024-06-02"));

        sweep_missed_reviews(&mut list, d("2024-06-12"));
        assert_eq!(list[0].slot(slot(1)).due_date, d("2024-06-02"));
    }

    #[test]
    fn sweep_on_load_follows_policy() {
        let mut list = vec![problem("1", "x", "2024-06-01")];
        let backend = ReviewScheduler::new(SchedulePolicy::backend());
        assert!(backend.sweep_on_load(&mut list, d("2024-06-12")).is_empty());

        let local = ReviewScheduler::new(SchedulePolicy::local());
        assert_eq!(local.sweep_on_load(&mut list, d("2024-06-12")).len(), 1);
    }

    #[test]
    fn sort_by_solved_date_is_stable() {
        let list = vec![
            problem("b", "second", "2024-06-02"),
            problem("a", "first tie", "2024-06-01"),
            problem("c", "second tie", "2024-06-01"),
        ];
        let sorted: Vec<_> = sort_problems(&list, SortKey::SolvedDate)
            .into_iter()
            .map(|p| p.id().as_str())
            .collect();
        assert_eq!(sorted, ["a", "c", "b"]);
    }

    #[test]
    fn sort_by_difficulty_puts_unlabelled_last() {
        let hard = ProblemDraft::new("1", "x")
            .with_difficulty("hard")
            .validate(d("2024-06-01"))
            .unwrap();
        let none = problem("2", "y", "2024-06-01");
        let easy = ProblemDraft::new("3", "z")
            .with_difficulty("easy")
            .validate(d("2024-06-01"))
            .unwrap();
        let list = vec![hard, none, easy];
        let sorted: Vec<_> = sort_problems(&list, SortKey::Difficulty)
            .into_iter()
            .map(|p| p.id().as_str())
            .collect();
        assert_eq!(sorted, ["3", "1", "2"]);
    }

    #[test]
    fn sort_by_identifier_uses_numeric_order() {
        let list = vec![
            problem("10", "x", "2024-06-01"),
            problem("two-sum", "y", "2024-06-01"),
            problem("2", "z", "2024-06-01"),
        ];
        let sorted: Vec<_> = sort_problems(&list, SortKey::Identifier)
            .into_iter()
            .map(|p| p.id().as_str())
            .collect();
        assert_eq!(sorted, ["2", "10", "two-sum"]);
    }

    #[test]
    fn filter_is_case_insensitive_and_blank_matches_all() {
        let list = vec![
            problem("1", "Two Sum", "2024-06-01"),
            problem("2", "Binary Search", "2024-06-01"),
        ];
        let hits: Vec<_> = filter_by_name(&list, "SUM")
            .into_iter()
            .map(|p| p.id().as_str())
            .collect();
        assert_eq!(hits, ["1"]);
        assert_eq!(filter_by_name(&list, "").len(), 2);
        assert!(filter_by_name(&list, "   ").is_empty());
        assert!(filter_by_name(&list, "graph").is_empty());
    }

    #[test]
    fn parse_toggle_mode_and_sort_key() {
        assert_eq!("flip".parse::<ToggleMode>().unwrap(), ToggleMode::Flip);
        assert_eq!(
            "Complete-Only".parse::<ToggleMode>().unwrap(),
            ToggleMode::CompleteOnly
        );
        assert!("maybe".parse::<ToggleMode>().is_err());
        assert_eq!("id".parse::<SortKey>().unwrap(), SortKey::Identifier);
        assert!("name".parse::<SortKey>().is_err());
    }
}
