//! Plain-text rendering of service views.

use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};
use tracker_core::calendar::{HeatLevel, MonthView, PendingReview, ReviewStats};
use tracker_core::model::Problem;
use tracker_core::time::format_date;

fn slot_mark(done: bool, due: bool) -> &'static str {
    match (done, due) {
        (true, _) => "[x]",
        (false, true) => "[!]",
        (false, false) => "[ ]",
    }
}

/// One block per problem: header line, optional link, then its five slots.
#[must_use]
pub fn problems(problems: &[&Problem], today: NaiveDate) -> String {
    if problems.is_empty() {
        return "no problems\n".to_owned();
    }
    let mut out = String::new();
    for problem in problems {
        let _ = write!(out, "{}  {}", problem.id(), problem.name());
        if let Some(difficulty) = problem.difficulty() {
            let _ = write!(out, "  [{difficulty}]");
        }
        if let Some(category) = problem.category() {
            let _ = write!(out, "  #{category}");
        }
        let _ = writeln!(out, "  solved {}", format_date(problem.solved_date()));
        if let Some(link) = problem.link() {
            let _ = writeln!(out, "    {link}");
        }
        out.push_str("   ");
        for slot in problem.schedule().iter() {
            let _ = write!(
                out,
                " {} {} {}",
                slot.index,
                format_date(slot.due_date),
                slot_mark(slot.done, slot.is_due(today))
            );
        }
        out.push('\n');
    }
    out
}

fn heat_glyph(heat: HeatLevel) -> char {
    match heat {
        HeatLevel::None => ' ',
        HeatLevel::Light => '.',
        HeatLevel::Medium => '+',
        HeatLevel::Heavy => '#',
    }
}

/// Sunday-first month grid; each day shows its heat glyph, today is starred.
#[must_use]
pub fn month(view: &MonthView) -> String {
    let mut out = String::new();
    let Some(first) = view.days.first() else {
        return out;
    };
    let _ = writeln!(out, "{}", first.date.format("%B %Y"));
    out.push_str(" Su   Mo   Tu   We   Th   Fr   Sa\n");

    let lead = first.date.weekday().num_days_from_sunday() as usize;
    out.push_str(&"     ".repeat(lead));
    for (i, day) in view.days.iter().enumerate() {
        let today = if day.is_today { '*' } else { ' ' };
        let _ = write!(out, " {:>2}{}{}", day.date.day(), heat_glyph(day.heat), today);
        if (lead + i + 1) % 7 == 0 {
            out.push('\n');
        }
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "open reviews: {}   (. 1-4  + 5-9  # 10+  * today)",
        view.total_pending()
    );
    out
}

/// Open reviews due on `date`.
#[must_use]
pub fn day(date: NaiveDate, reviews: &[PendingReview]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}: {} open review(s)", format_date(date), reviews.len());
    for review in reviews {
        let _ = write!(out, "  {}  {}  {}", review.slot, review.problem_id, review.name);
        if let Some(link) = &review.link {
            let _ = write!(out, "  {link}");
        }
        out.push('\n');
    }
    out
}

#[must_use]
pub fn stats(stats: &ReviewStats, completions: &[(NaiveDate, usize)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "problems:        {}", stats.problems);
    let _ = writeln!(
        out,
        "reviews done:    {}/{}",
        stats.completed_reviews, stats.total_reviews
    );
    let _ = writeln!(out, "due today:       {}", stats.due_today);
    let _ = writeln!(out, "fully reviewed:  {}", stats.fully_reviewed);
    if !completions.is_empty() {
        out.push_str("recent completions:\n");
        let start = completions.len().saturating_sub(7);
        for (date, count) in &completions[start..] {
            let _ = writeln!(out, "  {}  {count}", format_date(*date));
        }
    }
    out
}
