use chrono::NaiveDate;
use thiserror::Error;
use url::Url;

use crate::model::ids::ProblemId;
use crate::model::review::{ReviewSchedule, ReviewSlot, SlotIndex};
use crate::scheduler;
use crate::time::{DateError, parse_date};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProblemError {
    #[error("problem identifier is required")]
    MissingIdentifier,

    #[error("problem name is required")]
    MissingName,

    #[error("invalid problem link: {raw:?}")]
    InvalidLink { raw: String },

    #[error(transparent)]
    InvalidDate(#[from] DateError),
}

impl ProblemError {
    /// True for missing or malformed form fields (everything except dates).
    #[must_use]
    pub fn is_validation(&self) -> bool {
        !matches!(self, ProblemError::InvalidDate(_))
    }
}

fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn required_name(raw: &str) -> Result<String, ProblemError> {
    optional_text(raw).ok_or(ProblemError::MissingName)
}

/// Parses an optional link; blank input means "no link".
///
/// # Errors
///
/// Returns `ProblemError::InvalidLink` if the text is not an absolute URL.
pub fn parse_link(raw: &str) -> Result<Option<Url>, ProblemError> {
    match optional_text(raw) {
        None => Ok(None),
        Some(s) => Url::parse(&s)
            .map(Some)
            .map_err(|_| ProblemError::InvalidLink { raw: raw.to_owned() }),
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Raw add-form input, exactly as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemDraft {
    pub id: String,
    pub name: String,
    pub difficulty: String,
    pub category: String,
    pub link: String,
    /// `YYYY-MM-DD`; blank means the `today` passed to `validate`.
    pub solved_date: String,
}

impl ProblemDraft {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn solved_on(mut self, date: impl Into<String>) -> Self {
        self.solved_date = date.into();
        self
    }

    #[must_use]
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = difficulty.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Validates the form and builds a problem with its full review schedule.
    ///
    /// # Errors
    ///
    /// - `MissingIdentifier` / `MissingName` for blank required fields
    /// - `InvalidLink` if a link is given but is not a URL
    /// - `InvalidDate` if the solved date does not parse or its reviews
    ///   would fall after 9999-12-31
    pub fn validate(self, today: NaiveDate) -> Result<Problem, ProblemError> {
        let id = ProblemId::new(&self.id).map_err(|_| ProblemError::MissingIdentifier)?;
        let name = required_name(&self.name)?;
        let link = parse_link(&self.link)?;
        let solved_date = if self.solved_date.trim().is_empty() {
            today
        } else {
            parse_date(&self.solved_date)?
        };

        Ok(Problem {
            id,
            name,
            difficulty: optional_text(&self.difficulty),
            category: optional_text(&self.category),
            link,
            solved_date,
            schedule: scheduler::new_schedule(solved_date)?,
        })
    }
}

//
// ─── EDIT ──────────────────────────────────────────────────────────────────────
//

/// Metadata edit. `None` leaves a field untouched; `Some("")` clears an
/// optional field. Identifier and solved date are immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemEdit {
    pub name: Option<String>,
    pub difficulty: Option<String>,
    pub category: Option<String>,
    pub link: Option<String>,
}

/// A validated `ProblemEdit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatedEdit {
    pub name: Option<String>,
    pub difficulty: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub link: Option<Option<Url>>,
}

impl ProblemEdit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.difficulty.is_none()
            && self.category.is_none()
            && self.link.is_none()
    }

    /// # Errors
    ///
    /// Returns `MissingName` if the name is set to blank, `InvalidLink` for a bad URL.
    pub fn validate(self) -> Result<ValidatedEdit, ProblemError> {
        Ok(ValidatedEdit {
            name: self.name.as_deref().map(required_name).transpose()?,
            difficulty: self.difficulty.as_deref().map(optional_text),
            category: self.category.as_deref().map(optional_text),
            link: self.link.as_deref().map(parse_link).transpose()?,
        })
    }
}

//
// ─── PROBLEM ───────────────────────────────────────────────────────────────────
//

/// One logged algorithm exercise with its solved date and review schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    id: ProblemId,
    name: String,
    difficulty: Option<String>,
    category: Option<String>,
    link: Option<Url>,
    solved_date: NaiveDate,
    schedule: ReviewSchedule,
}

impl Problem {
    /// Rehydrate a problem from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProblemError::MissingName` if the stored name is blank.
    pub fn from_persisted(
        id: ProblemId,
        name: String,
        difficulty: Option<String>,
        category: Option<String>,
        link: Option<Url>,
        solved_date: NaiveDate,
        schedule: ReviewSchedule,
    ) -> Result<Self, ProblemError> {
        if name.trim().is_empty() {
            return Err(ProblemError::MissingName);
        }
        Ok(Self {
            id,
            name,
            difficulty,
            category,
            link,
            solved_date,
            schedule,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ProblemId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref()
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    #[must_use]
    pub fn link(&self) -> Option<&Url> {
        self.link.as_ref()
    }

    #[must_use]
    pub fn solved_date(&self) -> NaiveDate {
        self.solved_date
    }

    #[must_use]
    pub fn schedule(&self) -> &ReviewSchedule {
        &self.schedule
    }

    #[must_use]
    pub fn slot(&self, index: SlotIndex) -> &ReviewSlot {
        self.schedule.slot(index)
    }

    pub(crate) fn schedule_mut(&mut self) -> &mut ReviewSchedule {
        &mut self.schedule
    }

    /// Apply a validated metadata edit.
    pub fn apply_edit(&mut self, edit: &ValidatedEdit) {
        if let Some(name) = &edit.name {
            self.name.clone_from(name);
        }
        if let Some(difficulty) = &edit.difficulty {
            self.difficulty.clone_from(difficulty);
        }
        if let Some(category) = &edit.category {
            self.category.clone_from(category);
        }
        if let Some(link) = &edit.link {
            self.link.clone_from(link);
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_today;

    #[test]
    fn draft_requires_id_and_name() {
        let err = ProblemDraft::new("  ", "Two Sum")
            .validate(fixed_today())
            .unwrap_err();
        assert_eq!(err, ProblemError::MissingIdentifier);

        let err = ProblemDraft::new("1", " ")
            .validate(fixed_today())
            .unwrap_err();
        assert_eq!(err, ProblemError::MissingName);
        assert!(err.is_validation());
    }

    #[test]
    fn draft_rejects_bad_date() {
        let err = ProblemDraft::new("1", "Two Sum")
            .solved_on("2024-13-01")
            .validate(fixed_today())
            .unwrap_err();
        assert!(matches!(err, ProblemError::InvalidDate(_)));
        assert!(!err.is_validation());
    }

    #[test]
    fn draft_rejects_bad_link() {
        let err = ProblemDraft::new("1", "Two Sum")
            .with_link("not a url")
            .validate(fixed_today())
            .unwrap_err();
        assert!(matches!(err, ProblemError::InvalidLink { .. }));
    }

    #[test]
    fn draft_defaults_solved_date_to_today_and_blanks_to_none() {
        let p = ProblemDraft::new("1000", " A+B ")
            .with_difficulty("  ")
            .with_category("math")
            .validate(fixed_today())
            .unwrap();
        assert_eq!(p.solved_date(), fixed_today());
        assert_eq!(p.name(), "A+B");
        assert_eq!(p.difficulty(), None);
        assert_eq!(p.category(), Some("math"));
        assert!(p.link().is_none());
        assert!(p.schedule().iter().all(|s| !s.done));
    }

    #[test]
    fn edit_updates_and_clears_fields() {
        let mut p = ProblemDraft::new("1", "Two Sum")
            .with_difficulty("easy")
            .with_link("https://example.com/1")
            .validate(fixed_today())
            .unwrap();

        let edit = ProblemEdit {
            name: Some("Two Sum II".into()),
            difficulty: Some(String::new()),
            link: Some(String::new()),
            ..ProblemEdit::default()
        }
        .validate()
        .unwrap();
        p.apply_edit(&edit);

        assert_eq!(p.name(), "Two Sum II");
        assert_eq!(p.difficulty(), None);
        assert!(p.link().is_none());
        assert_eq!(p.solved_date(), fixed_today());
    }

    #[test]
    fn edit_rejects_blank_name() {
        let err = ProblemEdit {
            name: Some(" ".into()),
            ..ProblemEdit::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ProblemError::MissingName);
    }
}
