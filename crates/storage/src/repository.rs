use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracker_core::model::{
    Problem, ProblemId, ReviewSchedule, SlotIndex, ValidatedEdit, parse_link,
};
use tracker_core::time::{format_date, parse_date};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Flat persisted shape of a problem and its five review slots.
///
/// Most backends are flat tables or JSON documents, so the schedule is spread
/// over `reviewN_date` / `reviewN_done` columns. Dates are `YYYY-MM-DD` text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub problem_id: String,
    pub name: String,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    pub solved_date: String,
    pub review1_date: String,
    pub review2_date: String,
    pub review3_date: String,
    pub review4_date: String,
    pub review5_date: String,
    #[serde(default)]
    pub review1_done: bool,
    #[serde(default)]
    pub review2_done: bool,
    #[serde(default)]
    pub review3_done: bool,
    #[serde(default)]
    pub review4_done: bool,
    #[serde(default)]
    pub review5_done: bool,
}

impl ProblemRecord {
    #[must_use]
    pub fn from_problem(problem: &Problem) -> Self {
        let [s1, s2, s3, s4, s5] = *problem.schedule().slots();
        Self {
            problem_id: problem.id().as_str().to_owned(),
            name: problem.name().to_owned(),
            difficulty: problem.difficulty().map(str::to_owned),
            category: problem.category().map(str::to_owned),
            link: problem.link().map(|u| u.as_str().to_owned()),
            solved_date: format_date(problem.solved_date()),
            review1_date: format_date(s1.due_date),
            review2_date: format_date(s2.due_date),
            review3_date: format_date(s3.due_date),
            review4_date: format_date(s4.due_date),
            review5_date: format_date(s5.due_date),
            review1_done: s1.done,
            review2_done: s2.done,
            review3_done: s3.done,
            review4_done: s4.done,
            review5_done: s5.done,
        }
    }

    /// `(date, done)` columns of each slot, slot 1 first.
    #[must_use]
    pub fn slot_columns(&self) -> [(&str, bool); SlotIndex::COUNT] {
        [
            (self.review1_date.as_str(), self.review1_done),
            (self.review2_date.as_str(), self.review2_done),
            (self.review3_date.as_str(), self.review3_done),
            (self.review4_date.as_str(), self.review4_done),
            (self.review5_date.as_str(), self.review5_done),
        ]
    }

    fn slot_columns_mut(&mut self, index: SlotIndex) -> (&mut String, &mut bool) {
        match index.get() {
            1 => (&mut self.review1_date, &mut self.review1_done),
            2 => (&mut self.review2_date, &mut self.review2_done),
            3 => (&mut self.review3_date, &mut self.review3_done),
            4 => (&mut self.review4_date, &mut self.review4_done),
            _ => (&mut self.review5_date, &mut self.review5_done),
        }
    }

    /// Convert the record back into a domain `Problem`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if any stored field fails validation.
    pub fn into_problem(self) -> Result<Problem, StorageError> {
        let id = ProblemId::new(&self.problem_id).map_err(ser)?;
        let solved_date = parse_date(&self.solved_date).map_err(ser)?;
        let link = match self.link.as_deref() {
            Some(raw) => parse_link(raw).map_err(ser)?,
            None => None,
        };

        let cols = self.slot_columns();
        let mut pairs = [(solved_date, false); SlotIndex::COUNT];
        for (pair, (raw, done)) in pairs.iter_mut().zip(cols) {
            *pair = (parse_date(raw).map_err(ser)?, done);
        }

        Problem::from_persisted(
            id,
            self.name,
            self.difficulty,
            self.category,
            link,
            solved_date,
            ReviewSchedule::from_persisted(pairs),
        )
        .map_err(ser)
    }
}

/// Change to one review slot; `None` fields are left as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPatch {
    pub index: SlotIndex,
    pub due_date: Option<NaiveDate>,
    pub done: Option<bool>,
}

/// Partial update of a stored problem. `None` means "leave unchanged";
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemPatch {
    pub name: Option<String>,
    pub difficulty: Option<Option<String>>,
    pub category: Option<Option<String>>,
    pub link: Option<Option<String>>,
    pub slots: Vec<SlotPatch>,
}

impl ProblemPatch {
    #[must_use]
    pub fn from_edit(edit: &ValidatedEdit) -> Self {
        Self {
            name: edit.name.clone(),
            difficulty: edit.difficulty.clone(),
            category: edit.category.clone(),
            link: edit
                .link
                .as_ref()
                .map(|link| link.as_ref().map(|u| u.as_str().to_owned())),
            slots: Vec::new(),
        }
    }

    /// Patch carrying the full current state of the given slots of `problem`.
    #[must_use]
    pub fn slots_of(problem: &Problem, indices: impl IntoIterator<Item = SlotIndex>) -> Self {
        Self {
            slots: indices
                .into_iter()
                .map(|index| {
                    let slot = problem.slot(index);
                    SlotPatch {
                        index,
                        due_date: Some(slot.due_date),
                        done: Some(slot.done),
                    }
                })
                .collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.difficulty.is_none()
            && self.category.is_none()
            && self.link.is_none()
            && self.slots.is_empty()
    }

    pub fn apply_to(&self, record: &mut ProblemRecord) {
        if let Some(name) = &self.name {
            record.name.clone_from(name);
        }
        if let Some(difficulty) = &self.difficulty {
            record.difficulty.clone_from(difficulty);
        }
        if let Some(category) = &self.category {
            record.category.clone_from(category);
        }
        if let Some(link) = &self.link {
            record.link.clone_from(link);
        }
        for patch in &self.slots {
            let (date, done) = record.slot_columns_mut(patch.index);
            if let Some(due) = patch.due_date {
                *date = format_date(due);
            }
            if let Some(flag) = patch.done {
                *done = flag;
            }
        }
    }
}

/// Repository contract for problems.
#[async_trait]
pub trait ProblemRepository: Send + Sync {
    /// All stored problems in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read or a row is malformed.
    async fn list_all(&self) -> Result<Vec<Problem>, StorageError>;

    /// Fetch one problem.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get(&self, id: &ProblemId) -> Result<Problem, StorageError>;

    /// Store a new problem and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the identifier is already taken.
    async fn insert(&self, problem: &Problem) -> Result<Problem, StorageError>;

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn update_fields(&self, id: &ProblemId, patch: &ProblemPatch)
    -> Result<(), StorageError>;

    /// Remove a problem together with its review slots.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn delete(&self, id: &ProblemId) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Keeps flat records, so every read goes through the same conversion as the
/// persistent backends.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    records: Arc<Mutex<Vec<ProblemRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<ProblemRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

pub(crate) fn position_of(records: &[ProblemRecord], id: &ProblemId) -> Option<usize> {
    records.iter().position(|r| r.problem_id == id.as_str())
}

#[async_trait]
impl ProblemRepository for InMemoryRepository {
    async fn list_all(&self) -> Result<Vec<Problem>, StorageError> {
        let guard = self.lock()?;
        guard.iter().cloned().map(ProblemRecord::into_problem).collect()
    }

    async fn get(&self, id: &ProblemId) -> Result<Problem, StorageError> {
        let guard = self.lock()?;
        let idx = position_of(&guard, id).ok_or(StorageError::NotFound)?;
        guard[idx].clone().into_problem()
    }

    async fn insert(&self, problem: &Problem) -> Result<Problem, StorageError> {
        let mut guard = self.lock()?;
        if position_of(&guard, problem.id()).is_some() {
            return Err(StorageError::Conflict);
        }
        guard.push(ProblemRecord::from_problem(problem));
        Ok(problem.clone())
    }

    async fn update_fields(
        &self,
        id: &ProblemId,
        patch: &ProblemPatch,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let idx = position_of(&guard, id).ok_or(StorageError::NotFound)?;
        patch.apply_to(&mut guard[idx]);
        Ok(())
    }

    async fn delete(&self, id: &ProblemId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let idx = position_of(&guard, id).ok_or(StorageError::NotFound)?;
        guard.remove(idx);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub problems: Arc<dyn ProblemRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let problems: Arc<dyn ProblemRepository> = Arc::new(InMemoryRepository::new());
        Self { problems }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::model::{ProblemDraft, ProblemEdit};
    use tracker_core::scheduler::{ReviewScheduler, SchedulePolicy};
    use tracker_core::time::fixed_today;

    fn build_problem(id: &str) -> Problem {
        ProblemDraft::new(id, format!("Problem {id}"))
            .with_difficulty("silver")
            .with_category("graph")
            .with_link("https://www.acmicpc.net/problem/1260")
            .solved_on("2024-01-01")
            .validate(fixed_today())
            .unwrap()
    }

    fn slot(n: u8) -> SlotIndex {
        SlotIndex::new(n).unwrap()
    }

    #[test]
    fn record_round_trips_problem() {
        let scheduler = ReviewScheduler::new(SchedulePolicy::local());
        let mut problem = build_problem("1260");
        scheduler.toggle_slot(&mut problem, slot(2), fixed_today());
        scheduler.toggle_slot(&mut problem, slot(4), fixed_today());

        let record = ProblemRecord::from_problem(&problem);
        assert_eq!(record.solved_date, "2024-01-01");
        assert_eq!(record.review1_date, "2024-01-02");
        assert_eq!(record.review2_date, "2024-06-12");
        assert!(record.review2_done && record.review4_done);
        assert!(!record.review1_done);

        let back = record.into_problem().unwrap();
        assert_eq!(back, problem);
    }

    #[test]
    fn record_with_bad_date_is_a_serialization_error() {
        let mut record = ProblemRecord::from_problem(&build_problem("1"));
        record.review3_date = "2024/01/08".into();
        assert!(matches!(
            record.into_problem(),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn patch_touches_only_named_fields() {
        let problem = build_problem("1");
        let mut record = ProblemRecord::from_problem(&problem);
        let before = record.clone();

        let edit = ProblemEdit {
            category: Some(String::new()),
            ..ProblemEdit::default()
        }
        .validate()
        .unwrap();
        let mut patch = ProblemPatch::from_edit(&edit);
        patch.slots.push(SlotPatch {
            index: slot(5),
            due_date: None,
            done: Some(true),
        });
        patch.apply_to(&mut record);

        assert_eq!(record.category, None);
        assert!(record.review5_done);
        assert_eq!(record.review5_date, before.review5_date);
        assert_eq!(record.name, before.name);
        assert_eq!(record.difficulty, before.difficulty);
    }

    #[tokio::test]
    async fn in_memory_keeps_insertion_order_and_rejects_duplicates() {
        let repo = InMemoryRepository::new();
        repo.insert(&build_problem("20")).await.unwrap();
        repo.insert(&build_problem("3")).await.unwrap();

        let err = repo.insert(&build_problem("20")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));

        let ids: Vec<_> = repo
            .list_all()
            .await
            .unwrap()
            .iter()
            .map(|p| p.id().as_str().to_owned())
            .collect();
        assert_eq!(ids, ["20", "3"]);
    }

    #[tokio::test]
    async fn in_memory_update_and_delete() {
        let repo = InMemoryRepository::new();
        let problem = repo.insert(&build_problem("1")).await.unwrap();

        let mut done = problem.clone();
        ReviewScheduler::default().toggle_slot(&mut done, slot(1), fixed_today());
        repo.update_fields(problem.id(), &ProblemPatch::slots_of(&done, [slot(1)]))
            .await
            .unwrap();
        assert!(repo.get(problem.id()).await.unwrap().slot(slot(1)).done);

        repo.delete(problem.id()).await.unwrap();
        assert!(matches!(
            repo.get(problem.id()).await,
            Err(StorageError::NotFound)
        ));
        assert!(matches!(
            repo.delete(problem.id()).await,
            Err(StorageError::NotFound)
        ));
    }
}
