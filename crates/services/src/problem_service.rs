use std::sync::Arc;

use chrono::NaiveDate;
use storage::repository::{ProblemPatch, ProblemRepository, Storage, StorageError};
use tracker_core::calendar::{self, MonthView, PendingReview, ReviewStats};
use tracker_core::model::{Problem, ProblemDraft, ProblemEdit, ProblemId, SlotIndex};
use tracker_core::scheduler::{self, ReviewScheduler, SchedulePolicy, SortKey};

use crate::error::ProblemServiceError;
use crate::Clock;

/// Owns the in-memory problem list and keeps it in step with the repository.
///
/// Every mutation writes through to storage first; the view only changes once
/// the store call has succeeded.
#[derive(Clone)]
pub struct ProblemService {
    clock: Clock,
    scheduler: ReviewScheduler,
    problems: Arc<dyn ProblemRepository>,
    view: Vec<Problem>,
}

fn store_err(id: &ProblemId, err: StorageError) -> ProblemServiceError {
    match err {
        StorageError::NotFound => ProblemServiceError::NotFound(id.clone()),
        StorageError::Conflict => ProblemServiceError::DuplicateIdentifier(id.clone()),
        other => {
            tracing::warn!(id = %id, error = %other, "store call failed");
            ProblemServiceError::Storage(other)
        }
    }
}

impl ProblemService {
    /// Service over `problems` with an empty view; call [`Self::load`] next.
    #[must_use]
    pub fn new(clock: Clock, policy: SchedulePolicy, problems: Arc<dyn ProblemRepository>) -> Self {
        Self {
            clock,
            scheduler: ReviewScheduler::new(policy),
            problems,
            view: Vec::new(),
        }
    }

    /// Build a loaded service from an assembled `Storage`.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError` if the initial load fails.
    pub async fn open(
        storage: &Storage,
        clock: Clock,
        policy: SchedulePolicy,
    ) -> Result<Self, ProblemServiceError> {
        let mut service = Self::new(clock, policy, Arc::clone(&storage.problems));
        service.load().await?;
        Ok(service)
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    #[must_use]
    pub fn policy(&self) -> SchedulePolicy {
        self.scheduler.policy()
    }

    fn position(&self, id: &ProblemId) -> Result<usize, ProblemServiceError> {
        self.view
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| ProblemServiceError::NotFound(id.clone()))
    }

    /// Replace the view with the repository contents.
    ///
    /// When the policy sweeps on load, missed reviews are rolled forward to
    /// today and written back one problem at a time before the list is
    /// accepted. The write-back stops at the first failure. Problems written
    /// before it keep their rolled dates in the store; the sweep is idempotent,
    /// so the next load finishes the job.
    ///
    /// # Errors
    ///
    /// Returns `ProblemServiceError::Storage` if reading or the sweep write-back
    /// fails; the previous view is kept in that case.
    pub async fn load(&mut self) -> Result<usize, ProblemServiceError> {
        let today = self.today();
        let mut loaded = self.problems.list_all().await?;

        let changed = self.scheduler.sweep_on_load(&mut loaded, today);
        for problem in loaded.iter().filter(|p| changed.contains(p.id())) {
            let patch = ProblemPatch::slots_of(problem, SlotIndex::all());
            self.problems
                .update_fields(problem.id(), &patch)
                .await
                .map_err(|e| store_err(problem.id(), e))?;
        }
        if !changed.is_empty() {
            tracing::debug!(count = changed.len(), %today, "rolled missed reviews forward");
        }

        self.view = loaded;
        tracing::debug!(count = self.view.len(), "loaded problems");
        Ok(self.view.len())
    }

    /// Validate, schedule and store a new problem.
    ///
    /// # Errors
    ///
    /// Returns `Validation`/`InvalidDate` for bad input,
    /// `DuplicateIdentifier` if the id is taken, or `Storage` if the insert fails.
    pub async fn add(&mut self, draft: ProblemDraft) -> Result<Problem, ProblemServiceError> {
        let problem = draft.validate(self.today())?;
        if self.view.iter().any(|p| p.id() == problem.id()) {
            return Err(ProblemServiceError::DuplicateIdentifier(problem.id().clone()));
        }

        let stored = self
            .problems
            .insert(&problem)
            .await
            .map_err(|e| store_err(problem.id(), e))?;
        tracing::info!(id = %stored.id(), solved = %stored.solved_date(), "added problem");
        self.view.push(stored.clone());
        Ok(stored)
    }

    /// Update the editable fields of a problem. Dates and slots are untouched.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, `Validation` for bad input, or
    /// `Storage` if the update fails.
    pub async fn edit(
        &mut self,
        id: &ProblemId,
        edit: ProblemEdit,
    ) -> Result<Problem, ProblemServiceError> {
        let idx = self.position(id)?;
        let edit = edit.validate()?;
        let patch = ProblemPatch::from_edit(&edit);
        if !patch.is_empty() {
            self.problems
                .update_fields(id, &patch)
                .await
                .map_err(|e| store_err(id, e))?;
            tracing::info!(id = %id, "edited problem");
        }
        self.view[idx].apply_edit(&edit);
        Ok(self.view[idx].clone())
    }

    /// Toggle one review slot and return its new `done` state.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id or `Storage` if the write fails.
    pub async fn toggle(
        &mut self,
        id: &ProblemId,
        slot: SlotIndex,
    ) -> Result<bool, ProblemServiceError> {
        let idx = self.position(id)?;
        let mut next = self.view[idx].clone();
        let done = self.scheduler.toggle_slot(&mut next, slot, self.today());

        let patch = ProblemPatch::slots_of(&next, [slot]);
        self.problems
            .update_fields(id, &patch)
            .await
            .map_err(|e| store_err(id, e))?;
        tracing::info!(id = %id, %slot, done, "toggled review");

        self.view[idx] = next;
        Ok(done)
    }

    /// Remove a problem together with its reviews.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id or `Storage` if the delete fails.
    pub async fn delete(&mut self, id: &ProblemId) -> Result<Problem, ProblemServiceError> {
        let idx = self.position(id)?;
        self.problems
            .delete(id)
            .await
            .map_err(|e| store_err(id, e))?;
        tracing::info!(id = %id, "deleted problem");
        Ok(self.view.remove(idx))
    }

    #[must_use]
    pub fn get(&self, id: &ProblemId) -> Option<&Problem> {
        self.view.iter().find(|p| p.id() == id)
    }

    /// All problems in insertion order.
    #[must_use]
    pub fn problems(&self) -> &[Problem] {
        &self.view
    }

    #[must_use]
    pub fn due_today(&self) -> Vec<&Problem> {
        scheduler::due_today(&self.view, self.today())
    }

    /// Problems solved during the current Sunday..=Saturday week.
    #[must_use]
    pub fn due_this_week(&self) -> Vec<&Problem> {
        scheduler::due_this_week(&self.view, self.today())
    }

    #[must_use]
    pub fn sorted(&self, key: SortKey) -> Vec<&Problem> {
        scheduler::sort_problems(&self.view, key)
    }

    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Problem> {
        scheduler::filter_by_name(&self.view, query)
    }

    /// Calendar for `year`-`month`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDate` if the month does not exist.
    pub fn month_view(&self, year: i32, month: u32) -> Result<MonthView, ProblemServiceError> {
        Ok(calendar::month_view(&self.view, year, month, self.today())?)
    }

    #[must_use]
    pub fn reviews_on(&self, date: NaiveDate) -> Vec<PendingReview> {
        calendar::reviews_on(&self.view, date)
    }

    #[must_use]
    pub fn completions(&self) -> Vec<(NaiveDate, usize)> {
        calendar::completions_by_date(&self.view)
    }

    #[must_use]
    pub fn stats(&self) -> ReviewStats {
        calendar::stats(&self.view, self.today())
    }
}
