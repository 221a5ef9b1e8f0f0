use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when addressing review slots.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("review slot must be between 1 and 5, got {0}")]
    InvalidSlot(u8),
}

//
// ─── SLOT INDEX ───────────────────────────────────────────────────────────────
//

/// Position of a review within a problem's schedule (1-based, 1..=5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotIndex(u8);

impl SlotIndex {
    /// Number of review slots per problem.
    pub const COUNT: usize = 5;

    pub const FIRST: SlotIndex = SlotIndex(1);
    pub const LAST: SlotIndex = SlotIndex(5);

    /// Converts a 1-based slot number into a `SlotIndex`.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidSlot` if the value is not in 1..=5.
    pub fn new(value: u8) -> Result<Self, ReviewError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ReviewError::InvalidSlot(value))
        }
    }

    /// All slot indices in schedule order.
    #[must_use]
    pub fn all() -> [SlotIndex; 5] {
        [Self(1), Self(2), Self(3), Self(4), Self(5)]
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position within the schedule array.
    #[must_use]
    pub fn position(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u8> for SlotIndex {
    type Error = ReviewError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SlotIndex> for u8 {
    fn from(slot: SlotIndex) -> Self {
        slot.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

//
// ─── REVIEW SLOT ──────────────────────────────────────────────────────────────
//

/// One scheduled spaced-repetition checkpoint of a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSlot {
    pub index: SlotIndex,
    pub due_date: NaiveDate,
    pub done: bool,
}

impl ReviewSlot {
    #[must_use]
    pub fn new(index: SlotIndex, due_date: NaiveDate) -> Self {
        Self {
            index,
            due_date,
            done: false,
        }
    }

    /// A slot is due when it is still open and its date is on or before `today`.
    #[must_use]
    pub fn is_due(&self, today: NaiveDate) -> bool {
        !self.done && self.due_date <= today
    }

    /// Open and strictly before `today`.
    #[must_use]
    pub fn is_missed(&self, today: NaiveDate) -> bool {
        !self.done && self.due_date < today
    }
}

//
// ─── REVIEW SCHEDULE ──────────────────────────────────────────────────────────
//

/// The five review slots of a problem, always ordered 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSchedule {
    slots: [ReviewSlot; SlotIndex::COUNT],
}

impl ReviewSchedule {
    /// Builds an open schedule from five due dates, slot 1 first.
    #[must_use]
    pub fn from_dates(dates: [NaiveDate; SlotIndex::COUNT]) -> Self {
        let idx = SlotIndex::all();
        Self {
            slots: [
                ReviewSlot::new(idx[0], dates[0]),
                ReviewSlot::new(idx[1], dates[1]),
                ReviewSlot::new(idx[2], dates[2]),
                ReviewSlot::new(idx[3], dates[3]),
                ReviewSlot::new(idx[4], dates[4]),
            ],
        }
    }

    /// Rebuilds a schedule from persisted `(due_date, done)` pairs, slot 1 first.
    #[must_use]
    pub fn from_persisted(pairs: [(NaiveDate, bool); SlotIndex::COUNT]) -> Self {
        let mut schedule = Self::from_dates(pairs.map(|(date, _)| date));
        for (slot, (_, done)) in schedule.slots.iter_mut().zip(pairs) {
            slot.done = done;
        }
        schedule
    }

    #[must_use]
    pub fn slots(&self) -> &[ReviewSlot; SlotIndex::COUNT] {
        &self.slots
    }

    #[must_use]
    pub fn slot(&self, index: SlotIndex) -> &ReviewSlot {
        &self.slots[index.position()]
    }

    pub fn slot_mut(&mut self, index: SlotIndex) -> &mut ReviewSlot {
        &mut self.slots[index.position()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReviewSlot> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ReviewSlot> {
        self.slots.iter_mut()
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.done).count()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|s| s.done)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn slot_index_bounds() {
        assert!(SlotIndex::new(0).is_err());
        assert!(SlotIndex::new(6).is_err());
        assert_eq!(SlotIndex::new(3).unwrap().position(), 2);
        assert_eq!(SlotIndex::FIRST.get(), 1);
        assert_eq!(SlotIndex::LAST.get(), 5);
    }

    #[test]
    fn slot_due_and_missed() {
        let slot = ReviewSlot::new(SlotIndex::FIRST, d(2024, 6, 12));
        assert!(slot.is_due(d(2024, 6, 12)));
        assert!(!slot.is_missed(d(2024, 6, 12)));
        assert!(slot.is_missed(d(2024, 6, 13)));
        assert!(!slot.is_due(d(2024, 6, 11)));

        let done = ReviewSlot { done: true, ..slot };
        assert!(!done.is_due(d(2024, 7, 1)));
    }

    #[test]
    fn persisted_schedule_keeps_order_and_flags() {
        let pairs = [
            (d(2024, 1, 2), true),
            (d(2024, 1, 4), false),
            (d(2024, 1, 8), true),
            (d(2024, 1, 15), false),
            (d(2024, 1, 29), false),
        ];
        let schedule = ReviewSchedule::from_persisted(pairs);
        for (slot, (date, done)) in schedule.iter().zip(pairs) {
            assert_eq!(slot.due_date, date);
            assert_eq!(slot.done, done);
        }
        assert_eq!(schedule.slot(SlotIndex::new(3).unwrap()).due_date, d(2024, 1, 8));
        assert_eq!(schedule.completed_count(), 2);
        assert!(!schedule.is_complete());
    }
}
