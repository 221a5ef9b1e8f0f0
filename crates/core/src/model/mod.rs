mod ids;
mod problem;
mod review;

pub use ids::{ParseIdError, ProblemId};

pub use problem::{Problem, ProblemDraft, ProblemEdit, ProblemError, ValidatedEdit, parse_link};
pub use review::{ReviewError, ReviewSchedule, ReviewSlot, SlotIndex};
