use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// User-supplied identifier of a Problem (for example a judge's problem number).
///
/// Always trimmed and non-empty.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProblemId(String);

impl ProblemId {
    /// Creates a new `ProblemId`.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value is empty after trimming.
    pub fn new(id: impl AsRef<str>) -> Result<Self, ParseIdError> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ParseIdError);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse::<u64>().ok()
    }
}

// Numeric ids compare by value ("2" < "10"), numeric before textual,
// textual ids lexicographically.
impl Ord for ProblemId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ProblemId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProblemId({})", self.0)
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error type for parsing an identifier from a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseIdError;

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("problem identifier cannot be empty")
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for ProblemId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProblemId {
    type Error = ParseIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProblemId> for String {
    fn from(id: ProblemId) -> Self {
        id.0
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_id_display() {
        let id = ProblemId::new("1000").unwrap();
        assert_eq!(id.to_string(), "1000");
    }

    #[test]
    fn test_problem_id_trims() {
        let id: ProblemId = "  two-sum ".parse().unwrap();
        assert_eq!(id.as_str(), "two-sum");
    }

    #[test]
    fn test_problem_id_rejects_blank() {
        assert!("   ".parse::<ProblemId>().is_err());
        assert!(ProblemId::new("").is_err());
    }

    #[test]
    fn test_numeric_ids_order_by_value() {
        let two = ProblemId::new("2").unwrap();
        let ten = ProblemId::new("10").unwrap();
        assert!(two < ten);
    }

    #[test]
    fn test_numeric_ids_sort_before_text() {
        let num = ProblemId::new("999").unwrap();
        let text = ProblemId::new("abc").unwrap();
        assert!(num < text);
        assert!(ProblemId::new("abc").unwrap() < ProblemId::new("abd").unwrap());
    }
}
