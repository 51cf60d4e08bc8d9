//! Best-effort stages.
//!
//! A stage either yields a value or yields a diagnostic note; it never aborts
//! the surrounding analysis. The orchestrator merges present values and keeps
//! the notes for the report.

use tracing::warn;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome<T> {
    pub value: Option<T>,
    pub note: Option<String>,
}

impl<T> StageOutcome<T> {
    pub fn done(value: T) -> Self {
        Self {
            value: Some(value),
            note: None,
        }
    }

    pub fn skipped(note: impl Into<String>) -> Self {
        Self {
            value: None,
            note: Some(note.into()),
        }
    }

    /// Move the note (if any) into `notes` and return the value.
    pub fn merge_into(self, notes: &mut Vec<String>) -> Option<T> {
        if let Some(note) = self.note {
            notes.push(note);
        }
        self.value
    }
}

/// Run `work`; a failure is logged and turned into a note prefixed by `stage`.
pub fn best_effort<T>(stage: &str, work: impl FnOnce() -> Result<T, AppError>) -> StageOutcome<T> {
    match work() {
        Ok(value) => StageOutcome::done(value),
        Err(err) => {
            warn!(stage, kind = err.kind().as_str(), error = %err, "stage failed; continuing with partial results");
            StageOutcome::skipped(format!("{stage}: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_becomes_note() {
        let outcome: StageOutcome<f64> =
            best_effort("regression 'Rent'", || Err(AppError::insufficient("regression", 3, 2)));
        assert!(outcome.value.is_none());
        assert_eq!(
            outcome.note.as_deref(),
            Some("regression 'Rent': Insufficient data for regression: 2 < 3")
        );

        let mut notes = Vec::new();
        assert_eq!(outcome.merge_into(&mut notes), None);
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn success_keeps_value_without_note() {
        let mut notes = Vec::new();
        let value = best_effort("seasonality 'Revenue'", || Ok(7)).merge_into(&mut notes);
        assert_eq!(value, Some(7));
        assert!(notes.is_empty());
    }
}
