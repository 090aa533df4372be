use crate::{error::ServerError, Value};

/// Result column description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: Option<String>,
    pub decltype: Option<String>,
}

/// Outcome of one executed statement.
///
/// Every row has exactly one value per column, in server order.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
    pub affected_row_count: u64,
    /// Decimal rowid, kept as the server sent it.
    pub last_insert_rowid: Option<String>,
}

/// Per-step outcomes of a batch, index-aligned with the submitted steps.
///
/// An executed step has exactly one of `step_results[i]` / `step_errors[i]`;
/// a step skipped by its condition has neither.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchResults {
    pub step_results: Vec<Option<StatementResult>>,
    pub step_errors: Vec<Option<ServerError>>,
}

impl BatchResults {
    pub fn len(&self) -> usize {
        self.step_results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.step_results.is_empty()
    }

    /// `true` when the step ran neither to a result nor to an error.
    pub fn was_skipped(&self, index: usize) -> bool {
        matches!(
            (self.step_results.get(index), self.step_errors.get(index)),
            (Some(None), Some(None))
        )
    }
}
