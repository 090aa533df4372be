//! Conditional batches: ordered steps, each optionally guarded by a condition
//! over the outcomes of earlier steps. Conditions are evaluated by the server.

use crate::{
    decode::build_stmt,
    error::ServerError,
    wire::{self, BatchCond},
    BatchResults, FetchMode, HranaError, Params, Result, Rows, Statement, Stream,
};

/// Handle to a step of a [`Batch`], numbered from 0 in insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Step(usize);

impl Step {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

/// Expression tree guarding a batch step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// The step ran and succeeded.
    Ok(Step),
    /// The step ran and failed.
    Error(Step),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    /// The stream is outside an explicit transaction.
    IsAutocommit,
}

impl Condition {
    pub fn ok(step: Step) -> Self {
        Self::Ok(step)
    }

    pub fn error(step: Step) -> Self {
        Self::Error(step)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(condition: Condition) -> Self {
        Self::Not(Box::new(condition))
    }

    pub fn and(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::And(conditions.into_iter().collect())
    }

    pub fn or(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self::Or(conditions.into_iter().collect())
    }

    pub fn is_autocommit() -> Self {
        Self::IsAutocommit
    }

    /// Lowers the tree to its wire form. Compound nodes carry their operands
    /// under `step`.
    pub(crate) fn to_wire(&self) -> BatchCond {
        match self {
            Self::Ok(step) => BatchCond::Ok { step: step.index() },
            Self::Error(step) => BatchCond::Error { step: step.index() },
            Self::Not(inner) => BatchCond::Not {
                step: Box::new(inner.to_wire()),
            },
            Self::And(items) => BatchCond::And {
                step: items.iter().map(Self::to_wire).collect(),
            },
            Self::Or(items) => BatchCond::Or {
                step: items.iter().map(Self::to_wire).collect(),
            },
            Self::IsAutocommit => BatchCond::IsAutocommit,
        }
    }

    /// Highest step index referenced anywhere in the tree.
    fn max_step(&self) -> Option<usize> {
        match self {
            Self::Ok(step) | Self::Error(step) => Some(step.index()),
            Self::Not(inner) => inner.max_step(),
            Self::And(items) | Self::Or(items) => items.iter().filter_map(Self::max_step).max(),
            Self::IsAutocommit => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct BatchStep {
    condition: Option<Condition>,
    statement: Statement,
}

/// Ordered list of steps sent as one `batch` request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    steps: Vec<BatchStep>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Adds an unconditional row-returning step.
    pub fn add_step<P: Into<Params>>(&mut self, sql: impl Into<String>, params: P) -> Step {
        self.push(None, Statement::query(sql, params))
    }

    pub fn add_statement(&mut self, statement: Statement) -> Step {
        self.push(None, statement)
    }

    /// Adds a step that runs only when `condition` holds.
    ///
    /// The condition may only reference steps added before this one.
    pub fn add_conditional_step<P: Into<Params>>(
        &mut self,
        condition: Condition,
        sql: impl Into<String>,
        params: P,
    ) -> Result<Step> {
        self.add_conditional_statement(condition, Statement::query(sql, params))
    }

    pub fn add_conditional_statement(
        &mut self,
        condition: Condition,
        statement: Statement,
    ) -> Result<Step> {
        let next = self.steps.len();
        if let Some(referenced) = condition.max_step().filter(|&index| index >= next) {
            return Err(HranaError::InvalidArgument(format!(
                "condition of step {next} references step {referenced}, which is not an earlier step"
            )));
        }
        Ok(self.push(Some(condition), statement))
    }

    fn push(&mut self, condition: Option<Condition>, statement: Statement) -> Step {
        let step = Step(self.steps.len());
        self.steps.push(BatchStep {
            condition,
            statement,
        });
        step
    }

    pub(crate) fn to_wire(&self) -> Result<wire::Batch> {
        let steps = self
            .steps
            .iter()
            .map(|step| {
                Ok(wire::BatchStep {
                    condition: step.condition.as_ref().map(Condition::to_wire),
                    stmt: build_stmt(&step.statement)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(wire::Batch { steps })
    }

    /// Sends the batch on `stream` and returns the per-step outcomes.
    pub fn execute(&self, stream: &mut Stream) -> Result<BatchOutcome> {
        let results = stream.execute_batch(self.to_wire()?)?;
        if results.len() != self.steps.len() {
            return Err(HranaError::Decode(format!(
                "batch result count mismatch: expected {}, got {}",
                self.steps.len(),
                results.len()
            )));
        }
        Ok(BatchOutcome {
            results,
            fetch_mode: FetchMode::default(),
        })
    }
}

/// Per-step outcomes of an executed [`Batch`].
#[derive(Clone, Debug, PartialEq)]
pub struct BatchOutcome {
    results: BatchResults,
    fetch_mode: FetchMode,
}

impl BatchOutcome {
    pub fn with_fetch_mode(mut self, fetch_mode: FetchMode) -> Self {
        self.fetch_mode = fetch_mode;
        self
    }

    /// Rows produced by `step`.
    ///
    /// A failed step returns its error when `throw_on_error` is set and
    /// `Ok(None)` otherwise. A skipped step is always `Ok(None)`.
    pub fn result_for_step(&self, step: Step, throw_on_error: bool) -> Result<Option<Rows>> {
        let index = self.check_range(step)?;
        if let Some(result) = &self.results.step_results[index] {
            return Ok(Some(Rows::new(result.clone(), self.fetch_mode)));
        }
        match &self.results.step_errors[index] {
            Some(error) if throw_on_error => Err(error.clone().into_error()),
            _ => Ok(None),
        }
    }

    pub fn error_for_step(&self, step: Step) -> Result<Option<&ServerError>> {
        let index = self.check_range(step)?;
        Ok(self.results.step_errors[index].as_ref())
    }

    pub fn was_skipped(&self, step: Step) -> bool {
        self.results.was_skipped(step.index())
    }

    pub fn results(&self) -> &BatchResults {
        &self.results
    }

    pub fn into_results(self) -> BatchResults {
        self.results
    }

    fn check_range(&self, step: Step) -> Result<usize> {
        let index = step.index();
        if index >= self.results.len() {
            return Err(HranaError::InvalidArgument(format!(
                "step {index} is outside a batch of {} steps",
                self.results.len()
            )));
        }
        Ok(index)
    }
}
