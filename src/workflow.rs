/*!
workflow.rs - named step sequence executed against a shared mutable context.

A `Workflow<T>` holds step functions keyed by name plus a step order (the
registration order unless `order(...)` overrides it). `start` walks the order
as an explicit loop:

  1. a fresh `StepRecord` becomes `current` and is stashed in `history`
  2. the step runs with `&mut T` (caller fields only; bookkeeping is out of reach)
  3. Ok(Next::Goto(name))  -> jump to the first position of `name` in the order
     Ok(Next::Continue)    -> next position, or SUCCESS after the last one
     Err(e)                -> record failed, FAILED
  4. `ended_at` is stamped and `history[name]` finalized before moving on

Unknown step names and an empty order are rejected before anything runs.
A step visited twice overwrites its history entry; `trail` keeps every visit.
*/

use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use thiserror::Error;

use crate::error::CliError;

/// Transition requested by a step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Next {
    #[default]
    Continue,
    Goto(String),
}

impl Next {
    pub fn goto(step: impl Into<String>) -> Self {
        Next::Goto(step.into())
    }
}

pub type StepFuture<'a> = BoxFuture<'a, anyhow::Result<Next>>;

type StepFn<T> = Box<dyn for<'a> Fn(&'a mut T) -> StepFuture<'a> + Send + Sync>;

/// Timing and outcome of one visit to one step.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StepRecord {
    pub step_name: String,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    pub succeeded: Option<bool>,
    pub error: Option<String>,
}

impl StepRecord {
    fn begin(step_name: &str) -> Self {
        Self {
            step_name: step_name.to_string(),
            started_at: SystemTime::now(),
            ended_at: None,
            succeeded: None,
            error: None,
        }
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.ended_at?.duration_since(self.started_at).ok()
    }
}

/// Caller data plus the engine's bookkeeping.
#[derive(Debug, Clone)]
pub struct WorkflowContext<T> {
    pub data: T,
    step_names: Vec<String>,
    current: Option<StepRecord>,
    history: HashMap<String, StepRecord>,
    succeeded: Option<bool>,
    trail: Vec<String>,
}

impl<T> WorkflowContext<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            step_names: Vec::new(),
            current: None,
            history: HashMap::new(),
            succeeded: None,
            trail: Vec::new(),
        }
    }

    pub fn step_names(&self) -> &[String] {
        &self.step_names
    }

    /// The running step, or the failed one once the workflow has failed.
    pub fn current(&self) -> Option<&StepRecord> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &HashMap<String, StepRecord> {
        &self.history
    }

    pub fn record(&self, step: &str) -> Option<&StepRecord> {
        self.history.get(step)
    }

    /// `None` until the workflow settles.
    pub fn succeeded(&self) -> Option<bool> {
        self.succeeded
    }

    /// Every visited step in visit order, repeats included.
    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    pub fn into_data(self) -> T {
        self.data
    }

    fn reset(&mut self, order: Vec<String>) {
        self.step_names = order;
        self.current = None;
        self.history.clear();
        self.succeeded = None;
        self.trail.clear();
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Config(#[from] CliError),

    #[error("workflow step \"{step}\" failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: anyhow::Error,
    },
}

pub struct Workflow<T> {
    name: String,
    operators: Vec<(String, StepFn<T>)>,
    order: Option<Vec<String>>,
}

impl<T: Send> Workflow<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operators: Vec::new(),
            order: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add (or replace) a step implementation.
    pub fn step<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut T) -> StepFuture<'a> + Send + Sync + 'static,
    {
        let name = name.into();
        let f: StepFn<T> = Box::new(f);
        match self.operators.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = f,
            None => self.operators.push((name, f)),
        }
        self
    }

    /// Explicit step order; names may repeat.
    pub fn order<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn step_order(&self) -> Vec<String> {
        match &self.order {
            Some(order) => order.clone(),
            None => self.operators.iter().map(|(n, _)| n.clone()).collect(),
        }
    }

    /// Configuration check run by `start` before the first step.
    pub fn validate(&self) -> Result<(), CliError> {
        let order = self.step_order();
        if order.is_empty() {
            return Err(CliError::EmptyWorkflow);
        }
        if let Some(missing) = order.iter().find(|s| self.operator(s).is_none()) {
            return Err(CliError::UnimplementedStep {
                step: missing.clone(),
            });
        }
        Ok(())
    }

    fn operator(&self, name: &str) -> Option<&StepFn<T>> {
        self.operators
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }

    /// Run to SUCCESS (`Ok`) or FAILED (`Err`); `ctx` holds the history either way.
    pub async fn start(&self, ctx: &mut WorkflowContext<T>) -> Result<(), WorkflowError> {
        self.validate()?;
        let order = self.step_order();
        ctx.reset(order.clone());

        let mut position = 0;
        while let Some(step) = order.get(position) {
            let op = self.operator(step).ok_or_else(|| CliError::UnimplementedStep {
                step: step.clone(),
            })?;

            let mut record = StepRecord::begin(step);
            ctx.current = Some(record.clone());
            ctx.history.insert(step.clone(), record.clone());
            ctx.trail.push(step.clone());
            tracing::debug!(workflow = %self.name, step = %step, "step started");

            let outcome = op(&mut ctx.data).await;
            record.ended_at = Some(SystemTime::now());

            match outcome {
                Ok(next) => {
                    record.succeeded = Some(true);
                    tracing::debug!(workflow = %self.name, step = %step, elapsed = ?record.elapsed(), "step finished");
                    ctx.history.insert(step.clone(), record);
                    position = match next {
                        Next::Continue => position + 1,
                        Next::Goto(target) => match order.iter().position(|s| *s == target) {
                            Some(i) => i,
                            None => {
                                tracing::warn!(workflow = %self.name, step = %step, target = %target, "unknown goto target; continuing in order");
                                position + 1
                            }
                        },
                    };
                }
                Err(source) => {
                    record.succeeded = Some(false);
                    record.error = Some(format!("{source:#}"));
                    tracing::debug!(workflow = %self.name, step = %step, error = %format!("{source:#}"), "step failed");
                    ctx.history.insert(step.clone(), record.clone());
                    ctx.current = Some(record);
                    ctx.succeeded = Some(false);
                    return Err(WorkflowError::StepFailed {
                        step: step.clone(),
                        source,
                    });
                }
            }
        }

        ctx.current = None;
        ctx.succeeded = Some(true);
        Ok(())
    }
}
