//! Ordered step execution with per-step failure capture.
//!
//! Activation, edits and teardown are lists of steps that must all be
//! attempted. A step that fails (or whose driver panics) is logged and
//! recorded, and the next step runs anyway.

use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};

use crate::{
    alarm::AlarmId,
    error::{ChannelError, Error},
};

/// One step that did not complete.
#[derive(Debug)]
pub struct StepFailure {
    pub step: &'static str,
    pub error: ChannelError,
}

impl From<StepFailure> for Error {
    fn from(failure: StepFailure) -> Self {
        Self::ChannelDriverFailure {
            step: failure.step,
            source: failure.error,
        }
    }
}

/// Outcome of running a step list, for one alarm or for the whole session.
#[derive(Debug)]
pub struct StepReport {
    alarm: Option<AlarmId>,
    completed: Vec<&'static str>,
    failures: Vec<StepFailure>,
}

pub type ActivationReport = StepReport;
pub type EditReport = StepReport;
pub type TeardownReport = StepReport;

impl StepReport {
    #[must_use]
    pub const fn new(alarm: AlarmId) -> Self {
        Self {
            alarm: Some(alarm),
            completed: vec![],
            failures: vec![],
        }
    }

    /// Report for steps that concern every alarm at once.
    #[must_use]
    pub const fn global() -> Self {
        Self {
            alarm: None,
            completed: vec![],
            failures: vec![],
        }
    }

    fn scope(&self) -> String {
        self.alarm
            .map_or_else(|| "all alarms".to_string(), |id| format!("alarm {id}"))
    }

    /// Runs one step, capturing its error or panic. Returns whether it succeeded.
    pub(crate) fn run<F>(&mut self, step: &'static str, f: F) -> bool
    where
        F: FnOnce() -> Result<(), ChannelError>,
    {
        let outcome = panic::catch_unwind(AssertUnwindSafe(f))
            .unwrap_or_else(|payload| Err(ChannelError::Panicked(panic_message(&*payload))));
        match outcome {
            Ok(()) => {
                debug!("{}: {step} done", self.scope());
                self.completed.push(step);
                true
            }
            Err(error) => {
                warn!("{}: {step} failed, continuing: {error}", self.scope());
                self.failures.push(StepFailure { step, error });
                false
            }
        }
    }

    #[must_use]
    pub const fn alarm(&self) -> Option<AlarmId> {
        self.alarm
    }

    /// Steps that ran to completion, in order.
    #[must_use]
    pub fn completed(&self) -> &[&'static str] {
        &self.completed
    }

    #[must_use]
    pub fn failures(&self) -> &[StepFailure] {
        &self.failures
    }

    #[must_use]
    pub fn failed(&self, step: &str) -> bool {
        self.failures.iter().any(|f| f.step == step)
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turns the report into its failures, as crate errors.
    #[must_use]
    pub fn into_errors(self) -> Vec<Error> {
        self.failures.into_iter().map(Error::from).collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
