//! Deferred test failures.
//!
//! Protocol violations that must not block the offending client are collected
//! here instead of failing the request. The test driver checks the list at
//! teardown, so a silent violation still fails the run.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use log::warn;
use thiserror::Error;

use crate::error::MockError;

#[derive(Clone, Debug, PartialEq)]
pub struct TestFailure {
    /// Route or URL the failure was observed on.
    pub context: String,
    pub error: MockError,
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.context, self.error.code(), self.error)
    }
}

/// Raised at teardown when failures were recorded.
#[derive(Debug, Error)]
#[error("Exceptions happened in mini_sentry: {}", render(.0))]
pub struct FailuresError(pub Vec<TestFailure>);

fn render(failures: &[TestFailure]) -> String {
    let rendered: Vec<String> = failures.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

#[derive(Clone, Default)]
pub struct TestFailures(Arc<Mutex<Vec<TestFailure>>>);

impl TestFailures {
    pub fn record(&self, context: impl Into<String>, error: MockError) {
        let failure = TestFailure {
            context: context.into(),
            error,
        };
        warn!("recording test failure: {}", failure);
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }

    pub fn snapshot(&self) -> Vec<TestFailure> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Removes and returns all recorded failures.
    pub fn take(&self) -> Vec<TestFailure> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    /// Drains the recorded failures, returning them as an error if there were any.
    pub fn check(&self) -> Result<(), FailuresError> {
        let failures = self.take();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(FailuresError(failures))
        }
    }
}
