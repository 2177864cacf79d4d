/// Test Sequencer - Language-Agnostic Grading Loop
///
/// **Core Responsibility:**
/// Run an ordered list of assertions against one prepared context and turn
/// each verdict into a `TestResult`.
///
/// **Rules:**
/// - Tests run strictly in authored order
/// - The first failure (false result or raised error) stops the run
/// - A raised error is reported as `<kind>: <message>`
/// - A false result uses the authored failure message, or
///   `Test returned false` when none was written
/// - `success` is true only when every test ran and passed
///
/// Knows nothing about languages; adapters hand it an `evaluate` closure
/// (synchronous adapters) or feed it verdicts one at a time (Python).

use crate::error::EvalError;
use proctor_common::{ExecutionOutcome, Test, TestResult};
use std::ops::ControlFlow;
use tracing::debug;

pub const DEFAULT_FAILURE_MESSAGE: &str = "Test returned false";

/// Accumulates results for one run
#[derive(Debug, Default)]
pub struct TestSequencer {
    results: Vec<TestResult>,
    halted: bool,
}

impl TestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the verdict for `test`.
    ///
    /// Returns `ControlFlow::Break` once the run must stop.
    pub fn record(&mut self, test: &Test, verdict: Result<bool, EvalError>) -> ControlFlow<()> {
        let (passed, message) = match verdict {
            Ok(true) => (true, None),
            Ok(false) => (false, Some(failure_message(test))),
            Err(err) => (false, Some(err.to_string())),
        };

        debug!(test_id = %test.id, passed, "Test evaluated");

        self.results.push(TestResult {
            id: test.id.clone(),
            description: test.description.clone(),
            passed,
            message,
        });

        if passed {
            ControlFlow::Continue(())
        } else {
            self.halted = true;
            ControlFlow::Break(())
        }
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Close the run
    pub fn finish(self) -> ExecutionOutcome {
        if self.halted {
            ExecutionOutcome::failed(self.results)
        } else {
            ExecutionOutcome::passed(self.results)
        }
    }
}

fn failure_message(test: &Test) -> String {
    if test.failure_message.trim().is_empty() {
        DEFAULT_FAILURE_MESSAGE.to_string()
    } else {
        test.failure_message.clone()
    }
}

/// Run `tests` in order, stopping at the first failure
///
/// ## Arguments
/// * `tests` - Ordered test list
/// * `evaluate` - Evaluates one assertion against the prepared context
pub fn run_tests<F>(tests: &[Test], mut evaluate: F) -> ExecutionOutcome
where
    F: FnMut(&str) -> Result<bool, EvalError>,
{
    let mut sequencer = TestSequencer::new();
    for test in tests {
        let verdict = evaluate(&test.assertion);
        if sequencer.record(test, verdict).is_break() {
            break;
        }
    }
    sequencer.finish()
}
