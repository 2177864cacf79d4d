/// Language Adapters
///
/// **Core Responsibility:**
/// Turn submitted files into an evaluation context, then evaluate
/// assertions against it one at a time.
///
/// **Contract:**
/// - `prepare` runs once per request; any failure is a global error and no
///   test runs
/// - `evaluate` runs once per assertion, in order, against the same context
/// - The context lives for exactly one request and is dropped afterwards
///   (the style adapter's fixture is detached at that point)
///
/// Rhai, HTML and CSS are synchronous and implement `Adapter`. Python needs
/// the async runtime loader and lives in `python`.
pub mod markup;
pub mod python;
pub mod script;
pub mod style;

use crate::error::{EvalError, PrepareError};
use crate::sequencer;
use proctor_common::{ExecutionOutcome, FileMap, Test};
use tracing::warn;

pub use markup::MarkupAdapter;
pub use python::PythonAdapter;
pub use script::ScriptAdapter;
pub use style::StyleAdapter;

pub trait Adapter {
    type Context;

    /// Build the evaluation context from the submitted files
    fn prepare(&self, files: &FileMap) -> Result<Self::Context, PrepareError>;

    /// Evaluate one assertion
    fn evaluate(&self, context: &mut Self::Context, assertion: &str) -> Result<bool, EvalError>;
}

/// Prepare a context and run every test against it
pub fn run<A: Adapter>(adapter: &A, files: &FileMap, tests: &[Test]) -> ExecutionOutcome {
    let mut context = match adapter.prepare(files) {
        Ok(context) => context,
        Err(err) => {
            warn!(error = %err, "Submission failed to load");
            return ExecutionOutcome::load_error(err.to_string());
        }
    };

    sequencer::run_tests(tests, |assertion| adapter.evaluate(&mut context, assertion))
}

/// Reject submissions over the configured size
pub fn check_size(files: &FileMap, limit: usize) -> Result<(), PrepareError> {
    let size = files.total_bytes();
    if size > limit {
        return Err(PrepareError::TooLarge { size, limit });
    }
    Ok(())
}
