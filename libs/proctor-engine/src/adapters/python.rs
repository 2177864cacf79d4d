// Python adapter: the submission runs in a fresh namespace on the shared worker
use crate::error::{EvalError, PrepareError};
use crate::runtime::{PythonLauncher, RuntimeLoader};
use crate::sequencer::TestSequencer;
use proctor_common::{ExecutionOutcome, FileMap, Language, Test};
use tracing::{debug, warn};

pub struct PythonAdapter<'l> {
    loader: &'l RuntimeLoader<PythonLauncher>,
}

impl<'l> PythonAdapter<'l> {
    pub fn new(loader: &'l RuntimeLoader<PythonLauncher>) -> Self {
        Self { loader }
    }

    /// Load the submission, then evaluate each assertion as a bare expression.
    ///
    /// The worker is held for the whole request, so no other submission can
    /// interleave with this one.
    pub async fn run(&self, files: &FileMap, tests: &[Test]) -> ExecutionOutcome {
        let Some((filename, source)) = files.first_for(Language::Python) else {
            return load_failed(PrepareError::MissingFile { language: "Python" });
        };

        let runtime = match self.loader.get().await {
            Ok(runtime) => runtime,
            Err(err) => return load_failed(err.into()),
        };

        let mut session = runtime.session().await;
        debug!(file = filename, namespace = %session.namespace(), "Loading Python submission");
        if let Err(err) = session.exec(source).await {
            return load_failed(EvalError::from(err).into());
        }

        let mut sequencer = TestSequencer::new();
        for test in tests {
            let verdict = session.eval(&test.assertion).await.map_err(EvalError::from);
            if sequencer.record(test, verdict).is_break() {
                break;
            }
        }
        sequencer.finish()
    }
}

fn load_failed(err: PrepareError) -> ExecutionOutcome {
    warn!(error = %err, "Submission failed to load");
    ExecutionOutcome::load_error(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::python::python_available;
    use proctor_common::config::PythonConfig;

    #[tokio::test]
    async fn test_missing_file_does_not_start_the_worker() {
        let loader = RuntimeLoader::new(PythonLauncher::new(PythonConfig::default()));
        let files: FileMap = [("notes.md", "")].into_iter().collect();

        let outcome = PythonAdapter::new(&loader).run(&files, &[Test::new("t", "True")]).await;
        assert_eq!(outcome.error.as_deref(), Some("No Python file found in this challenge."));
        assert!(!loader.is_ready());
    }

    #[tokio::test]
    async fn test_unavailable_interpreter_is_a_global_error() {
        let config = PythonConfig {
            interpreter: "proctor-no-such-python".to_string(),
            ..PythonConfig::default()
        };
        let loader = RuntimeLoader::new(PythonLauncher::new(config));
        let files: FileMap = [("app.py", "x = 1")].into_iter().collect();

        let outcome = PythonAdapter::new(&loader).run(&files, &[Test::new("t", "x == 1")]).await;
        assert!(outcome.results.is_empty());
        let error = outcome.error.unwrap();
        assert!(error.starts_with("Could not load Python runtime: failed to start"), "{}", error);
    }

    #[tokio::test]
    async fn test_raised_at_load_is_global() {
        if !python_available() {
            return;
        }
        let loader = RuntimeLoader::new(PythonLauncher::new(PythonConfig::default()));
        let files: FileMap = [("app.py", "raise ValueError('nope')")].into_iter().collect();

        let outcome = PythonAdapter::new(&loader).run(&files, &[Test::new("t", "True")]).await;
        assert_eq!(outcome.error.as_deref(), Some("ValueError: nope"));
        assert!(outcome.results.is_empty());
    }
}
