/// Executor - Language Dispatch
///
/// **Core Responsibility:**
/// Accept a language key, the submitted files and the ordered tests, route
/// them to the matching adapter and hand back its `ExecutionOutcome`.
///
/// **Architecture:**
/// 1. Parse the language key into `Language` (unknown ⇒ dispatch error)
/// 2. Reject oversized submissions
/// 3. Run the adapter (Rhai, HTML and CSS synchronously, Python on the
///    shared worker)
/// 4. Convert any panic into a global `InternalError`
///
/// The executor owns the state that outlives a request: the host `Page`
/// style fixtures are mounted on and the Python runtime loader.
use crate::adapters::{self, MarkupAdapter, PythonAdapter, ScriptAdapter, StyleAdapter};
use crate::error::EvalError;
use crate::page::Page;
use crate::runtime::{LoadFuture, LoaderStatus, PythonLauncher, PythonRuntime, RuntimeLoader};
use futures_util::FutureExt;
use proctor_common::{EngineConfig, ExecutionOutcome, ExecutionRequest, FileMap, Language, Test};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

pub struct Executor {
    config: EngineConfig,
    page: Page,
    python: RuntimeLoader<PythonLauncher>,
}

impl Executor {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_page(config, Page::blank())
    }

    /// Executor whose style fixtures mount on an existing host page
    pub fn with_page(config: EngineConfig, page: Page) -> Self {
        let python = RuntimeLoader::new(PythonLauncher::new(config.python.clone()));
        Self { config, page, python }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Grade a submission against `tests`.
    ///
    /// Never fails: every problem ends up in the returned outcome.
    ///
    /// ## Arguments
    /// * `language` - Language key, e.g. `rhai`, `html`, `css`, `python`
    /// * `files` - Submitted files by name
    /// * `tests` - Tests in execution order
    pub async fn execute(&self, language: &str, files: &FileMap, tests: &[Test]) -> ExecutionOutcome {
        match language.parse::<Language>() {
            Ok(language) => self.execute_language(language, files, tests).await,
            Err(_) => {
                warn!(language, "No executor available");
                ExecutionOutcome::load_error(format!("No executor available for language: {}", language))
            }
        }
    }

    /// Grade a request, logging under a span carrying its id
    pub async fn execute_request(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let span = info_span!("execution", request_id = %request.id, language = %request.language);
        self.execute_language(request.language, &request.files, &request.tests)
            .instrument(span)
            .await
    }

    pub async fn execute_language(
        &self,
        language: Language,
        files: &FileMap,
        tests: &[Test],
    ) -> ExecutionOutcome {
        info!(
            language = %language,
            files = files.len(),
            tests = tests.len(),
            "Starting execution"
        );
        let started = Instant::now();

        let outcome = match AssertUnwindSafe(self.dispatch(language, files, tests))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => {
                let err = EvalError::internal(panic_message(payload.as_ref()));
                warn!(language = %language, error = %err, "Adapter panicked");
                ExecutionOutcome::load_error(err.to_string())
            }
        };

        info!(
            language = %language,
            success = outcome.success,
            passed = outcome.passed_count(),
            tests = tests.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Execution finished"
        );
        outcome
    }

    async fn dispatch(&self, language: Language, files: &FileMap, tests: &[Test]) -> ExecutionOutcome {
        if let Err(err) = adapters::check_size(files, self.config.max_source_bytes) {
            warn!(error = %err, "Submission rejected");
            return ExecutionOutcome::load_error(err.to_string());
        }

        match language {
            Language::Rhai => adapters::run(&ScriptAdapter::new(&self.config.script), files, tests),
            Language::Html => adapters::run(&MarkupAdapter::new(&self.config), files, tests),
            Language::Css => adapters::run(&StyleAdapter::new(&self.page, &self.config), files, tests),
            Language::Python => PythonAdapter::new(&self.python).run(files, tests).await,
        }
    }

    /// Start the Python worker in the background.
    ///
    /// Awaiting the returned future is optional; the load proceeds either way.
    pub fn prewarm_python(&self) -> LoadFuture<PythonRuntime> {
        self.python.prewarm()
    }

    pub fn is_python_ready(&self) -> bool {
        self.python.is_ready()
    }

    pub fn python_status(&self) -> LoaderStatus {
        self.python.status()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "adapter panicked".to_string()
    }
}
