use thiserror::Error;

pub const SYNTAX_ERROR: &str = "SyntaxError";
pub const REFERENCE_ERROR: &str = "ReferenceError";
pub const TYPE_ERROR: &str = "TypeError";
pub const RANGE_ERROR: &str = "RangeError";
pub const TIMEOUT_ERROR: &str = "TimeoutError";
pub const GENERIC_ERROR: &str = "Error";
pub const INTERNAL_ERROR: &str = "InternalError";

/// A failure raised while running submitted code or an assertion.
///
/// Rendered as `<kind>: <message>`, the shape both global load errors and
/// per-test failure messages use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct EvalError {
    pub kind: String,
    pub message: String,
}

impl EvalError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(SYNTAX_ERROR, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TIMEOUT_ERROR, message)
    }

    /// A fault in the engine rather than in the submission
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

/// The dynamic-language runtime could not be started
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuntimeLoadError {
    message: String,
}

impl RuntimeLoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Reasons an adapter could not build an evaluation context.
///
/// Every variant becomes `ExecutionOutcome::error`; no test runs.
#[derive(Debug, Clone, Error)]
pub enum PrepareError {
    #[error("No {language} file found in this challenge.")]
    MissingFile { language: &'static str },

    #[error("{0}")]
    Load(EvalError),

    #[error("Parse Error: {0}")]
    Parse(String),

    #[error("Could not load Python runtime: {0}")]
    Runtime(RuntimeLoadError),

    #[error("Submission is {size} bytes, over the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

impl From<EvalError> for PrepareError {
    fn from(err: EvalError) -> Self {
        PrepareError::Load(err)
    }
}

impl From<RuntimeLoadError> for PrepareError {
    fn from(err: RuntimeLoadError) -> Self {
        PrepareError::Runtime(err)
    }
}
