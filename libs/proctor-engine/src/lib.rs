pub mod adapters;
pub mod css;
pub mod dom;
pub mod error;
pub mod executor;
pub mod page;
pub mod runtime;
pub mod sandbox;
pub mod sequencer;
pub mod sources;

mod executor_tests;

pub use error::{EvalError, PrepareError, RuntimeLoadError};
pub use executor::Executor;
pub use page::Page;
pub use runtime::python::PythonError;
pub use runtime::{LoaderStatus, RuntimeLauncher, RuntimeLoader};
