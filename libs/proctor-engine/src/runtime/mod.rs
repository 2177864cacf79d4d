/// Runtime Loader - Lazy, Shared Start-up of Heavyweight Interpreters
///
/// **Core Responsibility:**
/// Launch an expensive runtime at most once at a time and hand the same
/// instance to every caller until it stops being usable.
///
/// **State Machine:**
/// ```text
/// Unloaded --prewarm--> Loading --ok--> Ready
///                          |
///                          +--err--> Failed --prewarm--> Loading
/// Ready (no longer usable) --> Unloaded
/// ```
///
/// **Guarantees:**
/// - Concurrent `prewarm()`/`get()` calls share one in-flight load
/// - The load keeps running on the tokio runtime when callers stop waiting
/// - A failed load reaches every waiter; nothing retries on its own
pub mod python;

use crate::error::RuntimeLoadError;
use async_trait::async_trait;
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{info, warn};

pub use python::{PythonLauncher, PythonRuntime};

/// Starts one runtime instance
#[async_trait]
pub trait RuntimeLauncher: Send + Sync + 'static {
    type Runtime: Send + Sync + 'static;

    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn launch(&self) -> Result<Self::Runtime, RuntimeLoadError>;

    /// Whether a loaded runtime can still serve requests
    fn is_usable(&self, _runtime: &Self::Runtime) -> bool {
        true
    }
}

/// A load shared by every caller waiting on it
pub type LoadFuture<R> = Shared<BoxFuture<'static, Result<Arc<R>, RuntimeLoadError>>>;

enum LoaderState<R> {
    Unloaded,
    Loading(LoadFuture<R>),
    Ready(Arc<R>),
    Failed(RuntimeLoadError),
}

/// Snapshot of the loader state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderStatus {
    Unloaded,
    Loading,
    Ready,
    Failed(String),
}

impl fmt::Display for LoaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderStatus::Unloaded => f.write_str("unloaded"),
            LoaderStatus::Loading => f.write_str("loading"),
            LoaderStatus::Ready => f.write_str("ready"),
            LoaderStatus::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

pub struct RuntimeLoader<L: RuntimeLauncher> {
    launcher: Arc<L>,
    state: Arc<Mutex<LoaderState<L::Runtime>>>,
}

impl<L: RuntimeLauncher> RuntimeLoader<L> {
    pub fn new(launcher: L) -> Self {
        Self {
            launcher: Arc::new(launcher),
            state: Arc::new(Mutex::new(LoaderState::Unloaded)),
        }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Start loading if nothing is loaded or loading.
    ///
    /// Every call made while a load is in flight gets the same future. A
    /// ready runtime resolves immediately.
    pub fn prewarm(&self) -> LoadFuture<L::Runtime> {
        let mut state = self.lock();
        match &*state {
            LoaderState::Ready(runtime) => {
                return future::ready(Ok(Arc::clone(runtime))).boxed().shared();
            }
            LoaderState::Loading(load) => return load.clone(),
            LoaderState::Unloaded | LoaderState::Failed(_) => {}
        }

        let load = self.start_load();
        *state = LoaderState::Loading(load.clone());
        drop(state);

        // Drive the load even if every caller drops its future
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(load.clone());
        }
        load
    }

    /// The ready runtime, loading it first when needed
    pub async fn get(&self) -> Result<Arc<L::Runtime>, RuntimeLoadError> {
        self.prewarm().await
    }

    /// Non-blocking readiness check
    pub fn is_ready(&self) -> bool {
        matches!(&*self.lock(), LoaderState::Ready(_))
    }

    pub fn status(&self) -> LoaderStatus {
        match &*self.lock() {
            LoaderState::Unloaded => LoaderStatus::Unloaded,
            LoaderState::Loading(_) => LoaderStatus::Loading,
            LoaderState::Ready(_) => LoaderStatus::Ready,
            LoaderState::Failed(err) => LoaderStatus::Failed(err.to_string()),
        }
    }

    /// Lock the state, discarding a ready runtime that can no longer serve
    fn lock(&self) -> MutexGuard<'_, LoaderState<L::Runtime>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let stale = matches!(&*state, LoaderState::Ready(runtime) if !self.launcher.is_usable(runtime));
        if stale {
            warn!(runtime = self.launcher.name(), "Runtime is no longer usable, discarding it");
            *state = LoaderState::Unloaded;
        }
        state
    }

    fn start_load(&self) -> LoadFuture<L::Runtime> {
        let launcher = Arc::clone(&self.launcher);
        let slot = Arc::clone(&self.state);

        async move {
            let name = launcher.name();
            info!(runtime = name, "Loading runtime");
            let started = Instant::now();
            let result = launcher.launch().await.map(Arc::new);

            {
                let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);
                match &result {
                    Ok(runtime) => {
                        info!(
                            runtime = name,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Runtime ready"
                        );
                        *state = LoaderState::Ready(Arc::clone(runtime));
                    }
                    Err(err) => {
                        warn!(runtime = name, error = %err, "Runtime failed to load");
                        *state = LoaderState::Failed(err.clone());
                    }
                }
            }

            result
        }
        .boxed()
        .shared()
    }
}
