/// Python Runtime - Persistent Interpreter Worker
///
/// **Core Responsibility:**
/// Keep one `python3` process alive and talk to it over newline-delimited
/// JSON on its stdin/stdout.
///
/// **Protocol:**
/// - On start the worker sends `{"ok": true, "ready": true, "version": ...}`
/// - `{"op": "exec", "ns", "source"}` runs a submission in a new namespace
///   and drops every older one
/// - `{"op": "eval", "ns", "expr"}` evaluates one expression in it
/// - Every reply carries the captured `stdout`; failures carry the
///   exception type in `kind` and its text in `message`
///
/// **Failure Handling:**
/// - Each request has a hard timeout; on expiry the process is killed and
///   the runtime is marked poisoned so the loader replaces it
/// - I/O or protocol failures poison the runtime the same way
use super::RuntimeLauncher;
use crate::error::{EvalError, RuntimeLoadError, GENERIC_ERROR};
use async_trait::async_trait;
use proctor_common::config::PythonConfig;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

const BOOTSTRAP: &str = include_str!("bootstrap.py");

#[derive(Debug, Error)]
pub enum PythonError {
    /// The submission or assertion raised an exception
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },

    #[error("Python worker did not answer within {0} ms")]
    Timeout(u64),

    #[error("Python worker I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Python worker sent an invalid reply: {0}")]
    Protocol(String),

    #[error("Python worker has exited")]
    Closed,
}

impl From<PythonError> for EvalError {
    fn from(err: PythonError) -> Self {
        match err {
            PythonError::Raised { kind, message } => EvalError::new(kind, message),
            PythonError::Timeout(ms) => {
                EvalError::timeout(format!("code did not finish within {} ms", ms))
            }
            other => EvalError::internal(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Request<'a> {
    Exec { ns: Uuid, source: &'a str },
    Eval { ns: Uuid, expr: &'a str },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Reply {
    ok: bool,
    ready: bool,
    version: Option<String>,
    passed: bool,
    repr: Option<String>,
    kind: Option<String>,
    message: Option<String>,
    stdout: String,
}

struct Channel {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

pub struct PythonRuntime {
    channel: Mutex<Channel>,
    version: String,
    request_timeout: Duration,
    poisoned: AtomicBool,
}

impl PythonRuntime {
    /// Interpreter version reported in the handshake
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Exclusive access to the worker for one request.
    ///
    /// The session owns a namespace id nobody else has used.
    pub async fn session(&self) -> PythonSession<'_> {
        PythonSession {
            runtime: self,
            channel: self.channel.lock().await,
            namespace: Uuid::new_v4(),
        }
    }

    fn poison(&self, child: &mut Child, reason: &PythonError) {
        self.poisoned.store(true, Ordering::SeqCst);
        warn!(error = %reason, "Discarding Python worker");
        if let Err(err) = child.start_kill() {
            debug!(error = %err, "Python worker was already gone");
        }
    }
}

pub struct PythonSession<'r> {
    runtime: &'r PythonRuntime,
    channel: MutexGuard<'r, Channel>,
    namespace: Uuid,
}

impl PythonSession<'_> {
    pub fn namespace(&self) -> Uuid {
        self.namespace
    }

    /// Run the submission in this session's fresh namespace
    pub async fn exec(&mut self, source: &str) -> Result<(), PythonError> {
        let ns = self.namespace;
        self.request(&Request::Exec { ns, source }).await?;
        Ok(())
    }

    /// Evaluate an expression; passes only when the value `is True`
    pub async fn eval(&mut self, expr: &str) -> Result<bool, PythonError> {
        let ns = self.namespace;
        let reply = self.request(&Request::Eval { ns, expr }).await?;
        debug!(value = reply.repr.as_deref().unwrap_or(""), passed = reply.passed, "Expression evaluated");
        Ok(reply.passed)
    }

    async fn request(&mut self, request: &Request<'_>) -> Result<Reply, PythonError> {
        if self.runtime.is_poisoned() {
            return Err(PythonError::Closed);
        }

        let mut line = serde_json::to_string(request).map_err(|e| PythonError::Protocol(e.to_string()))?;
        line.push('\n');

        let timeout = self.runtime.request_timeout;
        let Channel { child, stdin, lines } = &mut *self.channel;

        let reply = match tokio::time::timeout(timeout, exchange(stdin, lines, &line)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                self.runtime.poison(child, &err);
                return Err(err);
            }
            Err(_) => {
                let err = PythonError::Timeout(timeout.as_millis() as u64);
                self.runtime.poison(child, &err);
                return Err(err);
            }
        };

        if !reply.stdout.is_empty() {
            debug!(target: "proctor::submission", output = reply.stdout.trim_end(), "Python output");
        }

        if reply.ok {
            Ok(reply)
        } else {
            Err(PythonError::Raised {
                kind: reply.kind.unwrap_or_else(|| GENERIC_ERROR.to_string()),
                message: reply.message.unwrap_or_default(),
            })
        }
    }
}

async fn exchange(
    stdin: &mut ChildStdin,
    lines: &mut Lines<BufReader<ChildStdout>>,
    line: &str,
) -> Result<Reply, PythonError> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;

    let raw = lines.next_line().await?.ok_or(PythonError::Closed)?;
    serde_json::from_str(&raw).map_err(|e| PythonError::Protocol(e.to_string()))
}

/// Starts the configured interpreter with the embedded worker script
pub struct PythonLauncher {
    config: PythonConfig,
}

impl PythonLauncher {
    pub fn new(config: PythonConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RuntimeLauncher for PythonLauncher {
    type Runtime = PythonRuntime;

    fn name(&self) -> &'static str {
        "python"
    }

    async fn launch(&self) -> Result<PythonRuntime, RuntimeLoadError> {
        let interpreter = &self.config.interpreter;
        let mut child = Command::new(interpreter)
            .args(&self.config.args)
            .arg("-c")
            .arg(BOOTSTRAP)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RuntimeLoadError::new(format!("failed to start {}: {}", interpreter, e)))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "proctor::submission", "python stderr: {}", line);
                }
            });
        }

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RuntimeLoadError::new("interpreter stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RuntimeLoadError::new("interpreter stdout is not piped"))?;
        let mut lines = BufReader::new(stdout).lines();

        let load_timeout = Duration::from_millis(self.config.load_timeout_ms);
        let handshake = match tokio::time::timeout(load_timeout, lines.next_line()).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                return Err(RuntimeLoadError::new(format!("{} exited before it was ready", interpreter)));
            }
            Ok(Err(err)) => {
                return Err(RuntimeLoadError::new(format!("failed to read from {}: {}", interpreter, err)));
            }
            Err(_) => {
                return Err(RuntimeLoadError::new(format!(
                    "{} was not ready within {} ms",
                    interpreter, self.config.load_timeout_ms
                )));
            }
        };

        let reply: Reply = serde_json::from_str(&handshake).map_err(|e| {
            RuntimeLoadError::new(format!("unexpected handshake from {}: {}", interpreter, e))
        })?;
        if !reply.ready {
            return Err(RuntimeLoadError::new(format!("{} did not report ready", interpreter)));
        }

        let version = reply.version.unwrap_or_else(|| "unknown".to_string());
        info!(interpreter = %interpreter, version = %version, "Python worker started");

        Ok(PythonRuntime {
            channel: Mutex::new(Channel { child, stdin, lines }),
            version,
            request_timeout: Duration::from_millis(self.config.request_timeout_ms),
            poisoned: AtomicBool::new(false),
        })
    }

    fn is_usable(&self, runtime: &PythonRuntime) -> bool {
        !runtime.is_poisoned()
    }
}

/// Whether a `python3` interpreter can be started here
#[cfg(test)]
pub(crate) fn python_available() -> bool {
    std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
