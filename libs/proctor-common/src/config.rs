// Engine configuration for Proctor
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default location of the engine configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/engine.json";

/// Resource limits applied to every embedded script run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 64,
            max_expr_depth: 128,
            max_string_size: 1024 * 1024,
            max_array_size: 100_000,
            max_map_size: 10_000,
        }
    }
}

/// Style fixture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Fixed fixture width, the base for media queries
    pub fixture_width_px: u32,
    /// Root font size used to resolve `rem`
    pub root_font_size_px: f64,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            fixture_width_px: 1280,
            root_font_size_px: 16.0,
        }
    }
}

/// Python worker process settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PythonConfig {
    pub interpreter: String,
    pub args: Vec<String>,
    pub load_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            args: vec!["-I".to_string(), "-u".to_string()],
            load_timeout_ms: 20_000,
            request_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub script: ScriptLimits,
    pub style: StyleConfig,
    pub python: PythonConfig,
    /// Submissions larger than this are rejected before preparation
    pub max_source_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            script: ScriptLimits::default(),
            style: StyleConfig::default(),
            python: PythonConfig::default(),
            max_source_bytes: 1024 * 1024,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Engine config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: EngineConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validated()
    }

    /// Load `config/engine.json` if present, defaults otherwise
    pub fn load_default() -> Result<Self> {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            Self::load(default_path)
        } else {
            tracing::debug!(path = DEFAULT_CONFIG_PATH, "No engine config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply `PROCTOR_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(interpreter) = lookup("PROCTOR_PYTHON") {
            self.python.interpreter = interpreter;
        }
        if let Some(raw) = lookup("PROCTOR_PYTHON_TIMEOUT_MS") {
            self.python.request_timeout_ms = raw
                .parse()
                .with_context(|| format!("PROCTOR_PYTHON_TIMEOUT_MS is not a number: {}", raw))?;
        }
        if let Some(raw) = lookup("PROCTOR_MAX_OPERATIONS") {
            self.script.max_operations = raw
                .parse()
                .with_context(|| format!("PROCTOR_MAX_OPERATIONS is not a number: {}", raw))?;
        }
        if let Some(raw) = lookup("PROCTOR_FIXTURE_WIDTH") {
            self.style.fixture_width_px = raw
                .parse()
                .with_context(|| format!("PROCTOR_FIXTURE_WIDTH is not a number: {}", raw))?;
        }
        self.validated()
    }

    fn validated(self) -> Result<Self> {
        if self.python.interpreter.trim().is_empty() {
            bail!("python.interpreter must not be empty");
        }
        if self.python.request_timeout_ms == 0 || self.python.load_timeout_ms == 0 {
            bail!("python timeouts must be greater than zero");
        }
        if self.style.fixture_width_px == 0 {
            bail!("style.fixture_width_px must be greater than zero");
        }
        if self.style.root_font_size_px <= 0.0 {
            bail!("style.root_font_size_px must be positive");
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.style.fixture_width_px, 1280);
        assert_eq!(config.python.interpreter, "python3");
        assert_eq!(config.max_source_bytes, 1024 * 1024);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"python": {{"request_timeout_ms": 250}}, "script": {{"max_operations": 10}}}}"#)
            .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.python.request_timeout_ms, 250);
        assert_eq!(config.python.interpreter, "python3");
        assert_eq!(config.script.max_operations, 10);
        assert_eq!(config.script.max_call_levels, 64);
    }

    #[test]
    fn test_load_rejects_missing_and_invalid() {
        assert!(EngineConfig::load(Path::new("does/not/exist.json")).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"style": {{"fixture_width_px": 0}}}}"#).unwrap();
        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("fixture_width_px"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PROCTOR_PYTHON", "/usr/bin/python3.12"),
            ("PROCTOR_MAX_OPERATIONS", "42"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.python.interpreter, "/usr/bin/python3.12");
        assert_eq!(config.script.max_operations, 42);

        let bad = EngineConfig::default()
            .with_overrides(|key| (key == "PROCTOR_FIXTURE_WIDTH").then(|| "wide".to_string()));
        assert!(bad.is_err());
    }
}
