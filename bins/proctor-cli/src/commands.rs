// CLI commands for grading challenges locally
use anyhow::{bail, Context, Result};
use proctor_common::{Challenge, EngineConfig, ExecutionOutcome, FileMap, Language};
use proctor_engine::Executor;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Engine config from `path`, or `config/engine.json`, plus env overrides
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_default()?,
    };
    config.with_env_overrides()
}

fn load_challenge(path: &Path) -> Result<Challenge> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read challenge {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse challenge {}", path.display()))
}

/// Read every regular file directly inside `dir`, ordered by name
fn read_submission(dir: &Path) -> Result<FileMap> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read submission directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = FileMap::new();
    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let code = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        files.insert(name, code);
    }
    Ok(files)
}

/// Convert a 1-based step number to an index
fn step_index(step: Option<usize>) -> Result<Option<usize>> {
    match step {
        Some(0) => bail!("Steps are numbered from 1"),
        Some(n) => Ok(Some(n - 1)),
        None => Ok(None),
    }
}

/// Grade a submission and print the report. Returns whether every test passed.
pub async fn run_challenge(
    config: EngineConfig,
    challenge_path: &Path,
    submission: Option<&Path>,
    step: Option<usize>,
    language: Option<&str>,
    json: bool,
) -> Result<bool> {
    let challenge = load_challenge(challenge_path)?;
    challenge.validate()?;
    let overrides = match submission {
        Some(dir) => read_submission(dir)?,
        None => FileMap::new(),
    };
    let request = challenge.request_for(step_index(step)?, &overrides)?;

    if !json {
        println!("🚀 Grading: {} ({} tests)", challenge.title, request.tests.len());
    }

    let executor = Executor::new(config);
    let outcome = match language {
        Some(key) => executor.execute(key, &request.files, &request.tests).await,
        None => executor.execute_request(&request).await,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
        );
    } else {
        print_report(&outcome, request.tests.len());
    }

    Ok(outcome.success)
}

fn print_report(outcome: &ExecutionOutcome, total: usize) {
    if let Some(error) = &outcome.error {
        println!("\n❌ Runtime error:\n{}", error);
        return;
    }

    println!();
    for result in &outcome.results {
        let mark = if result.passed { "✅" } else { "❌" };
        let label = if result.description.is_empty() {
            &result.id
        } else {
            &result.description
        };
        println!("  {} {}", mark, label);
        if let Some(message) = &result.message {
            println!("     → {}", message);
        }
    }

    let skipped = total.saturating_sub(outcome.results.len());
    if skipped > 0 {
        println!("  … {} test(s) not run", skipped);
    }

    if outcome.success {
        println!("\n✅ All {} test(s) passed", total);
    } else {
        println!("\n❌ {}/{} test(s) passed", outcome.passed_count(), total);
    }
}

pub fn validate_challenge(path: &Path) -> Result<()> {
    let challenge = load_challenge(path)?;
    let problems = challenge.problems();

    if problems.is_empty() {
        println!(
            "✅ Challenge '{}' is valid ({} tests, {} steps)",
            challenge.id,
            challenge.tests.len(),
            challenge.steps.len()
        );
        return Ok(());
    }

    println!("❌ Challenge '{}' has {} problem(s):", challenge.id, problems.len());
    for problem in &problems {
        println!("  - {}", problem);
    }
    bail!("Challenge validation failed")
}

pub async fn prewarm(config: EngineConfig) -> Result<()> {
    println!("🐍 Starting Python runtime ({})...", config.python.interpreter);

    let executor = Executor::new(config);
    let started = Instant::now();
    let runtime = executor
        .prewarm_python()
        .await
        .context("Python runtime failed to load")?;

    println!(
        "✅ Python {} ready in {} ms",
        runtime.version(),
        started.elapsed().as_millis()
    );
    Ok(())
}

pub fn list_languages() {
    println!("📋 Supported Languages:\n");
    println!("{:<10} {:<16} {:<12}", "KEY", "EXTENSIONS", "DEFAULT FILE");
    println!("{}", "─".repeat(40));

    for language in Language::ALL {
        println!(
            "{:<10} {:<16} {:<12}",
            language.key(),
            language.extensions().join(" "),
            language.default_filename()
        );
    }

    println!("\n✅ Total: {} language(s)", Language::ALL.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_submission_sorted_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.css"), "p{}").unwrap();
        fs::write(dir.path().join("a.html"), "<p></p>").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let files = read_submission(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["a.html", "b.css"]);
        assert_eq!(files.get("b.css"), Some("p{}"));
    }

    #[test]
    fn test_step_index() {
        assert_eq!(step_index(None).unwrap(), None);
        assert_eq!(step_index(Some(2)).unwrap(), Some(1));
        assert!(step_index(Some(0)).is_err());
    }

    #[tokio::test]
    async fn test_run_challenge_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let challenge_path = dir.path().join("challenge.json");
        fs::write(
            &challenge_path,
            r#"{
                "id": "add",
                "title": "Add two numbers",
                "language": "rhai",
                "files": [{"name": "app.rhai", "language": "rhai", "code": "exports.add = |a, b| 0;"}],
                "tests": [{"id": "t1", "assertion": "exports.add(1, 2) == 3"}]
            }"#,
        )
        .unwrap();

        let template_only = run_challenge(EngineConfig::default(), &challenge_path, None, None, None, true)
            .await
            .unwrap();
        assert!(!template_only);

        let submission = dir.path().join("submission");
        fs::create_dir(&submission).unwrap();
        fs::write(submission.join("app.rhai"), "exports.add = |a, b| a + b;").unwrap();
        let solved = run_challenge(
            EngineConfig::default(),
            &challenge_path,
            Some(&submission),
            None,
            None,
            true,
        )
        .await
        .unwrap();
        assert!(solved);
    }
}
