/// End-to-end tests for the executor
///
/// These tests go through `Executor::execute` the way a caller does:
/// 1. Dispatch by language key, including unknown keys
/// 2. Ordered, short-circuiting test runs
/// 3. Isolation between consecutive submissions
/// 4. Style fixture cleanup on the host page
/// 5. Python runs (skipped when no `python3` is installed)

#[cfg(test)]
mod scenario_tests {
    use crate::executor::Executor;
    use crate::page::Page;
    use crate::runtime::python::python_available;
    use crate::runtime::LoaderStatus;
    use proctor_common::{EngineConfig, ExecutionRequest, FileMap, Language, Test};

    fn executor() -> Executor {
        Executor::new(EngineConfig::default())
    }

    fn files(entries: &[(&str, &str)]) -> FileMap {
        entries.iter().copied().collect()
    }

    fn numbered(assertions: &[&str]) -> Vec<Test> {
        assertions
            .iter()
            .enumerate()
            .map(|(i, assertion)| Test::new(format!("t{}", i), *assertion).describe(format!("test {}", i)))
            .collect()
    }

    /// Test: exported closure is callable from the assertion
    #[tokio::test]
    async fn test_script_exports_pass() {
        let outcome = executor()
            .execute(
                "rhai",
                &files(&[("a.rhai", "exports.add = |a, b| a + b;")]),
                &[Test::new("add", "return exports.add(1, 2) == 3;")],
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].passed);
        assert!(outcome.results[0].message.is_none());
        assert!(outcome.error.is_none());
    }

    /// Test: a throw while loading is a global error and no test runs
    #[tokio::test]
    async fn test_script_load_throw_is_global() {
        let outcome = executor()
            .execute("rhai", &files(&[("a.rhai", r#"throw "x";"#)]), &numbered(&["true", "true"]))
            .await;

        assert!(!outcome.success);
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("Error: x"));
    }

    /// Test: missing element fails with the authored message
    #[tokio::test]
    async fn test_markup_missing_element() {
        let outcome = executor()
            .execute(
                "html",
                &files(&[("i.html", "<p>hi</p>")]),
                &[
                    Test::new("nav", r#"document.querySelector("nav") != ()"#)
                        .describe("Has a nav")
                        .on_failure("Add a <nav> element"),
                    Test::new("never", "true"),
                ],
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].description, "Has a nav");
        assert_eq!(outcome.results[0].message.as_deref(), Some("Add a <nav> element"));
    }

    /// Test: the style fixture is gone after pass, fail and throw
    #[tokio::test]
    async fn test_style_fixture_cleanup() {
        let executor = Executor::with_page(
            EngineConfig::default(),
            Page::new("<title>Host</title>", "<div id=\"app\"></div>"),
        );
        let before = executor.page().snapshot();
        let submission = files(&[("index.html", r#"<div class="w"></div>"#), ("styles.css", ".w{display:flex}")]);
        let display = |value: &str| {
            format!(r#"getComputedStyle(container.querySelector(".w")).display == "{}""#, value)
        };

        let passing = executor.execute("css", &submission, &[Test::new("flex", display("flex"))]).await;
        assert!(passing.success, "{:?}", passing);
        assert_eq!(executor.page().snapshot(), before);

        let failing = executor
            .execute(
                "css",
                &submission,
                &[
                    Test::new("flex", display("flex")),
                    Test::new("grid", display("grid")),
                    Test::new("never", "true"),
                ],
            )
            .await;
        assert!(!failing.success);
        assert_eq!(failing.results.len(), 2);
        assert_eq!(failing.results[1].message.as_deref(), Some("Test returned false"));
        assert_eq!(executor.page().snapshot(), before);

        let throwing = executor
            .execute("css", &submission, &[Test::new("boom", "missing_function()")])
            .await;
        assert!(!throwing.success);
        assert!(throwing.results[0].message.as_deref().unwrap().starts_with("TypeError: "));
        assert_eq!(executor.page().snapshot(), before);
        assert_eq!(executor.page().mounted_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_language() {
        let executor = executor();
        let before = executor.page().snapshot();

        let outcome = executor.execute("cobol", &files(&[("a.cob", "")]), &numbered(&["true"])).await;
        assert_eq!(
            outcome.error.as_deref(),
            Some("No executor available for language: cobol")
        );
        assert!(outcome.results.is_empty());
        assert!(!outcome.success);
        assert_eq!(executor.page().snapshot(), before);
        assert_eq!(executor.python_status(), LoaderStatus::Unloaded);
    }

    #[tokio::test]
    async fn test_language_keys_are_case_insensitive_with_aliases() {
        let submission = files(&[("i.html", "<h1>Title</h1>")]);
        let tests = [Test::new("h1", r#"document.querySelector("h1").textContent == "Title""#)];

        for key in ["html", "HTML", "markup", " htm "] {
            let outcome = executor().execute(key, &submission, &tests).await;
            assert!(outcome.success, "{}: {:?}", key, outcome);
        }
    }

    /// Test: results keep test order and stop right after the first failure
    #[tokio::test]
    async fn test_order_and_short_circuit() {
        let outcome = executor()
            .execute(
                "rhai",
                &files(&[("main.rhai", "exports.n = 3;")]),
                &numbered(&["exports.n == 3", "exports.n > 1", "exports.n == 4", "true", "true"]),
            )
            .await;

        assert!(!outcome.success);
        let ids: Vec<&str> = outcome.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["t0", "t1", "t2"]);
        assert!(outcome.results[..2].iter().all(|r| r.passed));
        assert!(!outcome.results[2].passed);
    }

    #[tokio::test]
    async fn test_all_passing_has_every_result() {
        let tests = numbered(&["exports.n == 3", "exports.n * 2 == 6", "exports.n != 0"]);
        let outcome = executor()
            .execute("rhai", &files(&[("main.rhai", "exports.n = 3;")]), &tests)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.results.len(), tests.len());
        assert_eq!(outcome.passed_count(), tests.len());

        let empty = executor()
            .execute("rhai", &files(&[("main.rhai", "")]), &[])
            .await;
        assert!(empty.success);
        assert!(empty.results.is_empty());
    }

    /// Test: one submission's exports never reach the next one
    #[tokio::test]
    async fn test_script_submissions_are_isolated() {
        let executor = executor();
        let first = executor
            .execute("rhai", &files(&[("a.rhai", "exports.x = 1;")]), &numbered(&["exports.x == 1"]))
            .await;
        assert!(first.success);

        let second = executor
            .execute("rhai", &files(&[("a.rhai", "exports.y = 2;")]), &numbered(&["exports.x == ()"]))
            .await;
        assert!(second.success, "{:?}", second);
    }

    #[tokio::test]
    async fn test_oversized_submission_is_rejected() {
        let config = EngineConfig {
            max_source_bytes: 10,
            ..EngineConfig::default()
        };
        let outcome = Executor::new(config)
            .execute("rhai", &files(&[("a.rhai", "exports.value = 12345;")]), &numbered(&["true"]))
            .await;

        assert!(outcome.results.is_empty());
        assert_eq!(
            outcome.error.as_deref(),
            Some("Submission is 22 bytes, over the limit of 10 bytes")
        );
    }

    #[tokio::test]
    async fn test_execute_request() {
        let request = ExecutionRequest::new(
            Language::Html,
            files(&[("index.html", "<ul><li>a</li><li>b</li></ul>")]),
            numbered(&[r#"document.querySelectorAll("li").len() == 2"#]),
        );
        let outcome = executor().execute_request(&request).await;
        assert!(outcome.success, "{:?}", outcome);
    }

    /// Test: truthy values that are not `True` fail
    #[tokio::test]
    async fn test_python_strict_boolean() {
        if !python_available() {
            eprintln!("python3 not installed, skipping");
            return;
        }
        let outcome = executor()
            .execute(
                "python",
                &files(&[("app.py", "def reverse(s):\n    return s[::-1]\n")]),
                &numbered(&["reverse('hello') == 'olleh'", "reverse('hello')", "True"]),
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[0].passed);
        assert_eq!(outcome.results[1].message.as_deref(), Some("Test returned false"));
    }

    #[tokio::test]
    async fn test_python_namespace_is_fresh_per_request() {
        if !python_available() {
            return;
        }
        let executor = executor();
        executor.prewarm_python().await.unwrap();
        assert!(executor.is_python_ready());

        let first = executor
            .execute("py", &files(&[("app.py", "leaked = True")]), &numbered(&["leaked"]))
            .await;
        assert!(first.success, "{:?}", first);

        let second = executor
            .execute("python", &files(&[("app.py", "x = 1")]), &numbered(&["leaked"]))
            .await;
        assert_eq!(
            second.results[0].message.as_deref(),
            Some("NameError: name 'leaked' is not defined")
        );
    }

    #[tokio::test]
    async fn test_python_errors() {
        if !python_available() {
            return;
        }
        let executor = executor();

        let per_test = executor
            .execute("python", &files(&[("app.py", "n = 0")]), &numbered(&["1 / n == 1", "True"]))
            .await;
        assert_eq!(per_test.results.len(), 1);
        assert_eq!(
            per_test.results[0].message.as_deref(),
            Some("ZeroDivisionError: division by zero")
        );
        assert!(per_test.error.is_none());

        let load = executor
            .execute("python", &files(&[("app.py", "def broken(:\n")]), &numbered(&["True"]))
            .await;
        assert!(load.results.is_empty());
        assert!(load.error.as_deref().unwrap().starts_with("SyntaxError: "));
    }

    /// Test: a runaway submission times out and the next request relaunches the worker
    #[tokio::test]
    async fn test_python_timeout_then_relaunch() {
        if !python_available() {
            return;
        }
        let mut config = EngineConfig::default();
        config.python.request_timeout_ms = 300;
        let executor = Executor::new(config);

        let stuck = executor
            .execute("python", &files(&[("app.py", "while True:\n    pass\n")]), &numbered(&["True"]))
            .await;
        assert_eq!(
            stuck.error.as_deref(),
            Some("TimeoutError: code did not finish within 300 ms")
        );
        assert!(!executor.is_python_ready());

        let next = executor
            .execute("python", &files(&[("app.py", "x = 1")]), &numbered(&["x == 1"]))
            .await;
        assert!(next.success, "{:?}", next);
    }
}
