// Script adapter: Rhai submissions publish through a shared `exports` map
use super::Adapter;
use crate::error::{EvalError, PrepareError};
use crate::sandbox;
use proctor_common::config::ScriptLimits;
use proctor_common::{FileMap, Language};
use rhai::{Dynamic, Engine, Map, Scope, AST};

/// Name of the object shared between the submission and its assertions
pub const EXPORTS: &str = "exports";

pub struct ScriptAdapter<'c> {
    limits: &'c ScriptLimits,
}

impl<'c> ScriptAdapter<'c> {
    pub fn new(limits: &'c ScriptLimits) -> Self {
        Self { limits }
    }
}

pub struct ScriptContext {
    engine: Engine,
    /// Functions defined by the submission, merged into every assertion
    library: AST,
    exports: Dynamic,
}

impl Adapter for ScriptAdapter<'_> {
    type Context = ScriptContext;

    fn prepare(&self, files: &FileMap) -> Result<ScriptContext, PrepareError> {
        let (_, code) = files
            .first_for(Language::Rhai)
            .ok_or(PrepareError::MissingFile { language: "Rhai" })?;

        let engine = sandbox::build_engine(self.limits);
        let ast = sandbox::compile(&engine, code)?;

        let exports = Dynamic::from_map(Map::new()).into_shared();
        let mut scope = Scope::new();
        scope.push_dynamic(EXPORTS, exports.clone());
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|err| sandbox::eval_error(&err))?;

        Ok(ScriptContext {
            library: ast.clone_functions_only(),
            engine,
            exports,
        })
    }

    fn evaluate(&self, context: &mut ScriptContext, assertion: &str) -> Result<bool, EvalError> {
        let assertion = sandbox::compile(&context.engine, assertion)?;
        let program = context.library.merge(&assertion);

        let mut scope = Scope::new();
        scope.push_dynamic(EXPORTS, context.exports.clone());
        sandbox::eval_truthy(&context.engine, &mut scope, &program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::run;
    use proctor_common::Test;

    fn files(code: &str) -> FileMap {
        [("main.rhai", code)].into_iter().collect()
    }

    fn outcome(code: &str, assertions: &[&str]) -> proctor_common::ExecutionOutcome {
        let limits = ScriptLimits::default();
        let tests: Vec<Test> = assertions
            .iter()
            .enumerate()
            .map(|(i, a)| Test::new(format!("t{}", i), *a))
            .collect();
        run(&ScriptAdapter::new(&limits), &files(code), &tests)
    }

    #[test]
    fn test_exports_closure_is_callable() {
        let result = outcome("exports.add = |a, b| a + b;", &["return exports.add(1, 2) == 3;"]);
        assert!(result.success);
        assert_eq!(result.results.len(), 1);
    }

    #[test]
    fn test_named_functions_are_visible_to_assertions() {
        let code = "fn square(x) { x * x }\nexports.answer = 42;";
        let result = outcome(code, &["square(4) == 16", "exports.answer == 42"]);
        assert!(result.success, "{:?}", result);
    }

    #[test]
    fn test_top_level_variables_do_not_leak() {
        let result = outcome("let secret = 7; exports.ok = true;", &["exports.ok", "secret == 7"]);
        assert!(!result.success);
        assert_eq!(result.results.len(), 2);
        let message = result.results[1].message.as_deref().unwrap();
        assert!(message.starts_with("ReferenceError: secret is not defined"), "{}", message);
    }

    #[test]
    fn test_exports_reassignment_is_seen() {
        let result = outcome("exports = #{ greet: |n| `hi ${n}` };", &[r#"exports.greet("bo") == "hi bo""#]);
        assert!(result.success, "{:?}", result);
    }

    #[test]
    fn test_load_errors_are_global() {
        let thrown = outcome(r#"throw "x";"#, &["true"]);
        assert_eq!(thrown.error.as_deref(), Some("Error: x"));
        assert!(thrown.results.is_empty());

        let syntax = outcome("let = ;", &["true"]);
        assert!(syntax.error.as_deref().unwrap().starts_with("SyntaxError: "));

        let limits = ScriptLimits::default();
        let missing = run(
            &ScriptAdapter::new(&limits),
            &[("notes.txt", "")].into_iter().collect(),
            &[Test::new("t", "true")],
        );
        assert_eq!(missing.error.as_deref(), Some("No Rhai file found in this challenge."));
    }

    #[test]
    fn test_assertion_syntax_error_is_per_test() {
        let result = outcome("exports.x = 1;", &["exports.x == 1", "exports.x =="]);
        assert!(!result.success);
        assert!(result.error.is_none());
        assert!(result.results[1].message.as_deref().unwrap().starts_with("SyntaxError: "));
    }

    #[test]
    fn test_assertions_share_exports_state() {
        let result = outcome(
            "exports.count = 0;",
            &["exports.count += 1; exports.count == 1", "exports.count == 1"],
        );
        assert!(result.success, "{:?}", result);
    }
}
