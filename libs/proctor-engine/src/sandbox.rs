// Embedded script engine setup shared by the Rhai, HTML and CSS adapters
use crate::error::{
    EvalError, GENERIC_ERROR, RANGE_ERROR, REFERENCE_ERROR, SYNTAX_ERROR, TYPE_ERROR,
};
use proctor_common::config::ScriptLimits;
use rhai::{Dynamic, Engine, EvalAltResult, Map, ParseError, Position, Scope, AST};
use tracing::debug;

/// Build a fresh engine with the configured resource limits.
///
/// Engines are never shared between requests.
pub fn build_engine(limits: &ScriptLimits) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);

    engine.on_print(|text| debug!(target: "proctor::submission", "{}", text));
    engine.on_debug(|text, source, pos| {
        debug!(target: "proctor::submission", source = source.unwrap_or(""), position = %pos, "{}", text)
    });

    engine
}

pub fn compile(engine: &Engine, source: &str) -> Result<AST, EvalError> {
    engine.compile(source).map_err(|err| parse_error(&err))
}

/// Evaluate `ast` and coerce its value with script truthiness
pub fn eval_truthy(engine: &Engine, scope: &mut Scope, ast: &AST) -> Result<bool, EvalError> {
    engine
        .eval_ast_with_scope::<Dynamic>(scope, ast)
        .map(|value| is_truthy(&value))
        .map_err(|err| eval_error(&err))
}

/// `()`, `false`, zero, NaN and `""` are falsy; everything else is truthy
pub fn is_truthy(value: &Dynamic) -> bool {
    if value.is_unit() {
        return false;
    }
    if let Ok(flag) = value.as_bool() {
        return flag;
    }
    if let Ok(n) = value.as_int() {
        return n != 0;
    }
    if let Ok(f) = value.as_float() {
        return f != 0.0 && !f.is_nan();
    }
    if value.is_string() {
        return !value.to_string().is_empty();
    }
    true
}

pub fn parse_error(err: &ParseError) -> EvalError {
    EvalError::new(SYNTAX_ERROR, err.to_string())
}

/// Map an engine error onto the error kinds reported to students
pub fn eval_error(err: &EvalAltResult) -> EvalError {
    use EvalAltResult::*;

    match err {
        ErrorInFunctionCall(_, _, inner, ..) | ErrorInModule(_, inner, ..) => eval_error(inner),
        ErrorRuntime(value, ..) => thrown(value),
        ErrorParsing(kind, pos) => EvalError::new(SYNTAX_ERROR, with_position(kind.to_string(), *pos)),
        ErrorVariableNotFound(name, pos) => {
            EvalError::new(REFERENCE_ERROR, with_position(format!("{} is not defined", name), *pos))
        }
        ErrorFunctionNotFound(signature, pos) => EvalError::new(
            TYPE_ERROR,
            with_position(format!("{} is not a function", signature), *pos),
        ),
        ErrorPropertyNotFound(..)
        | ErrorUnboundThis(..)
        | ErrorMismatchDataType(..)
        | ErrorMismatchOutputType(..)
        | ErrorIndexingType(..)
        | ErrorFor(..) => EvalError::new(TYPE_ERROR, err.to_string()),
        ErrorArrayBounds(..)
        | ErrorStringBounds(..)
        | ErrorArithmetic(..)
        | ErrorTooManyOperations(..)
        | ErrorStackOverflow(..)
        | ErrorDataTooLarge(..) => EvalError::new(RANGE_ERROR, err.to_string()),
        _ => EvalError::new(GENERIC_ERROR, err.to_string()),
    }
}

/// A `throw`n value. Object maps with `name`/`message` keep their kind.
fn thrown(value: &Dynamic) -> EvalError {
    if let Some(map) = value.read_lock::<Map>() {
        if let Some(name) = map.get("name") {
            let message = map.get("message").map(|m| m.to_string()).unwrap_or_default();
            return EvalError::new(name.to_string(), message);
        }
    }
    EvalError::new(GENERIC_ERROR, value.to_string())
}

fn with_position(message: String, pos: Position) -> String {
    if pos.is_none() {
        message
    } else {
        format!("{} ({})", message, pos)
    }
}

/// Error raised by host functions, surfaced to the assertion as `kind`
pub fn raise(kind: &str, message: impl Into<String>) -> Box<EvalAltResult> {
    let message: String = message.into();
    let mut map = Map::new();
    map.insert("name".into(), Dynamic::from(kind.to_string()));
    map.insert("message".into(), Dynamic::from(message));
    EvalAltResult::ErrorRuntime(Dynamic::from_map(map), Position::NONE).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<bool, EvalError> {
        let engine = build_engine(&ScriptLimits::default());
        let ast = compile(&engine, source)?;
        eval_truthy(&engine, &mut Scope::new(), &ast)
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(run("true"), Ok(true));
        assert_eq!(run("false"), Ok(false));
        assert_eq!(run("1"), Ok(true));
        assert_eq!(run("0"), Ok(false));
        assert_eq!(run("0.0"), Ok(false));
        assert_eq!(run(r#""""#), Ok(false));
        assert_eq!(run(r#""a""#), Ok(true));
        assert_eq!(run("()"), Ok(false));
        assert_eq!(run("[]"), Ok(true));
        assert_eq!(run("let x = 1;"), Ok(false));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(run("missing + 1").unwrap_err().kind, REFERENCE_ERROR);
        assert_eq!(run("nope(1)").unwrap_err().kind, TYPE_ERROR);
        assert_eq!(run("let a = [1]; a[5]").unwrap_err().kind, RANGE_ERROR);
        assert_eq!(run("1 +").unwrap_err().kind, SYNTAX_ERROR);
        assert_eq!(run("loop {}").unwrap_err().kind, RANGE_ERROR);
    }

    #[test]
    fn test_thrown_values() {
        assert_eq!(run(r#"throw "x";"#), Err(EvalError::new("Error", "x")));
        assert_eq!(
            run(r#"throw #{ name: "ValueError", message: "bad" };"#),
            Err(EvalError::new("ValueError", "bad"))
        );
    }

    #[test]
    fn test_errors_inside_functions_keep_kind() {
        let err = run("fn f() { undefined_thing } f()").unwrap_err();
        assert_eq!(err.kind, REFERENCE_ERROR);
    }

    #[test]
    fn test_raise_builds_named_error() {
        let err = eval_error(&raise(SYNTAX_ERROR, "bad selector"));
        assert_eq!(err, EvalError::new(SYNTAX_ERROR, "bad selector"));
    }
}
