// Markup adapter: assertions query a parsed, read-only `document`
use super::Adapter;
use crate::dom::{self, DocumentHandle, DomDocument};
use crate::error::{EvalError, PrepareError};
use crate::sandbox;
use crate::sources::{resolve_file_references, EMPTY_DOCUMENT};
use proctor_common::{EngineConfig, FileMap, Language};
use rhai::{Engine, Scope};
use std::rc::Rc;

pub struct MarkupAdapter<'c> {
    config: &'c EngineConfig,
}

impl<'c> MarkupAdapter<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }
}

pub struct MarkupContext {
    engine: Engine,
    document: Rc<DomDocument>,
}

impl Adapter for MarkupAdapter<'_> {
    type Context = MarkupContext;

    fn prepare(&self, files: &FileMap) -> Result<MarkupContext, PrepareError> {
        let source = files
            .first_for(Language::Html)
            .map(|(_, code)| code)
            .unwrap_or(EMPTY_DOCUMENT);
        let markup = resolve_file_references(source, files);

        if markup.len() > self.config.max_source_bytes {
            return Err(PrepareError::Parse(format!(
                "document is {} bytes after inlining, over the limit of {} bytes",
                markup.len(),
                self.config.max_source_bytes
            )));
        }

        let mut engine = sandbox::build_engine(&self.config.script);
        dom::register(&mut engine);

        Ok(MarkupContext {
            engine,
            document: DomDocument::parse(&markup),
        })
    }

    fn evaluate(&self, context: &mut MarkupContext, assertion: &str) -> Result<bool, EvalError> {
        let ast = sandbox::compile(&context.engine, assertion)?;
        let mut scope = Scope::new();
        scope.push("document", DocumentHandle::new(Rc::clone(&context.document)));
        sandbox::eval_truthy(&context.engine, &mut scope, &ast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::run;
    use proctor_common::Test;

    fn check(files: &[(&str, &str)], tests: &[Test]) -> proctor_common::ExecutionOutcome {
        let config = EngineConfig::default();
        let files: FileMap = files.iter().copied().collect();
        run(&MarkupAdapter::new(&config), &files, tests)
    }

    #[test]
    fn test_missing_element_uses_authored_message() {
        let outcome = check(
            &[("i.html", "<p>hi</p>")],
            &[Test::new("nav", r#"document.querySelector("nav") != ()"#).on_failure("Add a <nav> element")],
        );
        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].message.as_deref(), Some("Add a <nav> element"));
    }

    #[test]
    fn test_no_html_file_gets_empty_document() {
        let outcome = check(
            &[("styles.css", "p{}")],
            &[Test::new("body", r#"document.body != () && document.body.childElementCount == 0"#)],
        );
        assert!(outcome.success, "{:?}", outcome);
    }

    #[test]
    fn test_linked_stylesheet_is_inlined() {
        let outcome = check(
            &[
                ("index.html", r#"<html><head><link rel="stylesheet" href="site.css"></head><body></body></html>"#),
                ("site.css", "h1 { color: red }"),
            ],
            &[
                Test::new("inlined", r#"document.querySelector("style").textContent.contains("color: red")"#),
                Test::new("link gone", r#"document.querySelector("link") == ()"#),
            ],
        );
        assert!(outcome.success, "{:?}", outcome);
    }

    #[test]
    fn test_first_html_file_wins() {
        let outcome = check(
            &[("b.htm", "<h1>B</h1>"), ("a.html", "<h1>A</h1>")],
            &[Test::new("first", r#"document.querySelector("h1").textContent == "B""#)],
        );
        assert!(outcome.success, "{:?}", outcome);
    }
}
