/// Style Adapter - Fixture Rendering for CSS Submissions
///
/// **Core Responsibility:**
/// Mount the challenge's fixture markup and the submitted stylesheets in an
/// off-screen container on the host `Page`, then let assertions inspect
/// computed styles through `container` and `getComputedStyle(el)`.
///
/// **Lifecycle:**
/// 1. Build the container (fixture body + one `<style>` with every `.css`
///    file joined by newlines)
/// 2. Attach it to the page under a fresh id; a `FixtureGuard` owns the
///    attachment
/// 3. Render the page and resolve the cascade once
/// 4. Run assertions
/// 5. Drop the context, which detaches the container whatever happened
///
/// **Container Rules:**
/// - Fixed width from configuration, the base for `@media` queries
/// - Positioned off-screen and hidden so it never shows on the host page
/// - The fixture is re-serialized as a fragment first, so stray end tags
///   cannot close the container early
use super::Adapter;
use crate::css::StyleEnv;
use crate::dom::{self, DomDocument, ElementHandle};
use crate::error::{EvalError, PrepareError};
use crate::page::{FixtureGuard, Page};
use crate::sandbox;
use crate::sources::{escape_style_text, extract_body_content};
use proctor_common::{EngineConfig, FileMap, Language};
use rhai::{Engine, Scope};
use scraper::Html;
use tracing::debug;
use uuid::Uuid;

/// Attribute marking the fixture root on the host page
pub const FIXTURE_ATTRIBUTE: &str = "data-proctor-fixture";

pub struct StyleAdapter<'p> {
    page: &'p Page,
    config: &'p EngineConfig,
}

impl<'p> StyleAdapter<'p> {
    pub fn new(page: &'p Page, config: &'p EngineConfig) -> Self {
        Self { page, config }
    }

    fn container_markup(&self, id: Uuid, fixture: &str, css: &str) -> String {
        format!(
            "<div {attr}=\"{id}\" style=\"position:absolute;left:-9999px;top:0;width:{width}px;visibility:hidden;pointer-events:none\">{fixture}<style>{css}</style></div>",
            attr = FIXTURE_ATTRIBUTE,
            id = id,
            width = self.config.style.fixture_width_px,
            fixture = fixture,
            css = escape_style_text(css),
        )
    }
}

/// Parse `fixture` as a body fragment and serialize it back, balanced
fn balanced_fixture(fixture: &str) -> String {
    Html::parse_fragment(fixture).root_element().inner_html()
}

pub struct StyleContext<'p> {
    engine: Engine,
    container: ElementHandle,
    _fixture: FixtureGuard<'p>,
}

impl<'p> Adapter for StyleAdapter<'p> {
    type Context = StyleContext<'p>;

    fn prepare(&self, files: &FileMap) -> Result<StyleContext<'p>, PrepareError> {
        let css = files
            .with_extension(Language::Css.extensions())
            .map(|(_, code)| code)
            .collect::<Vec<_>>()
            .join("\n");
        let fixture = files
            .first_for(Language::Html)
            .map(|(_, code)| balanced_fixture(extract_body_content(code)))
            .unwrap_or_default();

        let id = Uuid::new_v4();
        let guard = self.page.attach(id, self.container_markup(id, &fixture, &css));

        let env = StyleEnv {
            viewport_width: f64::from(self.config.style.fixture_width_px),
            root_font_size: self.config.style.root_font_size_px,
        };
        let document = DomDocument::parse_styled(&self.page.snapshot(), env);
        let container = document
            .find_by_attribute(FIXTURE_ATTRIBUTE, &id.to_string())
            .ok_or_else(|| PrepareError::Parse("fixture container was not found after rendering".to_string()))?;

        debug!(fixture_id = %id, stylesheet_bytes = css.len(), "Fixture rendered");

        let mut engine = sandbox::build_engine(&self.config.script);
        dom::register(&mut engine);
        dom::register_computed_style(&mut engine);

        Ok(StyleContext {
            engine,
            container,
            _fixture: guard,
        })
    }

    fn evaluate(&self, context: &mut StyleContext<'p>, assertion: &str) -> Result<bool, EvalError> {
        let ast = sandbox::compile(&context.engine, assertion)?;
        let mut scope = Scope::new();
        scope.push("container", context.container.clone());
        sandbox::eval_truthy(&context.engine, &mut scope, &ast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::run;
    use proctor_common::{ExecutionOutcome, Test};

    fn check(page: &Page, files: &[(&str, &str)], tests: &[Test]) -> ExecutionOutcome {
        let config = EngineConfig::default();
        let files: FileMap = files.iter().copied().collect();
        run(&StyleAdapter::new(page, &config), &files, tests)
    }

    fn style(selector: &str, property: &str, expected: &str) -> String {
        format!(
            r#"getComputedStyle(container.querySelector("{}")).{} == "{}""#,
            selector, property, expected
        )
    }

    #[test]
    fn test_display_flex_then_halt() {
        let page = Page::new("", "<main>host</main>");
        let before = page.snapshot();
        let outcome = check(
            &page,
            &[("index.html", r#"<div class="w"></div>"#), ("styles.css", ".w{display:flex}")],
            &[
                Test::new("flex", style(".w", "display", "flex")),
                Test::new("grid", style(".w", "display", "grid")),
                Test::new("never", "true"),
            ],
        );

        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results[0].passed);
        assert!(!outcome.results[1].passed);
        assert_eq!(page.snapshot(), before);
        assert_eq!(page.mounted_count(), 0);
    }

    #[test]
    fn test_fixture_body_is_extracted_and_stylesheets_joined() {
        let page = Page::blank();
        let outcome = check(
            &page,
            &[
                ("index.html", "<html><head><title>t</title></head><body><p class=\"note\">n</p></body></html>"),
                ("base.css", ".note { color: red; margin: 1em 2em }"),
                ("theme.css", ".note { color: rgb(0, 0, 255) }"),
            ],
            &[
                Test::new("color", style(".note", "color", "rgb(0, 0, 255)")),
                Test::new("margin", style(".note", "margin", "16px 32px")),
                Test::new("camel", style(".note", "marginLeft", "32px")),
                Test::new(
                    "property value",
                    r#"getComputedStyle(container.querySelector(".note")).getPropertyValue("margin-top") == "16px""#,
                ),
                Test::new("no title", r#"container.querySelector("title") == ()"#),
            ],
        );
        assert!(outcome.success, "{:?}", outcome);
    }

    #[test]
    fn test_media_queries_use_fixture_width() {
        let page = Page::blank();
        let css = ".box { width: 100px } @media (max-width: 768px) { .box { width: 50px } }";
        let outcome = check(
            &page,
            &[("index.html", r#"<div class="box"></div>"#), ("s.css", css)],
            &[Test::new("desktop", style(".box", "width", "100px"))],
        );
        assert!(outcome.success, "{:?}", outcome);
    }

    #[test]
    fn test_throwing_assertion_still_detaches() {
        let page = Page::blank();
        let outcome = check(
            &page,
            &[("s.css", "")],
            &[Test::new("boom", r#"throw "boom";"#)],
        );
        assert_eq!(outcome.results[0].message.as_deref(), Some("Error: boom"));
        assert_eq!(page.mounted_count(), 0);
    }

    #[test]
    fn test_stray_end_tag_stays_inside_container() {
        let page = Page::new("", "<main>host</main>");
        let outcome = check(
            &page,
            &[
                ("index.html", r#"<div class="a"></div></div><p class="x"></p>"#),
                ("s.css", ".x { color: red }"),
            ],
            &[
                Test::new("inside", r#"container.querySelector(".x") != ()"#),
                Test::new("styled", style(".x", "color", "rgb(255, 0, 0)")),
                Test::new("children", "container.childElementCount == 3"),
            ],
        );
        assert!(outcome.success, "{:?}", outcome);
        assert_eq!(page.mounted_count(), 0);
    }

    #[test]
    fn test_balanced_fixture() {
        assert_eq!(balanced_fixture("<p>a</p></div><b>x"), "<p>a</p><b>x</b>");
        assert_eq!(balanced_fixture(""), "");
    }

    #[test]
    fn test_container_is_the_fixture_root() {
        let page = Page::blank();
        let outcome = check(
            &page,
            &[("index.html", "<span>a</span>")],
            &[
                Test::new("tag", r#"container.tagName == "DIV""#),
                Test::new("width", r#"getComputedStyle(container).width == "1280px""#),
                Test::new("hidden", r#"getComputedStyle(container.firstElementChild).visibility == "hidden""#),
            ],
        );
        assert!(outcome.success, "{:?}", outcome);
    }
}
