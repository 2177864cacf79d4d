/// Style Cascade - Computed Values Without Layout
///
/// **Core Responsibility:**
/// Resolve the computed value of every known property for every element of
/// a parsed document, the way `getComputedStyle` reports them.
///
/// **Precedence (lowest to highest):**
/// 1. User-agent rules
/// 2. Author rules
/// 3. Author `!important`
/// 4. User-agent `!important`
///
/// Within a level inline `style` attributes beat selector rules, then
/// cascade layers (unlayered rules beat layered ones, reversed for
/// `!important`), then specificity, then source order.
///
/// **Not computed:**
/// - Used values that need layout (`width: auto` stays `auto`)
/// - Pseudo-elements, animations, custom properties
/// - User-action states: selectors with `:hover`, `:focus` and friends
///   never match, since nothing is hovered or focused
use super::parser::{parse_declarations, parse_stylesheet, specificity, Declaration, MediaEnv, StyleRule};
use super::values::{format_px, normalize, parse_color, resolve_font_size, Rgba, ValueContext};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::debug;

/// Viewport the document is styled against
#[derive(Debug, Clone, Copy)]
pub struct StyleEnv {
    pub viewport_width: f64,
    pub root_font_size: f64,
}

/// Computed values of one element, keyed by kebab-case property name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    properties: BTreeMap<String, String>,
}

impl ComputedStyle {
    pub fn get(&self, property: &str) -> Option<&str> {
        self.properties.get(property).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    fn font_size_px(&self) -> Option<f64> {
        self.get("font-size")?.strip_suffix("px")?.parse().ok()
    }
}

const USER_AGENT_CSS: &str = r#"
html, address, blockquote, body, dd, div, dl, dt, fieldset, figcaption, figure,
footer, form, h1, h2, h3, h4, h5, h6, header, hgroup, hr, main, nav, ol, p, pre,
section, article, aside, ul, menu, details, summary, dialog, legend, search, center { display: block }
head, script, style, link, meta, title, template, noscript, base, datalist, [hidden] { display: none }
li { display: list-item }
table { display: table; border-collapse: separate }
caption { display: table-caption; text-align: center }
thead { display: table-header-group }
tbody { display: table-row-group }
tfoot { display: table-footer-group }
tr { display: table-row }
td, th { display: table-cell; padding: 1px }
th { font-weight: bold; text-align: center }
button, input, select, textarea, img { display: inline-block }
body { margin: 8px }
p, dl, menu { margin-top: 1em; margin-bottom: 1em }
ul, ol { margin-top: 1em; margin-bottom: 1em; padding-left: 40px }
blockquote, figure { margin: 1em 40px }
dd { margin-left: 40px }
h1 { font-size: 2em; margin-top: 0.67em; margin-bottom: 0.67em }
h2 { font-size: 1.5em; margin-top: 0.83em; margin-bottom: 0.83em }
h3 { font-size: 1.17em; margin-top: 1em; margin-bottom: 1em }
h4 { margin-top: 1.33em; margin-bottom: 1.33em }
h5 { font-size: 0.83em; margin-top: 1.67em; margin-bottom: 1.67em }
h6 { font-size: 0.67em; margin-top: 2.33em; margin-bottom: 2.33em }
h1, h2, h3, h4, h5, h6, b, strong { font-weight: bold }
i, em, cite, var, dfn, address { font-style: italic }
ul, menu { list-style-type: disc }
ol { list-style-type: decimal }
a[href] { color: #0000ee; text-decoration-line: underline; cursor: pointer }
u, ins { text-decoration-line: underline }
s, del, strike { text-decoration-line: line-through }
pre, code, kbd, samp { font-family: monospace }
pre { white-space: pre; margin-top: 1em; margin-bottom: 1em }
small, sub, sup { font-size: smaller }
big { font-size: larger }
sub { vertical-align: sub }
sup { vertical-align: super }
center { text-align: center }
hr { color: gray; border-style: inset; border-width: 1px; margin: 0.5em auto; overflow: hidden }
fieldset { margin: 0 2px; padding: 0.35em 0.75em 0.625em; border: 2px groove rgb(192, 192, 192) }
"#;

/// Initial values of the properties every element reports
const INITIAL_VALUES: &[(&str, &str)] = &[
    ("display", "inline"),
    ("position", "static"),
    ("float", "none"),
    ("clear", "none"),
    ("box-sizing", "content-box"),
    ("visibility", "visible"),
    ("opacity", "1"),
    ("z-index", "auto"),
    ("overflow-x", "visible"),
    ("overflow-y", "visible"),
    ("width", "auto"),
    ("height", "auto"),
    ("min-width", "auto"),
    ("min-height", "auto"),
    ("max-width", "none"),
    ("max-height", "none"),
    ("top", "auto"),
    ("right", "auto"),
    ("bottom", "auto"),
    ("left", "auto"),
    ("margin-top", "0px"),
    ("margin-right", "0px"),
    ("margin-bottom", "0px"),
    ("margin-left", "0px"),
    ("padding-top", "0px"),
    ("padding-right", "0px"),
    ("padding-bottom", "0px"),
    ("padding-left", "0px"),
    ("border-top-width", "medium"),
    ("border-right-width", "medium"),
    ("border-bottom-width", "medium"),
    ("border-left-width", "medium"),
    ("border-top-style", "none"),
    ("border-right-style", "none"),
    ("border-bottom-style", "none"),
    ("border-left-style", "none"),
    ("border-top-color", "currentcolor"),
    ("border-right-color", "currentcolor"),
    ("border-bottom-color", "currentcolor"),
    ("border-left-color", "currentcolor"),
    ("border-top-left-radius", "0px"),
    ("border-top-right-radius", "0px"),
    ("border-bottom-right-radius", "0px"),
    ("border-bottom-left-radius", "0px"),
    ("border-collapse", "separate"),
    ("outline-style", "none"),
    ("outline-width", "medium"),
    ("outline-color", "currentcolor"),
    ("background-color", "transparent"),
    ("background-image", "none"),
    ("font-family", "Times New Roman"),
    ("font-weight", "400"),
    ("font-style", "normal"),
    ("line-height", "normal"),
    ("letter-spacing", "normal"),
    ("word-spacing", "0px"),
    ("text-align", "start"),
    ("text-indent", "0px"),
    ("text-transform", "none"),
    ("text-decoration-line", "none"),
    ("vertical-align", "baseline"),
    ("white-space", "normal"),
    ("cursor", "auto"),
    ("list-style-type", "disc"),
    ("list-style-position", "outside"),
    ("flex-direction", "row"),
    ("flex-wrap", "nowrap"),
    ("flex-grow", "0"),
    ("flex-shrink", "1"),
    ("flex-basis", "auto"),
    ("order", "0"),
    ("justify-content", "normal"),
    ("align-items", "normal"),
    ("align-content", "normal"),
    ("align-self", "auto"),
    ("row-gap", "normal"),
    ("column-gap", "normal"),
    ("grid-template-columns", "none"),
    ("grid-template-rows", "none"),
    ("transform", "none"),
    ("transition", "all 0s ease 0s"),
    ("pointer-events", "auto"),
];

const INHERITED: &[&str] = &[
    "border-collapse",
    "cursor",
    "direction",
    "font-family",
    "font-style",
    "font-variant",
    "font-weight",
    "letter-spacing",
    "line-height",
    "list-style-position",
    "list-style-type",
    "pointer-events",
    "quotes",
    "text-align",
    "text-indent",
    "text-transform",
    "visibility",
    "white-space",
    "word-break",
    "word-spacing",
];

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

fn initial_value(property: &str) -> Option<&'static str> {
    INITIAL_VALUES
        .iter()
        .find(|(name, _)| *name == property)
        .map(|(_, value)| *value)
}

fn is_inherited(property: &str) -> bool {
    INHERITED.contains(&property)
}

/// Properties accepted by the parser without an entry in the tables above
const OTHER_PROPERTIES: &[&str] = &[
    "animation",
    "aspect-ratio",
    "background-position",
    "background-repeat",
    "background-size",
    "box-shadow",
    "content",
    "filter",
    "font",
    "grid-area",
    "grid-auto-flow",
    "grid-column",
    "grid-row",
    "grid-template-areas",
    "justify-items",
    "justify-self",
    "list-style",
    "object-fit",
    "outline",
    "place-content",
    "place-items",
    "text-decoration",
    "text-overflow",
    "text-shadow",
    "transition-duration",
    "transition-property",
];

/// Whether `@supports` treats the longhand `property` as supported
pub(super) fn is_known_property(property: &str) -> bool {
    matches!(property, "font-size" | "color")
        || initial_value(property).is_some()
        || is_inherited(property)
        || OTHER_PROPERTIES.contains(&property)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    UserAgent,
    Author,
}

/// Cascade level, higher wins
fn level(origin: Origin, important: bool) -> u8 {
    match (origin, important) {
        (Origin::UserAgent, false) => 0,
        (Origin::Author, false) => 1,
        (Origin::Author, true) => 2,
        (Origin::UserAgent, true) => 3,
    }
}

/// `(level, inline, layer, specificity, rule order, declaration order)`
type Priority = (u8, bool, usize, (u32, u32, u32), usize, usize);

/// Pseudo-elements and user-action pseudo-classes. The selector engine has
/// no notion of either, so selectors using them are valid but never match.
fn inert_pseudo_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)::[a-z-]+(\([^)]*\))?|:(before|after|first-line|first-letter|hover|active|visited|focus-within|focus-visible|focus)\b",
        )
        .expect("pseudo selector regex must compile")
    })
}

/// Outcome of compiling one selector of a rule's selector list
enum Compiled {
    Live(Selector),
    Inert,
    Invalid,
}

fn compile_selector(text: &str) -> Compiled {
    if let Ok(selector) = Selector::parse(text) {
        return Compiled::Live(selector);
    }
    let pattern = inert_pseudo_pattern();
    if !pattern.is_match(text) {
        return Compiled::Invalid;
    }
    let stripped = pattern.replace_all(text, "");
    let remainder = match stripped.trim() {
        "" => "*",
        rest => rest,
    };
    let compiled = match Selector::parse(remainder) {
        Ok(_) => Compiled::Inert,
        Err(_) => Compiled::Invalid,
    };
    compiled
}

struct CompiledSelector {
    selector: Selector,
    specificity: (u32, u32, u32),
    rule: usize,
}

struct Cascade {
    rules: Vec<(Origin, StyleRule)>,
    selectors: Vec<CompiledSelector>,
    /// Layer names from lowest to highest precedence
    layers: Vec<String>,
    env: StyleEnv,
}

impl Cascade {
    fn new(rules: Vec<(Origin, StyleRule)>, layers: Vec<String>, env: StyleEnv) -> Self {
        let mut selectors = Vec::new();
        for (index, (_, rule)) in rules.iter().enumerate() {
            let mut live = Vec::new();
            let mut valid = true;
            for text in &rule.selectors {
                match compile_selector(text) {
                    Compiled::Live(selector) => live.push(CompiledSelector {
                        selector,
                        specificity: specificity(text),
                        rule: index,
                    }),
                    Compiled::Inert => {}
                    Compiled::Invalid => valid = false,
                }
            }

            // one invalid selector invalidates the whole rule
            if valid {
                selectors.extend(live);
            } else {
                debug!(selectors = %rule.selectors.join(", "), "Dropping rule with invalid selector");
            }
        }

        Self {
            rules,
            selectors,
            layers,
            env,
        }
    }

    /// Layer component of a declaration's priority
    fn layer_rank(&self, layer: Option<&str>, important: bool) -> usize {
        let position = layer.map(|name| self.layers.iter().position(|l| l == name).unwrap_or(0));
        match (position, important) {
            (None, false) => usize::MAX,
            (Some(position), false) => position,
            (None, true) => 0,
            (Some(position), true) => usize::MAX - 1 - position,
        }
    }

    /// Winning declared value per property
    fn cascaded(&self, element: &ElementRef) -> BTreeMap<String, String> {
        let mut winners: BTreeMap<String, (Priority, String)> = BTreeMap::new();
        let mut offer = |decl: &Declaration, priority: Priority| {
            let replace = winners
                .get(&decl.property)
                .map_or(true, |(current, _)| priority >= *current);
            if replace {
                winners.insert(decl.property.clone(), (priority, decl.value.clone()));
            }
        };

        for compiled in &self.selectors {
            if !compiled.selector.matches(element) {
                continue;
            }
            let (origin, rule) = &self.rules[compiled.rule];
            for (i, decl) in rule.declarations.iter().enumerate() {
                let layer = self.layer_rank(rule.layer.as_deref(), decl.important);
                offer(
                    decl,
                    (
                        level(*origin, decl.important),
                        false,
                        layer,
                        compiled.specificity,
                        compiled.rule,
                        i,
                    ),
                );
            }
        }

        if let Some(inline) = element.value().attr("style") {
            for (i, decl) in parse_declarations(inline).iter().enumerate() {
                offer(decl, (level(Origin::Author, decl.important), true, 0, (0, 0, 0), usize::MAX, i));
            }
        }

        winners
            .into_iter()
            .map(|(property, (_, value))| (property, value))
            .collect()
    }

    fn compute(&self, element: &ElementRef, parent: Option<&ComputedStyle>) -> ComputedStyle {
        let specified = self.cascaded(element);
        let env = self.env;

        let parent_font = parent
            .and_then(ComputedStyle::font_size_px)
            .unwrap_or(env.root_font_size);
        let font_size = match keyword(specified.get("font-size")) {
            Keyword::None | Keyword::Inherit | Keyword::Unset => parent_font,
            Keyword::Initial => env.root_font_size,
            Keyword::Value(value) => {
                resolve_font_size(value, parent_font, env.root_font_size, env.viewport_width)
                    .unwrap_or(parent_font)
            }
        };

        let parent_color = parent
            .and_then(|p| p.get("color"))
            .and_then(parse_color)
            .unwrap_or(Rgba::BLACK);
        let color = match keyword(specified.get("color")) {
            Keyword::None | Keyword::Inherit | Keyword::Unset => parent_color,
            Keyword::Initial => Rgba::BLACK,
            Keyword::Value(value) if value.eq_ignore_ascii_case("currentcolor") => parent_color,
            Keyword::Value(value) => parse_color(value).unwrap_or(parent_color),
        };

        let ctx = ValueContext {
            font_size,
            root_font_size: env.root_font_size,
            viewport_width: env.viewport_width,
            color,
        };

        let mut properties = BTreeMap::new();
        properties.insert("font-size".to_string(), format_px(font_size));
        properties.insert("color".to_string(), color.to_string());

        let names: BTreeSet<&str> = INITIAL_VALUES
            .iter()
            .map(|(name, _)| *name)
            .chain(specified.keys().map(String::as_str))
            .filter(|name| *name != "font-size" && *name != "color")
            .collect();

        for name in names {
            let initial = || initial_value(name).map(|value| normalize(name, value, &ctx));
            let from_parent = || parent.and_then(|p| p.get(name)).map(str::to_string).or_else(initial);

            let value = match keyword(specified.get(name)) {
                Keyword::Value(value) => Some(normalize(name, value, &ctx)),
                Keyword::Inherit => from_parent(),
                Keyword::Initial => initial(),
                Keyword::None | Keyword::Unset if is_inherited(name) => from_parent(),
                Keyword::None | Keyword::Unset => initial(),
            };
            if let Some(value) = value {
                properties.insert(name.to_string(), value);
            }
        }

        zero_unstyled_borders(&mut properties);
        blockify(&mut properties, parent);
        serialize_shorthands(&mut properties);

        ComputedStyle { properties }
    }
}

enum Keyword<'a> {
    None,
    Inherit,
    Initial,
    Unset,
    Value(&'a str),
}

fn keyword(value: Option<&String>) -> Keyword<'_> {
    match value.map(|v| v.trim()) {
        None => Keyword::None,
        Some(v) if v.eq_ignore_ascii_case("inherit") => Keyword::Inherit,
        Some(v) if v.eq_ignore_ascii_case("initial") => Keyword::Initial,
        Some(v) if v.eq_ignore_ascii_case("unset") => Keyword::Unset,
        Some(v) => Keyword::Value(v),
    }
}

/// A border side whose style is `none`/`hidden` has a zero computed width
fn zero_unstyled_borders(properties: &mut BTreeMap<String, String>) {
    let sides = SIDES.iter().map(|side| {
        (
            format!("border-{}-style", side),
            format!("border-{}-width", side),
        )
    });
    for (style, width) in sides.chain(std::iter::once((
        "outline-style".to_string(),
        "outline-width".to_string(),
    ))) {
        if matches!(properties.get(&style).map(String::as_str), Some("none" | "hidden")) {
            properties.insert(width, "0px".to_string());
        }
    }
}

/// Floated, absolutely positioned and flex/grid items are block-level
fn blockify(properties: &mut BTreeMap<String, String>, parent: Option<&ComputedStyle>) {
    let parent_is_container = parent
        .and_then(|p| p.get("display"))
        .map_or(false, |d| matches!(d, "flex" | "inline-flex" | "grid" | "inline-grid"));
    let out_of_flow = matches!(
        properties.get("position").map(String::as_str),
        Some("absolute" | "fixed")
    ) || properties.get("float").map_or(false, |f| f != "none");

    if !(parent_is_container || out_of_flow) {
        return;
    }
    let blockified = match properties.get("display").map(String::as_str) {
        Some("inline" | "inline-block") => "block",
        Some("inline-flex") => "flex",
        Some("inline-grid") => "grid",
        Some("inline-table") => "table",
        _ => return,
    };
    properties.insert("display".to_string(), blockified.to_string());
}

/// `[top, right, bottom, left]` in the shortest equivalent form
fn compress(values: &[String]) -> String {
    match values {
        [t, r, b, l] if t == r && r == b && b == l => t.clone(),
        [t, r, b, l] if t == b && r == l => format!("{} {}", t, r),
        [t, r, b, l] if r == l => format!("{} {} {}", t, r, b),
        _ => values.join(" "),
    }
}

fn serialize_shorthands(properties: &mut BTreeMap<String, String>) {
    let collect = |properties: &BTreeMap<String, String>, names: Vec<String>| -> Option<Vec<String>> {
        names.iter().map(|name| properties.get(name).cloned()).collect()
    };

    for shorthand in ["margin", "padding"] {
        let names = SIDES.iter().map(|s| format!("{}-{}", shorthand, s)).collect();
        if let Some(values) = collect(properties, names) {
            properties.insert(shorthand.to_string(), compress(&values));
        }
    }
    for part in ["width", "style", "color"] {
        let names = SIDES.iter().map(|s| format!("border-{}-{}", s, part)).collect();
        if let Some(values) = collect(properties, names) {
            properties.insert(format!("border-{}", part), compress(&values));
        }
    }
    let corners = ["top-left", "top-right", "bottom-right", "bottom-left"]
        .iter()
        .map(|c| format!("border-{}-radius", c))
        .collect();
    if let Some(values) = collect(properties, corners) {
        properties.insert("border-radius".to_string(), compress(&values));
    }

    let borders: Vec<String> = ["border-width", "border-style", "border-color"]
        .iter()
        .filter_map(|name| properties.get(*name).cloned())
        .collect();
    if borders.len() == 3 && borders.iter().all(|value| !value.contains(' ')) {
        properties.insert("border".to_string(), borders.join(" "));
    }

    for (shorthand, first, second) in [
        ("overflow", "overflow-x", "overflow-y"),
        ("gap", "row-gap", "column-gap"),
    ] {
        if let Some(values) = collect(properties, vec![first.to_string(), second.to_string()]) {
            let value = if values[0] == values[1] {
                values[0].clone()
            } else {
                values.join(" ")
            };
            properties.insert(shorthand.to_string(), value);
        }
    }

    if let Some(values) = collect(
        properties,
        vec!["flex-grow".into(), "flex-shrink".into(), "flex-basis".into()],
    ) {
        properties.insert("flex".to_string(), values.join(" "));
    }
}

/// Computed styles for every element, indexed by preorder position from
/// the root element.
pub fn compute_styles(html: &Html, env: StyleEnv) -> Vec<ComputedStyle> {
    let media = MediaEnv {
        width: env.viewport_width,
        root_font_size: env.root_font_size,
    };

    let mut rules: Vec<(Origin, StyleRule)> = parse_stylesheet(USER_AGENT_CSS, &media)
        .rules
        .into_iter()
        .map(|rule| (Origin::UserAgent, rule))
        .collect();
    let mut layers: Vec<String> = Vec::new();

    let style_elements = html
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "style");
    for element in style_elements {
        if let Some(query) = element.value().attr("media") {
            if !media.matches(query) {
                continue;
            }
        }
        let text: String = element.text().collect();
        let sheet = parse_stylesheet(&text, &media);
        for name in sheet.layers {
            if !layers.contains(&name) {
                layers.push(name);
            }
        }
        rules.extend(sheet.rules.into_iter().map(|rule| (Origin::Author, rule)));
    }

    let cascade = Cascade::new(rules, layers, env);
    let mut styles: Vec<ComputedStyle> = Vec::new();
    let mut stack: Vec<(ElementRef, Option<usize>)> = vec![(html.root_element(), None)];

    while let Some((element, parent)) = stack.pop() {
        let style = cascade.compute(&element, parent.map(|index| &styles[index]));
        let index = styles.len();
        styles.push(style);

        let children: Vec<ElementRef> = element.children().filter_map(ElementRef::wrap).collect();
        stack.extend(children.into_iter().rev().map(|child| (child, Some(index))));
    }

    styles
}
