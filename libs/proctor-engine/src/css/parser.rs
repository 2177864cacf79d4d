// Stylesheet parsing: rules, declarations, @media and shorthand expansion
use super::cascade::is_known_property;
use super::values::{is_color, parse_length};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    /// Selector list, split at top-level commas
    pub selectors: Vec<String>,
    pub declarations: Vec<Declaration>,
    /// Cascade layer the rule sits in, dotted for nested layers
    pub layer: Option<String>,
}

/// Media features a stylesheet is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct MediaEnv {
    pub width: f64,
    pub root_font_size: f64,
}

impl MediaEnv {
    /// Evaluate a media query list (`screen and (min-width: 600px), print`)
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        split_top_level(query, ',')
            .into_iter()
            .any(|q| self.matches_one(q))
    }

    fn matches_one(&self, query: &str) -> bool {
        let lowered = query.trim().to_ascii_lowercase();
        let (negated, rest) = match lowered.strip_prefix("not ") {
            Some(rest) => (true, rest),
            None => (false, lowered.strip_prefix("only ").unwrap_or(lowered.as_str())),
        };

        let matched = rest.split(" and ").all(|part| {
            let part = part.trim();
            if let Some(feature) = part.strip_prefix('(').and_then(|p| p.strip_suffix(')')) {
                self.feature(feature)
            } else {
                matches!(part, "" | "all" | "screen")
            }
        });

        matched != negated
    }

    fn feature(&self, feature: &str) -> bool {
        if let Some(matched) = self.range(feature) {
            return matched;
        }
        let Some((name, value)) = feature.split_once(':') else {
            return matches!(feature.trim(), "color" | "hover" | "pointer");
        };
        let value = value.trim();
        let px = || parse_length(value, self.root_font_size, self.root_font_size, self.width);
        match name.trim() {
            "min-width" => px().map_or(false, |px| self.width >= px),
            "max-width" => px().map_or(false, |px| self.width <= px),
            "width" => px().map_or(false, |px| (self.width - px).abs() < f64::EPSILON),
            "orientation" => value == "landscape",
            "prefers-color-scheme" => value == "light",
            "prefers-reduced-motion" => value == "no-preference",
            "hover" => value == "hover",
            "pointer" => value == "fine",
            _ => false,
        }
    }

    /// Range syntax: `width >= 600px`, `600px < width`, `400px <= width <= 700px`.
    ///
    /// `None` when the feature has no comparison operator.
    fn range(&self, feature: &str) -> Option<bool> {
        let mut operands = Vec::new();
        let mut operators = Vec::new();
        let mut rest = feature;
        while let Some(at) = rest.find(['<', '>', '=']) {
            let len = if rest[at + 1..].starts_with('=') { 2 } else { 1 };
            operands.push(rest[..at].trim());
            operators.push(&rest[at..at + len]);
            rest = &rest[at + len..];
        }
        if operators.is_empty() {
            return None;
        }
        operands.push(rest.trim());

        let is_name = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic() || c == '-');
        let value = |s: &str| {
            if is_name(s) {
                match s {
                    "width" => Some(self.width),
                    _ => None,
                }
            } else {
                parse_length(s, self.root_font_size, self.root_font_size, self.width)
            }
        };

        let matched = match (operands.as_slice(), operators.as_slice()) {
            (&[a, b], &[op]) if is_name(a) != is_name(b) => compare(value(a), op, value(b)),
            (&[low, name, high], &[first, second]) if is_name(name) && !is_name(low) && !is_name(high) => {
                // both comparisons point the same way
                first.starts_with('<') == second.starts_with('<')
                    && !first.starts_with('=')
                    && !second.starts_with('=')
                    && compare(value(low), first, value(name))
                    && compare(value(name), second, value(high))
            }
            _ => false,
        };
        Some(matched)
    }
}

fn compare(lhs: Option<f64>, operator: &str, rhs: Option<f64>) -> bool {
    let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
        return false;
    };
    match operator {
        "<" => lhs < rhs,
        "<=" => lhs <= rhs + f64::EPSILON,
        ">" => lhs > rhs,
        ">=" => lhs + f64::EPSILON >= rhs,
        "=" => (lhs - rhs).abs() < f64::EPSILON,
        _ => false,
    }
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("comment regex must compile"))
}

fn important_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\s*!\s*important\s*$").expect("important regex must compile"))
}

/// A parsed sheet: its rules plus every cascade layer name in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    pub rules: Vec<StyleRule>,
    pub layers: Vec<String>,
}

impl Stylesheet {
    fn declare_layer(&mut self, name: &str) {
        if !self.layers.iter().any(|layer| layer == name) {
            self.layers.push(name.to_string());
        }
    }
}

/// Parse a stylesheet, keeping only rules whose `@media` and `@supports`
/// conditions hold.
///
/// Malformed input is skipped the way browsers skip it: an unterminated
/// block drops the rest of the sheet, unknown at-rules are ignored.
pub fn parse_stylesheet(css: &str, media: &MediaEnv) -> Stylesheet {
    let stripped = comment_pattern().replace_all(css, "");
    let mut sheet = Stylesheet::default();
    let mut anonymous = 0;
    parse_rules(&stripped, media, None, &mut anonymous, &mut sheet);
    sheet
}

fn parse_rules(
    input: &str,
    media: &MediaEnv,
    layer: Option<&str>,
    anonymous: &mut usize,
    sheet: &mut Stylesheet,
) {
    let qualify = |name: &str| match layer {
        Some(outer) => format!("{}.{}", outer, name),
        None => name.to_string(),
    };

    let mut rest = input;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return;
        }

        let Some(open) = rest.find(['{', ';']) else {
            return;
        };
        if rest[open..].starts_with(';') {
            // `@layer a, b;` fixes layer order before any rule uses them
            if let Some(names) = layer_prelude(rest[..open].trim()) {
                for name in split_top_level(names, ',') {
                    let name = name.trim();
                    if !name.is_empty() {
                        sheet.declare_layer(&qualify(name));
                    }
                }
            }
            rest = &rest[open + 1..];
            continue;
        }

        let Some(close) = matching_brace(rest, open) else {
            return;
        };
        let prelude = rest[..open].trim();
        let body = &rest[open + 1..close];

        if let Some(name) = layer_prelude(prelude) {
            let name = match name.trim() {
                "" => {
                    *anonymous += 1;
                    qualify(&format!("#anonymous-{}", anonymous))
                }
                name => qualify(name),
            };
            sheet.declare_layer(&name);
            parse_rules(body, media, Some(&name), anonymous, sheet);
        } else if let Some(at_rule) = prelude.strip_prefix('@') {
            let lowered = at_rule.to_ascii_lowercase();
            let nested = if let Some(query) = lowered.strip_prefix("media") {
                media.matches(query)
            } else if lowered.starts_with("supports") {
                supports(&at_rule["supports".len()..])
            } else {
                false
            };
            if nested {
                parse_rules(body, media, layer, anonymous, sheet);
            }
        } else if !prelude.is_empty() {
            sheet.rules.push(StyleRule {
                selectors: split_top_level(prelude, ',')
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .collect(),
                declarations: parse_declarations(body),
                layer: layer.map(str::to_string),
            });
        }

        rest = &rest[close + 1..];
    }
}

/// Names after `@layer`, or `None` for any other prelude
fn layer_prelude(prelude: &str) -> Option<&str> {
    let head = prelude.get(..6)?;
    let tail = &prelude[6..];
    let separated = tail.is_empty() || tail.starts_with(char::is_whitespace);
    (head.eq_ignore_ascii_case("@layer") && separated).then_some(tail)
}

/// Evaluate an `@supports` condition.
///
/// Declarations are supported when the cascade knows the property and the
/// value expands cleanly. `selector()` is supported when the selector
/// compiles. Other functions are not supported.
pub fn supports(condition: &str) -> bool {
    let condition = condition.trim();
    if let Some(rest) = strip_not(condition) {
        return match next_group(rest) {
            Some((group, tail)) if tail.trim().is_empty() => !supports_group(group),
            _ => false,
        };
    }

    let mut results = Vec::new();
    let mut conjunctions = Vec::new();
    let mut rest = condition;
    loop {
        let Some((group, tail)) = next_group(rest) else {
            return false;
        };
        results.push(supports_group(group));

        let tail = tail.trim_start();
        if tail.is_empty() {
            break;
        }
        let Some((word, after)) = tail.split_once(char::is_whitespace) else {
            return false;
        };
        match word.to_ascii_lowercase().as_str() {
            "and" => conjunctions.push(true),
            "or" => conjunctions.push(false),
            _ => return false,
        }
        rest = after;
    }

    // `and` and `or` cannot be mixed without parentheses
    if conjunctions.windows(2).any(|pair| pair[0] != pair[1]) {
        return false;
    }
    match conjunctions.first() {
        Some(false) => results.into_iter().any(|r| r),
        _ => results.into_iter().all(|r| r),
    }
}

fn strip_not(condition: &str) -> Option<&str> {
    let head = condition.get(..3)?;
    let tail = &condition[3..];
    let separated = tail.starts_with(char::is_whitespace) || tail.starts_with('(');
    (head.eq_ignore_ascii_case("not") && separated).then_some(tail)
}

/// Split off the leading `( ... )` or `name( ... )` group
fn next_group(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    let open = input.find('(')?;
    if !input[..open].chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in input.char_indices().skip(open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&input[..=i], &input[i + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

fn supports_group(group: &str) -> bool {
    let open = group.find('(').unwrap_or(0);
    let name = group[..open].to_ascii_lowercase();
    let inner = group[open + 1..group.len() - 1].trim();

    match name.as_str() {
        "" if inner.starts_with('(') || strip_not(inner).is_some() => supports(inner),
        "" => match inner.split_once(':') {
            Some((property, value)) => supports_declaration(property.trim(), value.trim()),
            None => false,
        },
        "selector" => scraper::Selector::parse(inner).is_ok(),
        _ => false,
    }
}

fn supports_declaration(property: &str, value: &str) -> bool {
    let property = property.to_ascii_lowercase();
    if property.starts_with("--") {
        return true;
    }
    if value.is_empty() || important_pattern().is_match(value) {
        return false;
    }
    let longhands = expand_shorthand(&property, value);
    !longhands.is_empty() && longhands.iter().all(|(name, _)| is_known_property(name))
}

fn matching_brace(input: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in input[open..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '{') => depth += 1,
            (None, '}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split at `sep` outside parentheses, brackets and quotes
pub fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth -= 1,
            (None, c) if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Whitespace-separated components of a value, keeping `rgb(1, 2, 3)` whole
pub fn value_tokens(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    for (i, c) in value.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&value[s..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&value[s..]);
    }
    tokens
}

/// Parse a declaration block (or a `style` attribute) into longhands
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    for raw in split_top_level(block, ';') {
        let Some((property, value)) = raw.split_once(':') else {
            continue;
        };
        let property = property.trim().to_ascii_lowercase();
        let (value, important) = match important_pattern().find(value) {
            Some(m) => (&value[..m.start()], true),
            None => (value, false),
        };
        let value = value.trim();
        if property.is_empty() || value.is_empty() {
            continue;
        }

        for (property, value) in expand_shorthand(&property, value) {
            declarations.push(Declaration {
                property,
                value,
                important,
            });
        }
    }
    declarations
}

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];
const CORNERS: [&str; 4] = ["top-left", "top-right", "bottom-right", "bottom-left"];
const BORDER_STYLES: [&str; 10] = [
    "none", "hidden", "dotted", "dashed", "solid", "double", "groove", "ridge", "inset", "outset",
];
const WIDE_KEYWORDS: [&str; 3] = ["inherit", "initial", "unset"];

/// Expand a shorthand into `(longhand, value)` pairs; other properties pass through
pub fn expand_shorthand(property: &str, value: &str) -> Vec<(String, String)> {
    let longhands: Vec<String> = match property {
        "margin" | "padding" => SIDES.iter().map(|s| format!("{}-{}", property, s)).collect(),
        "inset" => SIDES.iter().map(|s| s.to_string()).collect(),
        "border-width" | "border-style" | "border-color" => {
            let suffix = &property["border-".len()..];
            SIDES.iter().map(|s| format!("border-{}-{}", s, suffix)).collect()
        }
        "border-radius" => CORNERS.iter().map(|c| format!("border-{}-radius", c)).collect(),
        "gap" | "grid-gap" => vec!["row-gap".into(), "column-gap".into()],
        "overflow" => vec!["overflow-x".into(), "overflow-y".into()],
        "border" => return expand_border(&SIDES, value),
        "border-top" | "border-right" | "border-bottom" | "border-left" => {
            return expand_border(&[&property["border-".len()..]], value)
        }
        "background" => return expand_background(value),
        "flex" => return expand_flex(value),
        "flex-flow" => return expand_flex_flow(value),
        _ => return vec![(property.to_string(), value.to_string())],
    };

    let lowered = value.to_ascii_lowercase();
    if WIDE_KEYWORDS.contains(&lowered.as_str()) {
        return longhands.into_iter().map(|p| (p, lowered.clone())).collect();
    }

    let tokens: Vec<&str> = match property {
        // elliptical radii are reduced to their horizontal part
        "border-radius" => value_tokens(value.split('/').next().unwrap_or(value)),
        _ => value_tokens(value),
    };

    let values: Vec<&str> = match longhands.len() {
        2 => match *tokens.as_slice() {
            [a] => vec![a, a],
            [a, b] => vec![a, b],
            _ => return Vec::new(),
        },
        _ => match *tokens.as_slice() {
            [a] => vec![a, a, a, a],
            [a, b] => vec![a, b, a, b],
            [a, b, c] => vec![a, b, c, b],
            [a, b, c, d] => vec![a, b, c, d],
            _ => return Vec::new(),
        },
    };

    longhands
        .into_iter()
        .zip(values)
        .map(|(p, v)| (p, v.to_string()))
        .collect()
}

fn expand_border(sides: &[&str], value: &str) -> Vec<(String, String)> {
    let lowered = value.to_ascii_lowercase();
    let (width, style, color) = if WIDE_KEYWORDS.contains(&lowered.as_str()) {
        (lowered.clone(), lowered.clone(), lowered)
    } else {
        let mut width = "medium".to_string();
        let mut style = "none".to_string();
        let mut color = "currentcolor".to_string();
        for token in value_tokens(value) {
            let lower = token.to_ascii_lowercase();
            if BORDER_STYLES.contains(&lower.as_str()) {
                style = lower;
            } else if matches!(lower.as_str(), "thin" | "medium" | "thick")
                || parse_length(token, 16.0, 16.0, 0.0).is_some()
            {
                width = token.to_string();
            } else {
                color = token.to_string();
            }
        }
        (width, style, color)
    };

    sides
        .iter()
        .flat_map(|side| {
            [
                (format!("border-{}-width", side), width.clone()),
                (format!("border-{}-style", side), style.clone()),
                (format!("border-{}-color", side), color.clone()),
            ]
        })
        .collect()
}

fn expand_background(value: &str) -> Vec<(String, String)> {
    let lowered = value.to_ascii_lowercase();
    if WIDE_KEYWORDS.contains(&lowered.as_str()) {
        return vec![
            ("background-color".into(), lowered.clone()),
            ("background-image".into(), lowered),
        ];
    }

    let mut color = "transparent".to_string();
    let mut image = "none".to_string();
    for token in value_tokens(value) {
        let lower = token.to_ascii_lowercase();
        if lower.starts_with("url(") || lower.contains("gradient(") {
            image = token.to_string();
        } else if is_color(token) {
            color = token.to_string();
        }
    }
    vec![
        ("background-color".into(), color),
        ("background-image".into(), image),
    ]
}

fn expand_flex(value: &str) -> Vec<(String, String)> {
    let lowered = value.trim().to_ascii_lowercase();
    let triple = |g: &str, s: &str, b: &str| {
        vec![
            ("flex-grow".to_string(), g.to_string()),
            ("flex-shrink".to_string(), s.to_string()),
            ("flex-basis".to_string(), b.to_string()),
        ]
    };
    let is_number = |t: &str| t.parse::<f64>().is_ok();

    match lowered.as_str() {
        "none" => return triple("0", "0", "auto"),
        "auto" => return triple("1", "1", "auto"),
        "initial" => return triple("0", "1", "auto"),
        "inherit" | "unset" => return triple(&lowered, &lowered, &lowered),
        _ => {}
    }

    match *value_tokens(&lowered).as_slice() {
        [g] if is_number(g) => triple(g, "1", "0%"),
        [b] => triple("1", "1", b),
        [g, s] if is_number(s) => triple(g, s, "0%"),
        [g, b] => triple(g, "1", b),
        [g, s, b] => triple(g, s, b),
        _ => Vec::new(),
    }
}

fn expand_flex_flow(value: &str) -> Vec<(String, String)> {
    let mut direction = "row".to_string();
    let mut wrap = "nowrap".to_string();
    for token in value_tokens(&value.to_ascii_lowercase()) {
        match token {
            "row" | "row-reverse" | "column" | "column-reverse" => direction = token.to_string(),
            "nowrap" | "wrap" | "wrap-reverse" => wrap = token.to_string(),
            _ => {}
        }
    }
    vec![
        ("flex-direction".into(), direction),
        ("flex-wrap".into(), wrap),
    ]
}

/// Specificity `(ids, classes, types)` of a single complex selector
pub fn specificity(selector: &str) -> (u32, u32, u32) {
    let chars: Vec<char> = selector.chars().collect();
    let (mut a, mut b, mut c) = (0u32, 0u32, 0u32);
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '#' => {
                a += 1;
                i = skip_ident(&chars, i + 1);
            }
            '.' => {
                b += 1;
                i = skip_ident(&chars, i + 1);
            }
            '[' => {
                b += 1;
                i = skip_past(&chars, i, '[', ']');
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                c += 1;
                i = skip_ident(&chars, i + 2);
                if chars.get(i) == Some(&'(') {
                    i = skip_past(&chars, i, '(', ')');
                }
            }
            ':' => {
                let end = skip_ident(&chars, i + 1);
                let name: String = chars[i + 1..end].iter().collect::<String>().to_ascii_lowercase();
                i = end;
                let argument = if chars.get(i) == Some(&'(') {
                    let close = skip_past(&chars, i, '(', ')');
                    let inner: String = chars[i + 1..close.saturating_sub(1).max(i + 1)].iter().collect();
                    i = close;
                    Some(inner)
                } else {
                    None
                };

                match (name.as_str(), argument) {
                    ("where", _) => {}
                    ("not" | "is" | "has" | "matches", Some(inner)) => {
                        let (a2, b2, c2) = split_top_level(&inner, ',')
                            .into_iter()
                            .map(specificity)
                            .max()
                            .unwrap_or_default();
                        a += a2;
                        b += b2;
                        c += c2;
                    }
                    ("before" | "after" | "first-line" | "first-letter", _) => c += 1,
                    _ => b += 1,
                }
            }
            ch if ch.is_alphabetic() || ch == '-' || ch == '_' => {
                c += 1;
                i = skip_ident(&chars, i);
            }
            _ => i += 1,
        }
    }

    (a, b, c)
}

fn skip_ident(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '-' || chars[i] == '_' || chars[i] == '\\') {
        if chars[i] == '\\' {
            i += 1;
        }
        i += 1;
    }
    i.min(chars.len())
}

/// Index just past the bracket matching `chars[start]`
fn skip_past(chars: &[char], start: usize, open: char, close: char) -> usize {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    for (offset, &ch) in chars[start..].iter().enumerate() {
        match (quote, ch) {
            (Some(q), ch) if ch == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, ch) if ch == open => depth += 1,
            (None, ch) if ch == close => {
                depth -= 1;
                if depth == 0 {
                    return start + offset + 1;
                }
            }
            _ => {}
        }
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESKTOP: MediaEnv = MediaEnv {
        width: 1280.0,
        root_font_size: 16.0,
    };

    fn lookup<'a>(decls: &'a [Declaration], property: &str) -> Option<&'a str> {
        decls
            .iter()
            .rev()
            .find(|d| d.property == property)
            .map(|d| d.value.as_str())
    }

    #[test]
    fn test_parse_rules_and_comments() {
        let rules = parse_stylesheet(
            "/* header */ h1, .title { color: red; /* inline */ margin: 0 }\n p{display:none!important}",
            &DESKTOP,
        )
        .rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].selectors, vec!["h1", ".title"]);
        assert_eq!(lookup(&rules[0].declarations, "color"), Some("red"));
        assert_eq!(lookup(&rules[0].declarations, "margin-left"), Some("0"));
        assert!(rules[1].declarations[0].important);
        assert_eq!(rules[1].declarations[0].value, "none");
    }

    #[test]
    fn test_media_queries() {
        let css = "@media (max-width: 600px) { .a { color: red } }\
                   @media screen and (min-width: 40em) { .b { color: blue } }\
                   @media print { .c { color: green } }\
                   @font-face { font-family: X; src: url(x.woff) }\
                   @import url(other.css);\
                   .d { color: black }";
        let rules = parse_stylesheet(css, &DESKTOP).rules;
        let selectors: Vec<&str> = rules.iter().map(|r| r.selectors[0].as_str()).collect();
        assert_eq!(selectors, vec![".b", ".d"]);

        let narrow = MediaEnv { width: 500.0, ..DESKTOP };
        assert!(narrow.matches("(max-width: 600px)"));
        assert!(narrow.matches("not print"));
        assert!(!narrow.matches("only screen and (min-width: 768px)"));
    }

    #[test]
    fn test_range_media_features() {
        let tablet = MediaEnv { width: 650.0, ..DESKTOP };
        assert!(tablet.matches("(width >= 600px)"));
        assert!(!tablet.matches("(width < 600px)"));
        assert!(tablet.matches("(600px <= width)"));
        assert!(tablet.matches("(400px <= width <= 700px)"));
        assert!(!tablet.matches("(700px < width < 900px)"));
        assert!(tablet.matches("screen and (width > 40em)"));
        assert!(!tablet.matches("(400px <= width >= 700px)"));
        assert!(!tablet.matches("(height > 100px)"));

        let rules = parse_stylesheet("@media (width >= 600px) { .wide { color: red } }", &tablet).rules;
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_supports_conditions() {
        assert!(supports("(display: grid)"));
        assert!(supports(" ( GAP : 1rem 2rem ) "));
        assert!(supports("(--accent: tomato)"));
        assert!(!supports("(display-mode: standalone)"));
        assert!(!supports("(margin: 1px 2px 3px 4px 5px)"));
        assert!(supports("not (frobnicate: yes)"));
        assert!(!supports("not (display: flex)"));
        assert!(supports("(display: flex) and (gap: 4px)"));
        assert!(!supports("(display: flex) and (frobnicate: yes)"));
        assert!(supports("(frobnicate: yes) or (display: grid)"));
        assert!(!supports("(display: flex) and (gap: 4px) or (color: red)"));
        assert!(supports("((display: grid) or (frobnicate: yes)) and (not (frobnicate: no))"));
        assert!(supports("selector(.a > .b)"));
        assert!(!supports("selector(a[)"));
        assert!(!supports("font-tech(color-COLRv1)"));
        assert!(!supports("display: grid"));
    }

    #[test]
    fn test_supports_and_layer_blocks() {
        let css = "@supports (display: grid) { .g { display: grid } }\
                   @supports not (display: grid) { .fallback { float: left } }\
                   @layer base, theme;\
                   @layer theme { .t { color: red } @media print { .p { color: blue } } }\
                   @layer base { @layer reset { .r { margin: 0 } } }\
                   @layer { .anon { color: green } }\
                   .plain { color: black }";
        let sheet = parse_stylesheet(css, &DESKTOP);
        let found: Vec<(&str, Option<&str>)> = sheet
            .rules
            .iter()
            .map(|r| (r.selectors[0].as_str(), r.layer.as_deref()))
            .collect();
        assert_eq!(
            found,
            vec![
                (".g", None),
                (".t", Some("theme")),
                (".r", Some("base.reset")),
                (".anon", Some("#anonymous-1")),
                (".plain", None),
            ]
        );
        assert_eq!(sheet.layers, vec!["base", "theme", "base.reset", "#anonymous-1"]);
    }

    #[test]
    fn test_unterminated_block_is_dropped() {
        let rules = parse_stylesheet(".ok { color: red } .broken { color: blue", &DESKTOP).rules;
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_box_shorthands() {
        let decls = parse_declarations("margin: 1px 2px 3px; padding: 4px 5px");
        assert_eq!(lookup(&decls, "margin-top"), Some("1px"));
        assert_eq!(lookup(&decls, "margin-right"), Some("2px"));
        assert_eq!(lookup(&decls, "margin-bottom"), Some("3px"));
        assert_eq!(lookup(&decls, "margin-left"), Some("2px"));
        assert_eq!(lookup(&decls, "padding-bottom"), Some("4px"));
        assert_eq!(lookup(&decls, "padding-left"), Some("5px"));
    }

    #[test]
    fn test_border_and_flex_shorthands() {
        let decls = parse_declarations("border: 2px solid rgb(1, 2, 3); flex: 1; flex-flow: column wrap");
        assert_eq!(lookup(&decls, "border-left-width"), Some("2px"));
        assert_eq!(lookup(&decls, "border-top-style"), Some("solid"));
        assert_eq!(lookup(&decls, "border-bottom-color"), Some("rgb(1, 2, 3)"));
        assert_eq!(lookup(&decls, "flex-grow"), Some("1"));
        assert_eq!(lookup(&decls, "flex-shrink"), Some("1"));
        assert_eq!(lookup(&decls, "flex-basis"), Some("0%"));
        assert_eq!(lookup(&decls, "flex-direction"), Some("column"));
        assert_eq!(lookup(&decls, "flex-wrap"), Some("wrap"));
    }

    #[test]
    fn test_background_and_gap() {
        let decls = parse_declarations("background: url(a.png) #fff no-repeat; gap: 1rem 2rem");
        assert_eq!(lookup(&decls, "background-color"), Some("#fff"));
        assert_eq!(lookup(&decls, "background-image"), Some("url(a.png)"));
        assert_eq!(lookup(&decls, "row-gap"), Some("1rem"));
        assert_eq!(lookup(&decls, "column-gap"), Some("2rem"));
    }

    #[test]
    fn test_data_uri_semicolon_is_not_a_separator() {
        let decls = parse_declarations("background-image: url(data:image/png;base64,AAA); color: red");
        assert_eq!(lookup(&decls, "background-image"), Some("url(data:image/png;base64,AAA)"));
        assert_eq!(lookup(&decls, "color"), Some("red"));
    }

    #[test]
    fn test_specificity() {
        assert_eq!(specificity("p"), (0, 0, 1));
        assert_eq!(specificity("ul li.active"), (0, 1, 2));
        assert_eq!(specificity("#nav > a:hover"), (1, 1, 1));
        assert_eq!(specificity("a[href^='http']::before"), (0, 1, 2));
        assert_eq!(specificity(":not(#x, .y) p"), (1, 0, 1));
        assert_eq!(specificity(":where(#x) p"), (0, 0, 1));
        assert_eq!(specificity("*"), (0, 0, 0));
        assert_eq!(specificity("li:nth-child(2n+1)"), (0, 1, 1));
    }
}
