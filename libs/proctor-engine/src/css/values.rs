// Value parsing and computed-value serialization
use super::parser::value_tokens;
use std::fmt;

/// An sRGB color with alpha in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0.0,
    };

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, format_number(self.a))
        }
    }
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("red", (255, 0, 0)),
    ("green", (0, 128, 0)),
    ("blue", (0, 0, 255)),
    ("yellow", (255, 255, 0)),
    ("orange", (255, 165, 0)),
    ("purple", (128, 0, 128)),
    ("pink", (255, 192, 203)),
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
    ("silver", (192, 192, 192)),
    ("maroon", (128, 0, 0)),
    ("olive", (128, 128, 0)),
    ("lime", (0, 255, 0)),
    ("aqua", (0, 255, 255)),
    ("cyan", (0, 255, 255)),
    ("teal", (0, 128, 128)),
    ("navy", (0, 0, 128)),
    ("fuchsia", (255, 0, 255)),
    ("magenta", (255, 0, 255)),
    ("brown", (165, 42, 42)),
    ("gold", (255, 215, 0)),
    ("coral", (255, 127, 80)),
    ("crimson", (220, 20, 60)),
    ("tomato", (255, 99, 71)),
    ("salmon", (250, 128, 114)),
    ("khaki", (240, 230, 140)),
    ("indigo", (75, 0, 130)),
    ("violet", (238, 130, 238)),
    ("orchid", (218, 112, 214)),
    ("plum", (221, 160, 221)),
    ("beige", (245, 245, 220)),
    ("ivory", (255, 255, 240)),
    ("lavender", (230, 230, 250)),
    ("turquoise", (64, 224, 208)),
    ("tan", (210, 180, 140)),
    ("chocolate", (210, 105, 30)),
    ("skyblue", (135, 206, 235)),
    ("steelblue", (70, 130, 180)),
    ("royalblue", (65, 105, 225)),
    ("dodgerblue", (30, 144, 255)),
    ("lightblue", (173, 216, 230)),
    ("darkblue", (0, 0, 139)),
    ("lightgray", (211, 211, 211)),
    ("lightgrey", (211, 211, 211)),
    ("darkgray", (169, 169, 169)),
    ("darkgrey", (169, 169, 169)),
    ("dimgray", (105, 105, 105)),
    ("whitesmoke", (245, 245, 245)),
    ("gainsboro", (220, 220, 220)),
    ("darkgreen", (0, 100, 0)),
    ("lightgreen", (144, 238, 144)),
    ("seagreen", (46, 139, 87)),
    ("forestgreen", (34, 139, 34)),
    ("darkred", (139, 0, 0)),
    ("firebrick", (178, 34, 34)),
    ("hotpink", (255, 105, 180)),
    ("rebeccapurple", (102, 51, 153)),
    ("slategray", (112, 128, 144)),
    ("midnightblue", (25, 25, 112)),
    ("goldenrod", (218, 165, 32)),
    ("sienna", (160, 82, 45)),
];

/// Parse any color syntax except `currentcolor`
pub fn parse_color(input: &str) -> Option<Rgba> {
    let value = input.trim().to_ascii_lowercase();

    if value == "transparent" {
        return Some(Rgba::TRANSPARENT);
    }
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some((name, args)) = function_args(&value) {
        return match name {
            "rgb" | "rgba" => parse_rgb(args),
            "hsl" | "hsla" => parse_hsl(args),
            _ => None,
        };
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == value)
        .map(|&(_, (r, g, b))| Rgba::opaque(r, g, b))
}

pub fn is_color(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("currentcolor") || parse_color(input).is_some()
}

/// `name(args)` → `(name, args)`
fn function_args(value: &str) -> Option<(&str, &str)> {
    let open = value.find('(')?;
    let args = value[open + 1..].strip_suffix(')')?;
    Some((value[..open].trim(), args))
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expand = |i: usize| u8::from_str_radix(&hex[i..i + 1].repeat(2), 16).ok();
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let (r, g, b, a) = match hex.len() {
        3 => (expand(0)?, expand(1)?, expand(2)?, 255),
        4 => (expand(0)?, expand(1)?, expand(2)?, expand(3)?),
        6 => (pair(0)?, pair(2)?, pair(4)?, 255),
        8 => (pair(0)?, pair(2)?, pair(4)?, pair(6)?),
        _ => return None,
    };
    Some(Rgba {
        r,
        g,
        b,
        a: round_alpha(f64::from(a) / 255.0),
    })
}

/// Split color function arguments written with commas or spaces and `/`
fn color_components(args: &str) -> Vec<String> {
    args.replace(['/', ','], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn parse_channel(component: &str) -> Option<u8> {
    let value = match component.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? * 2.55,
        None => component.parse::<f64>().ok()?,
    };
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(component: Option<&String>) -> Option<f64> {
    let Some(component) = component else {
        return Some(1.0);
    };
    let value = match component.strip_suffix('%') {
        Some(pct) => pct.parse::<f64>().ok()? / 100.0,
        None => component.parse::<f64>().ok()?,
    };
    Some(round_alpha(value.clamp(0.0, 1.0)))
}

fn round_alpha(alpha: f64) -> f64 {
    (alpha * 1000.0).round() / 1000.0
}

fn parse_rgb(args: &str) -> Option<Rgba> {
    let parts = color_components(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    Some(Rgba {
        r: parse_channel(&parts[0])?,
        g: parse_channel(&parts[1])?,
        b: parse_channel(&parts[2])?,
        a: parse_alpha(parts.get(3))?,
    })
}

fn parse_hsl(args: &str) -> Option<Rgba> {
    let parts = color_components(args);
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let hue = parts[0]
        .strip_suffix("deg")
        .unwrap_or(parts[0].as_str())
        .parse::<f64>()
        .ok()?
        .rem_euclid(360.0);
    let saturation = parts[1].strip_suffix('%')?.parse::<f64>().ok()?.clamp(0.0, 100.0) / 100.0;
    let lightness = parts[2].strip_suffix('%')?.parse::<f64>().ok()?.clamp(0.0, 100.0) / 100.0;

    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = chroma * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = lightness - chroma / 2.0;
    let (r, g, b) = match hue {
        h if h < 60.0 => (chroma, x, 0.0),
        h if h < 120.0 => (x, chroma, 0.0),
        h if h < 180.0 => (0.0, chroma, x),
        h if h < 240.0 => (0.0, x, chroma),
        h if h < 300.0 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;

    Some(Rgba {
        r: channel(r),
        g: channel(g),
        b: channel(b),
        a: parse_alpha(parts.get(3))?,
    })
}

/// Resolve a length to pixels.
///
/// Percentages and unitless non-zero numbers are not lengths.
pub fn parse_length(input: &str, font_size: f64, root_font_size: f64, viewport_width: f64) -> Option<f64> {
    let value = input.trim().to_ascii_lowercase();
    let split = value
        .find(|c: char| c.is_ascii_alphabetic() || c == '%')
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;

    let px = match unit {
        "" if number == 0.0 => 0.0,
        "px" => number,
        "em" => number * font_size,
        "rem" => number * root_font_size,
        "pt" => number * 96.0 / 72.0,
        "pc" => number * 16.0,
        "in" => number * 96.0,
        "cm" => number * 96.0 / 2.54,
        "mm" => number * 96.0 / 25.4,
        "q" => number * 96.0 / 101.6,
        "vw" if viewport_width > 0.0 => number * viewport_width / 100.0,
        _ => return None,
    };
    Some(px)
}

/// Format like browsers serialize numbers: at most three decimals, no trailing zeros
pub fn format_number(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let text = format!("{:.3}", rounded);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn format_px(value: f64) -> String {
    format!("{}px", format_number(value))
}

/// Context needed to turn a cascaded value into a computed value
#[derive(Debug, Clone, Copy)]
pub struct ValueContext {
    pub font_size: f64,
    pub root_font_size: f64,
    pub viewport_width: f64,
    pub color: Rgba,
}

impl ValueContext {
    fn length(&self, token: &str) -> Option<f64> {
        parse_length(token, self.font_size, self.root_font_size, self.viewport_width)
    }
}

fn is_color_property(property: &str) -> bool {
    property == "color" || property.ends_with("-color") || property == "caret-color" || property == "fill" || property == "stroke"
}

fn is_length_property(property: &str) -> bool {
    matches!(
        property,
        "width"
            | "height"
            | "min-width"
            | "min-height"
            | "max-width"
            | "max-height"
            | "top"
            | "right"
            | "bottom"
            | "left"
            | "row-gap"
            | "column-gap"
            | "flex-basis"
            | "letter-spacing"
            | "word-spacing"
            | "text-indent"
            | "line-height"
            | "outline-width"
            | "outline-offset"
    ) || property.starts_with("margin-")
        || property.starts_with("padding-")
        || (property.starts_with("border-") && (property.ends_with("-width") || property.ends_with("-radius")))
}

/// Case-sensitive properties keep their authored spelling
fn preserves_case(property: &str) -> bool {
    matches!(property, "font-family" | "content" | "quotes" | "grid-template-areas" | "background-image")
}

/// Compute the serialized value of `property` from its cascaded value
pub fn normalize(property: &str, value: &str, ctx: &ValueContext) -> String {
    let trimmed = value.trim();

    if is_color_property(property) {
        if trimmed.eq_ignore_ascii_case("currentcolor") {
            return ctx.color.to_string();
        }
        return match parse_color(trimmed) {
            Some(color) => color.to_string(),
            None => trimmed.to_ascii_lowercase(),
        };
    }

    if property == "font-weight" {
        return match trimmed.to_ascii_lowercase().as_str() {
            "normal" => "400".to_string(),
            "bold" | "bolder" => "700".to_string(),
            "lighter" => "100".to_string(),
            other => other.to_string(),
        };
    }

    if (property.starts_with("border-") && property.ends_with("-width")) || property == "outline-width" {
        match trimmed.to_ascii_lowercase().as_str() {
            "thin" => return "1px".to_string(),
            "medium" => return "3px".to_string(),
            "thick" => return "5px".to_string(),
            _ => {}
        }
    }

    if is_length_property(property) {
        return value_tokens(trimmed)
            .into_iter()
            .map(|token| match ctx.length(token) {
                Some(px) => format_px(px),
                None => token.to_ascii_lowercase(),
            })
            .collect::<Vec<_>>()
            .join(" ");
    }

    let collapsed = value_tokens(trimmed).join(" ");
    if preserves_case(property) {
        collapsed
    } else {
        collapsed.to_ascii_lowercase()
    }
}

/// Keyword font sizes, then lengths and percentages relative to the parent
pub fn resolve_font_size(value: &str, parent: f64, root: f64, viewport_width: f64) -> Option<f64> {
    let lowered = value.trim().to_ascii_lowercase();
    let keyword = match lowered.as_str() {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(16.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "xxx-large" => Some(48.0),
        "smaller" => Some(parent / 1.2),
        "larger" => Some(parent * 1.2),
        _ => None,
    };
    if keyword.is_some() {
        return keyword;
    }
    if let Some(pct) = lowered.strip_suffix('%') {
        return pct.trim().parse::<f64>().ok().map(|p| parent * p / 100.0);
    }
    parse_length(&lowered, parent, root, viewport_width)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ValueContext {
        ValueContext {
            font_size: 20.0,
            root_font_size: 16.0,
            viewport_width: 1280.0,
            color: Rgba::opaque(1, 2, 3),
        }
    }

    #[test]
    fn test_color_syntaxes() {
        assert_eq!(parse_color("red"), Some(Rgba::opaque(255, 0, 0)));
        assert_eq!(parse_color("#0f0"), Some(Rgba::opaque(0, 255, 0)));
        assert_eq!(parse_color("#336699"), Some(Rgba::opaque(51, 102, 153)));
        assert_eq!(parse_color("rgb(10, 20, 30)"), Some(Rgba::opaque(10, 20, 30)));
        assert_eq!(parse_color("rgb(100% 0% 0%)"), Some(Rgba::opaque(255, 0, 0)));
        assert_eq!(parse_color("hsl(120, 100%, 50%)"), Some(Rgba::opaque(0, 255, 0)));
        assert_eq!(parse_color("bogus"), None);
        assert_eq!(parse_color("#12"), None);
        assert!(!is_color("no-repeat"));
    }

    #[test]
    fn test_color_serialization() {
        assert_eq!(parse_color("rgba(0, 0, 0, 0.5)").unwrap().to_string(), "rgba(0, 0, 0, 0.5)");
        assert_eq!(parse_color("transparent").unwrap().to_string(), "rgba(0, 0, 0, 0)");
        assert_eq!(parse_color("rgb(1 2 3 / 100%)").unwrap().to_string(), "rgb(1, 2, 3)");
        assert_eq!(normalize("color", "Blue", &ctx()), "rgb(0, 0, 255)");
        assert_eq!(normalize("border-top-color", "currentColor", &ctx()), "rgb(1, 2, 3)");
    }

    #[test]
    fn test_lengths() {
        assert_eq!(normalize("margin-top", "2em", &ctx()), "40px");
        assert_eq!(normalize("padding-left", "1.5rem", &ctx()), "24px");
        assert_eq!(normalize("width", "12pt", &ctx()), "16px");
        assert_eq!(normalize("width", "50%", &ctx()), "50%");
        assert_eq!(normalize("margin-left", "auto", &ctx()), "auto");
        assert_eq!(normalize("margin-left", "0", &ctx()), "0px");
        assert_eq!(normalize("border-top-width", "thick", &ctx()), "5px");
        assert_eq!(normalize("line-height", "1.5", &ctx()), "1.5");
        assert_eq!(normalize("width", "10vw", &ctx()), "128px");
    }

    #[test]
    fn test_keywords() {
        assert_eq!(normalize("font-weight", "bold", &ctx()), "700");
        assert_eq!(normalize("display", "  Flex ", &ctx()), "flex");
        assert_eq!(normalize("font-family", "Georgia,  serif", &ctx()), "Georgia, serif");
    }

    #[test]
    fn test_font_size_resolution() {
        assert_eq!(resolve_font_size("2em", 16.0, 16.0, 1280.0), Some(32.0));
        assert_eq!(resolve_font_size("150%", 20.0, 16.0, 1280.0), Some(30.0));
        assert_eq!(resolve_font_size("large", 16.0, 16.0, 1280.0), Some(18.0));
        assert_eq!(resolve_font_size("2rem", 40.0, 16.0, 1280.0), Some(32.0));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(10.72), "10.72");
        assert_eq!(format_number(1.0 / 3.0), "0.333");
        assert_eq!(format_number(-0.0001), "0");
    }
}
