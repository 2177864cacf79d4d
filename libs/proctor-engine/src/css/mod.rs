// Computed-style resolution for the style adapter
pub mod cascade;
pub mod parser;
pub mod values;

pub use cascade::{compute_styles, ComputedStyle, StyleEnv};

/// `border-top-width` → `borderTopWidth`
pub fn camel_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len());
    let mut upper = false;
    for c in property.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
