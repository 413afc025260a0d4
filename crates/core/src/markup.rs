//! Text output for the generated markup dialect.

use crate::description::Color;
use std::fmt::Display;

const INDENT: &str = "    ";

/// Appends indented object blocks and properties.
#[derive(Debug, Default)]
pub(crate) struct MarkupWriter {
    out: String,
    depth: usize,
}

impl MarkupWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn pad(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    pub fn open(&mut self, type_name: &str) {
        self.pad();
        self.out.push_str(type_name);
        self.out.push_str(" {\n");
        self.depth += 1;
    }

    pub fn property(&mut self, name: &str, value: impl Display) {
        self.pad();
        self.out.push_str(&format!("{}: {}\n", name, value));
    }

    pub fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.pad();
        self.out.push_str("}\n");
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.out.into_bytes()
    }
}

/// Formats a number with at most three decimals and no trailing zeros.
pub(crate) fn number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        return format!("{}", rounded as i64);
    }
    let text = format!("{:.3}", rounded);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// A double-quoted string literal.
pub(crate) fn quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// A quoted `#rrggbb` color, or `#aarrggbb` when not fully opaque.
pub(crate) fn color(color: &Color, opacity: f64) -> String {
    let alpha = channel(color.a * opacity);
    let (r, g, b) = (channel(color.r), channel(color.g), channel(color.b));
    if alpha == 255 {
        format!("\"#{:02x}{:02x}{:02x}\"", r, g, b)
    } else {
        format!("\"#{:02x}{:02x}{:02x}{:02x}\"", alpha, r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_indents_nested_blocks() {
        let mut w = MarkupWriter::new();
        w.open("Item");
        w.property("width", number(10.0));
        w.open("Text");
        w.property("text", quoted("hi"));
        w.close();
        w.close();
        let text = String::from_utf8(w.into_bytes()).unwrap();
        assert_eq!(
            text,
            "Item {\n    width: 10\n    Text {\n        text: \"hi\"\n    }\n}\n"
        );
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(number(12.0), "12");
        assert_eq!(number(-3.5), "-3.5");
        assert_eq!(number(0.1 + 0.2), "0.3");
        assert_eq!(number(1.23456), "1.235");
        assert_eq!(number(-0.0), "0");
        assert_eq!(number(f64::NAN), "0");
    }

    #[test]
    fn test_quoted_escapes() {
        assert_eq!(quoted("a \"b\"\n\\"), "\"a \\\"b\\\"\\n\\\\\"");
    }

    #[test]
    fn test_color_formatting() {
        let red = Color { r: 1.0, g: 0.0, b: 0.0, a: 1.0 };
        assert_eq!(color(&red, 1.0), "\"#ff0000\"");
        assert_eq!(color(&red, 0.5), "\"#80ff0000\"");
    }
}
