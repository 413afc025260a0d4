//! Name sanitizing for generated artifacts.
//!
//! Component names become type names in the generated markup, so they must be
//! valid identifiers. Element and image names only need to be safe on disk.

/// Suffix carried by every component and sub-component name.
pub const COMPONENT_SUFFIX: &str = "_component";

/// Replaces every character that is not an ASCII letter, digit or underscore.
///
/// An empty input yields `"_"` so the result can always be used as a file stem.
pub fn make_file_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// Derives a component type name: an identifier starting with an upper-case
/// letter and ending in [`COMPONENT_SUFFIX`].
pub fn component_name(name: &str) -> String {
    let mut base = make_file_name(name);
    if base.ends_with(COMPONENT_SUFFIX) {
        base.truncate(base.len() - COMPONENT_SUFFIX.len());
    }
    let mut chars = base.chars();
    let mut ident = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            let mut s = first.to_ascii_uppercase().to_string();
            s.push_str(chars.as_str());
            s
        }
        _ => format!("C{}", base),
    };
    ident.push_str(COMPONENT_SUFFIX);
    ident
}

/// Derives an element name safe for use in `<canvas>_<element>` file names.
pub fn element_name(name: &str) -> String {
    make_file_name(name)
}

/// Owner key of an element in image contexts and export filters. Element
/// names repeat across canvases, so the canvas name qualifies them; this is
/// also the stem of the element's markup file.
pub fn element_owner(canvas: &str, element: &str) -> String {
    format!("{}_{}", make_file_name(canvas), element)
}

/// Derives the stem of an image file from an opaque image reference.
///
/// Only characters that are unsafe in file names are replaced, so distinct
/// references stay distinct unless they differ only in those characters.
pub fn image_file_stem(image_ref: &str) -> String {
    const UNSAFE: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', ';'];
    let stem: String = image_ref
        .chars()
        .map(|c| if UNSAFE.contains(&c) || c.is_whitespace() { '_' } else { c })
        .collect();
    if stem.is_empty() { "_".to_string() } else { stem }
}
