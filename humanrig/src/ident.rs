//! Identifier normalization shared by sub-mesh, joint, blend-shape and modifier names.

/// Turns an arbitrary name into an ASCII identifier.
///
/// Every character that is not allowed at its position is replaced with `_`:
/// the first character must be a letter or `_`, the rest letters, digits or `_`.
/// An empty input yields `_`.
pub fn make_valid_identifier(name: &str) -> String {
    if name.is_empty() {
        return "_".to_string();
    }

    let mut out = String::with_capacity(name.len());
    for (i, ch) in name.chars().enumerate() {
        let valid = if i == 0 {
            ch.is_ascii_alphabetic() || ch == '_'
        } else {
            ch.is_ascii_alphanumeric() || ch == '_'
        };
        out.push(if valid { ch } else { '_' });
    }
    out
}

pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && make_valid_identifier(name) == name
}
