/// Quotes a dotted field name for use in a structured query `FieldReference`.
///
/// Each dot separated component is wrapped in backticks with inner backticks escaped, so
/// `a.b` addresses the nested field `b` of map `a`.
pub fn quote_field_path(field: &str) -> String {
    field
        .split('.')
        .map(quote_segment)
        .collect::<Vec<_>>()
        .join(".")
}

/// Renders a top-level field name as an update mask entry.
///
/// The name is a single literal key, not a nested path. Simple identifiers
/// (`[A-Za-z_][A-Za-z0-9_]*`) are left untouched and anything else is quoted as a whole.
pub fn mask_field_path(field: &str) -> String {
    if is_simple_identifier(field) {
        field.to_string()
    } else {
        quote_segment(field)
    }
}

fn is_simple_identifier(field: &str) -> bool {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn quote_segment(segment: &str) -> String {
    format!("`{}`", segment.replace('`', "\\`"))
}
