/// Turn a human-readable label into a snake_case key.
///
/// "Bathrooms (F/H)" → "bathrooms_f_h" | "Year Built" → "year_built"
///
/// Slashes separate words, parentheses vanish without leaving a gap, and
/// every other run of non-ASCII-alphanumerics collapses to one underscore.
/// Leading and trailing underscores are never emitted.
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;

    for ch in label.chars() {
        match ch {
            '(' | ')' => {}
            c if c.is_ascii_alphanumeric() => {
                if pending_sep && !out.is_empty() {
                    out.push('_');
                }
                pending_sep = false;
                out.push(c.to_ascii_lowercase());
            }
            _ => pending_sep = true,
        }
    }
    out
}
