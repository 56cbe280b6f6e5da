//! Chilean RUT canonicalization.
//!
//! Users type their RUT in many shapes (`12.345.678-9`, `12345678-9`,
//! `1234567k`). Everything that touches the identity store goes through
//! [`canonicalize`] first so those collapse to one key.

/// Strip everything except ASCII digits and the `K` check character, then uppercase.
pub fn canonicalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, 'k' | 'K'))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Render a canonical RUT in the dotted form older records were stored with:
/// body digits grouped in threes from the right, then `-` and the check character.
pub fn format_legacy(canonical: &str) -> String {
    let chars: Vec<char> = canonical.chars().collect();
    if chars.len() <= 1 {
        return canonical.to_string();
    }
    let (body, dv) = chars.split_at(chars.len() - 1);
    let dv = dv[0].to_ascii_uppercase();

    let mut grouped = String::with_capacity(body.len() + body.len() / 3 + 2);
    for (i, c) in body.iter().enumerate() {
        if i > 0 && (body.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }
    grouped.push('-');
    grouped.push(dv);
    grouped
}
