//! Suffixed object names under an identifier-length limit.

/// Append `suffix` to `base`, truncating `base` so the result fits `max_len` characters.
pub fn suffixed(base: &str, suffix: &str, max_len: usize) -> String {
    let keep = max_len.saturating_sub(suffix.chars().count());
    let mut name: String = base.chars().take(keep).collect();
    name.push_str(suffix);
    name
}

/// `name` without a trailing `suffix` (ASCII case-insensitive), if it carries one
/// and something remains after stripping it.
pub fn strip_suffix<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    if suffix.is_empty() || name.len() <= suffix.len() {
        return None;
    }
    let split = name.len() - suffix.len();
    if !name.is_char_boundary(split) {
        return None;
    }
    let (base, tail) = name.split_at(split);
    tail.eq_ignore_ascii_case(suffix).then_some(base)
}
