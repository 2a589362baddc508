/// Canonical comparison form of a tag name.
///
/// Lowercases, trims, then strips exactly one trailing `s`. Irregular plurals
/// are not handled, and a name ending in `ss` keeps one `s`.
pub fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let trimmed = lowered.trim();
    trimmed.strip_suffix('s').unwrap_or(trimmed).to_string()
}
