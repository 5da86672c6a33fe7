//! Selection and archive path helpers
//!
//! Selection strings ending in `/` name folders, anything else names a file.

pub const SEPARATOR: char = '/';

pub fn is_directory_selection(selection: &str) -> bool {
    selection.ends_with(SEPARATOR)
}

/// Folder path to list for a folder selection: trailing separators removed,
/// with the root kept as `/`.
pub fn directory_path(selection: &str) -> &str {
    let trimmed = selection.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() && selection.starts_with(SEPARATOR) {
        "/"
    } else {
        trimmed
    }
}

/// Final path component, ignoring trailing separators.
///
/// - `docs/` -> `docs`
/// - `/a/b/c.txt` -> `c.txt`
/// - `/` -> ``
pub fn base_name(path: &str) -> &str {
    path.trim_end_matches(SEPARATOR)
        .rsplit(SEPARATOR)
        .next()
        .unwrap_or("")
}

/// Makes a provider-supplied name safe to use as one archive path component.
/// Returns `None` for names that cannot be one.
pub fn sanitize_component(name: &str) -> Option<String> {
    let cleaned = name.replace(['/', '\\'], "_");
    match cleaned.trim() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}

pub fn join_archive_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", prefix, SEPARATOR, name)
    }
}
