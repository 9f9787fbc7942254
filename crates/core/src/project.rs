//! Title normalization and the asset-store path layout derived from it.

/// Top-level folder holding every project's assets.
pub const PROJECTS_ROOT: &str = "projects";

/// Trims the title and replaces every character outside `[A-Za-z0-9]` with `_`.
pub fn normalize_title(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Folder prefix for a project's assets, with trailing slash.
pub fn project_prefix(title: &str) -> String {
    format!("{}/{}/", PROJECTS_ROOT, normalize_title(title))
}

pub fn asset_path(title: &str, file_name: &str) -> String {
    format!("{}{}", project_prefix(title), file_name)
}

/// True when two titles map onto the same storage folder.
pub fn same_folder(a: &str, b: &str) -> bool {
    normalize_title(a) == normalize_title(b)
}
