use std::fs;
use std::path::Path;

use crate::errors::FeedResult;

/// Targets listed one per line; blank lines and `#` comments are skipped.
pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_list(path: &Path) -> FeedResult<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_list(&content))
}

/// Atom output path for a feed name inside `dir`.
pub fn atom_path(dir: &Path, name: &str) -> std::path::PathBuf {
    dir.join(format!("{}.atom", name))
}
