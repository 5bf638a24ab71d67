// Cache path utilities.
// Resolves the persistent-store directory and maps store keys to file names.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};

/// Extension of persisted entry files.
pub const ENTRY_EXTENSION: &str = "json";

/// Get the base cache directory (~/.cache/feedreel on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "feedreel").map(|dirs| dirs.cache_dir().join("posts"))
}

/// Store key for a post URL.
pub fn store_key(prefix: &str, url: &str) -> String {
    format!("{}{}", prefix, url)
}

/// File holding the entry for `key`. Keys are hashed so any URL maps to a safe name;
/// the sanitized prefix stays readable so entries of one store can be told apart.
pub fn entry_path(dir: &Path, prefix: &str, key: &str) -> PathBuf {
    let digest = Sha256::digest(key.as_bytes());
    dir.join(format!(
        "{}{}.{}",
        sanitize_name(prefix),
        hex::encode(digest),
        ENTRY_EXTENSION
    ))
}

/// Whether `file_name` is an entry file written under `prefix`.
pub fn is_entry_file(file_name: &str, prefix: &str) -> bool {
    file_name.starts_with(&sanitize_name(prefix))
        && file_name.ends_with(&format!(".{}", ENTRY_EXTENSION))
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
