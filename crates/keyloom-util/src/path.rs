//! Path utilities.
//!
//! All helpers here are lexical: they never touch the filesystem, so they work
//! for files that do not exist yet (history directories, new documents).

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Normalize a path by removing `.` and `..` components.
///
/// Unlike `canonicalize`, this doesn't require the path to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => {
                result.push(component);
            }
        }
    }

    result
}

/// Make `path` absolute against the current working directory, then normalize it.
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        match std::env::current_dir() {
            Ok(cwd) => normalize(&cwd.join(path)),
            Err(_) => normalize(path),
        }
    }
}

fn comparable(path: &Path) -> String {
    let text = normalize(path).to_string_lossy().replace('\\', "/");
    if cfg!(windows) {
        text.to_lowercase()
    } else {
        text
    }
}

/// Check whether `path` lies strictly inside `base`.
///
/// Comparison is lexical and case-insensitive on Windows. A path is not inside
/// itself.
pub fn is_within(path: &Path, base: &Path) -> bool {
    let path = comparable(path);
    let mut base = comparable(base);
    if path == base {
        return false;
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    path.starts_with(&base)
}

/// Like [`is_within`], but a path also counts as inside itself.
pub fn is_within_or_equal(path: &Path, base: &Path) -> bool {
    comparable(path) == comparable(base) || is_within(path, base)
}

/// Make a path relative to a base directory.
///
/// Returns `None` if the path is not within the base directory.
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    normalize(path)
        .strip_prefix(normalize(base))
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
}

/// Rewrite every `/` and `\` in `path` to the host separator.
pub fn to_native_separators(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    let native: String = text
        .chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect();
    PathBuf::from(native)
}

/// Render a path with forward slashes, for glob matching and display.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Final component of a path as an owned string.
pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
