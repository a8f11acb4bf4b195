//! Filesystem helpers.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Replace `path` with `content` all-or-nothing.
///
/// The content goes to a uniquely named sibling temp file that is then renamed
/// over the target, so readers see either the old or the new file and never a
/// partial write. Parent directories are created as needed.
pub async fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = temp_sibling(path);
    debug!(path = %path.display(), temp = %temp_path.display(), "Writing atomically");

    fs::write(&temp_path, content).await?;

    let rename_result = fs::rename(&temp_path, path).await;
    if rename_result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
    }
    rename_result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let random_suffix: u64 = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
        ^ (std::process::id() as u64);
    let temp_name = format!(
        ".{}.{:x}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        random_suffix
    );
    path.parent()
        .map(|p| p.join(&temp_name))
        .unwrap_or_else(|| PathBuf::from(&temp_name))
}
