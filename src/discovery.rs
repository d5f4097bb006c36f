//! Input discovery for batch mode.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{AnalyzerError, Result};

/// Image extensions picked up in batch mode (matched case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Recursively collect image files under `root`, sorted by path.
pub fn discover_images(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(AnalyzerError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "input root is not a directory"),
        ));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_file() && has_image_extension(path) {
            files.push(path.to_path_buf());
        }
    }

    tracing::info!("discovered {} images under {}", files.len(), root.display());
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
