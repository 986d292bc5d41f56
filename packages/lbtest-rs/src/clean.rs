//! Removing artifacts of previous runs from a test root.

use crate::descriptor::TestDescriptor;
use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};

/// Name of the source link created in test roots for coverage runs.
pub const SOURCE_LINK: &str = "src";

/// Remove the descriptor's clean paths, stray coverage listings, a leftover
/// source link and copied executables from its test root.
pub fn clean_test(descriptor: &TestDescriptor, tool_name: &str) -> Result<()> {
    log::info!("Cleaning test ...");
    let root = &descriptor.test_root;

    for entry in &descriptor.clean {
        for path in glob_in(root, entry)? {
            log::debug!("  Removing '{}'", path.display());
            remove_path(&path)?;
        }
    }

    for path in glob_in(root, "*.lst")? {
        log::debug!("  Removing '{}'", path.display());
        std::fs::remove_file(&path)?;
    }

    let link = root.join(SOURCE_LINK);
    if let Ok(meta) = std::fs::symlink_metadata(&link) {
        if meta.file_type().is_symlink() {
            std::fs::remove_file(&link)?;
        } else {
            log::warn!("  Not removing '{}': not a link.", link.display());
        }
    }

    for path in glob_in(root, &format!("{}-*-*-*", tool_name))? {
        log::debug!("  Removing '{}'", path.display());
        remove_path(&path)?;
    }

    Ok(())
}

fn remove_path(path: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Expand `pattern` relative to `dir`, with `dir` itself matched literally.
pub(crate) fn glob_in(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let search = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );
    let paths = glob::glob(&search).map_err(|e| HarnessError::InvalidPattern {
        pattern: search.clone(),
        reason: e.to_string(),
    })?;
    Ok(paths.filter_map(|p| p.ok()).collect())
}
