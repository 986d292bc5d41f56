//! Collection of simulator timer output.

use crate::compare::OUTPUT_DIR;
use crate::config::Compiler;
use crate::error::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory below the test root that collects timer files.
pub const TIMERS_DIR: &str = "timers";

/// Run timestamp the simulator embeds in output file names.
const RUN_STAMP: &str = r"-[0-9]{8}T[0-9]{6}-t[0-9]{8}";

pub fn timers_path(test_root: &Path) -> PathBuf {
    test_root.join(TIMERS_DIR)
}

/// Archive name of a timer file: run stamp removed, compiler appended.
pub fn timers_file_name(source: &str, compiler: Compiler) -> String {
    let stripped = match Regex::new(RUN_STAMP) {
        Ok(re) => re.replace_all(source, "").into_owned(),
        Err(_) => source.to_string(),
    };
    match stripped.strip_suffix(".asc") {
        Some(stem) => format!("{}-{}.asc", stem, compiler.as_str()),
        None => format!("{}-{}", stripped, compiler.as_str()),
    }
}

/// Move all `timers*.asc` files written below `output/` into the timers directory.
///
/// Returns the number of files moved.
pub fn move_timers_data(test_root: &Path, compiler: Compiler) -> Result<usize> {
    let output = test_root.join(OUTPUT_DIR);
    if !output.is_dir() {
        log::debug!("  No output directory, no timer data to collect.");
        return Ok(0);
    }

    let sources: Vec<PathBuf> = WalkDir::new(&output)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_timers_file(&e.file_name().to_string_lossy()))
        .map(|e| e.into_path())
        .collect();

    let target_dir = timers_path(test_root);
    std::fs::create_dir_all(&target_dir)?;

    for source in &sources {
        let name = source
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = target_dir.join(timers_file_name(&name, compiler));
        log::debug!("  Moving '{}' to '{}'", source.display(), target.display());
        std::fs::rename(source, &target)?;
    }

    Ok(sources.len())
}

fn is_timers_file(name: &str) -> bool {
    name.starts_with("timers") && name.ends_with(".asc")
}

/// Remove the timers directory of a test.
pub fn clean_timers_data(test_root: &Path) -> Result<()> {
    log::info!("Cleaning timer data ...");
    let path = timers_path(test_root);
    if path.exists() {
        log::info!("  Removing timers directory ...");
        std::fs::remove_dir_all(&path)?;
    }
    Ok(())
}
