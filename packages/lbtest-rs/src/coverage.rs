//! Coverage listings: collecting, merging and the source link they need.
//!
//! The simulator writes one `.lst` file per source module into its working
//! directory. Each line is `<count>|<source line>`; the count may be blank for
//! lines that carry no code. Merging two listings sums the counts line by line.

use crate::build::ensure_executable;
use crate::clean::{glob_in, SOURCE_LINK};
use crate::command::CommandLine;
use crate::config::{BuildType, HarnessConfig, CONFIGURATIONS};
use crate::error::{HarnessError, Result};
use crate::executor::run_subtest;
use crate::report::TestRecord;
use std::path::{Path, PathBuf};

/// Location of the merged coverage set below the simulator root.
pub const COVERAGE_DIR: &str = "tests/coverage";

const LST_EXT: &str = ".lst";
const TMP_EXT: &str = ".lst.tmp";

pub fn coverage_path(sim_root: &Path) -> PathBuf {
    sim_root.join(COVERAGE_DIR)
}

/// Link from a working directory to the simulator sources, removed on drop.
///
/// Coverage listings refer to sources by relative path, so the sources have to
/// be reachable from wherever the simulator runs.
#[derive(Debug)]
pub struct SourceLink {
    link: PathBuf,
    created: bool,
}

impl SourceLink {
    /// Create `<dir>/src` pointing at `<sim_root>/src` unless something is already there.
    pub fn create(dir: &Path, sim_root: &Path) -> Result<Self> {
        let link = dir.join(SOURCE_LINK);
        if std::fs::symlink_metadata(&link).is_ok() {
            log::debug!("  Source link '{}' already present.", link.display());
            return Ok(Self {
                link,
                created: false,
            });
        }

        symlink_dir(&sim_root.join(SOURCE_LINK), &link)?;
        log::debug!("  Linked sources into '{}'.", dir.display());
        Ok(Self {
            link,
            created: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.link
    }
}

impl Drop for SourceLink {
    fn drop(&mut self) {
        if !self.created {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.link) {
            log::warn!("Failed to remove source link '{}': {}", self.link.display(), e);
        }
    }
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Merge the listing `other` into `target` by summing the per-line counts.
///
/// Both listings must describe the same source text line for line.
pub fn merge_lst(target: &Path, other: &Path) -> Result<()> {
    log::debug!(
        "  Merging coverage file '{}' into '{}' ...",
        other.display(),
        target.display()
    );
    let mismatch = || HarnessError::CoverageMismatch(target.to_path_buf(), other.to_path_buf());

    let first = std::fs::read_to_string(target)?;
    let second = std::fs::read_to_string(other)?;
    let mut second_lines = second.lines();

    let mut merged = String::with_capacity(first.len());
    for line in first.lines() {
        let line_other = second_lines.next().ok_or_else(mismatch)?;

        let Some((count, source)) = line.split_once('|') else {
            merged.push_str(line);
            merged.push('\n');
            continue;
        };
        let (count_other, source_other) = line_other.split_once('|').ok_or_else(mismatch)?;
        if source != source_other {
            return Err(mismatch());
        }

        let (count, count_other) = (count.trim(), count_other.trim());
        if count.is_empty() && count_other.is_empty() {
            merged.push_str(line);
        } else {
            let sum = parse_count(count, &mismatch)? + parse_count(count_other, &mismatch)?;
            merged.push_str(&format!("{}|{}", sum, source));
        }
        merged.push('\n');
    }

    std::fs::write(target, merged)?;
    Ok(())
}

fn parse_count(count: &str, mismatch: &impl Fn() -> HarnessError) -> Result<u64> {
    if count.is_empty() {
        return Ok(0);
    }
    count.parse().map_err(|_| mismatch())
}

/// Rename the listings in `dir` to `<module>-<configuration>.lst.tmp`.
pub fn stash_listings(dir: &Path, configuration: &str) -> Result<()> {
    for path in glob_in(dir, "*.lst")? {
        let name = file_name(&path);
        let stem = name.strip_suffix(LST_EXT).unwrap_or(&name);
        let target = dir.join(format!("{}-{}{}", stem, configuration, TMP_EXT));
        std::fs::rename(&path, target)?;
    }
    Ok(())
}

/// Combine the stashed per-configuration listings in `dir` into one set.
///
/// The first configuration's listings become the base; the others are merged
/// into it and removed.
pub fn merge_unittest_listings(dir: &Path) -> Result<()> {
    log::info!("Merging unittest coverage information ...");
    let Some((first, rest)) = CONFIGURATIONS.split_first() else {
        return Ok(());
    };

    let suffix = format!("-{}{}", first, TMP_EXT);
    for path in glob_in(dir, &format!("*{}", suffix))? {
        let name = file_name(&path);
        if let Some(stem) = name.strip_suffix(&suffix) {
            std::fs::rename(&path, dir.join(format!("{}{}", stem, LST_EXT)))?;
        }
    }

    for configuration in rest {
        for base in glob_in(dir, "*.lst")? {
            let name = file_name(&base);
            let stem = name.strip_suffix(LST_EXT).unwrap_or(&name);
            let other = dir.join(format!("{}-{}{}", stem, configuration, TMP_EXT));
            if !other.is_file() {
                log::warn!("  Missing coverage file '{}', skipping.", other.display());
                continue;
            }
            merge_lst(&base, &other)?;
            log::debug!("  Removing coverage file '{}' ...", other.display());
            std::fs::remove_file(&other)?;
        }
    }
    Ok(())
}

/// Merge the listings a runnable test left in its root into the coverage set.
pub fn merge_runnable(coverage_dir: &Path, test_root: &Path) -> Result<()> {
    log::info!("Merging runnable coverage information ...");
    for base in glob_in(coverage_dir, "*.lst")? {
        let other = test_root.join(file_name(&base));
        if other.is_file() {
            merge_lst(&base, &other)?;
        } else {
            log::debug!("  No coverage file '{}' for this test.", other.display());
        }
    }
    Ok(())
}

/// Build and run the unittests of every configuration and merge their coverage.
///
/// Returns one record with a subtest per configuration.
pub async fn run_unittests(config: &HarnessConfig) -> Result<TestRecord> {
    log::info!("Preparing to run unittests ...");
    let config = config.with_build_type(BuildType::UnittestCov);
    let dir = coverage_path(&config.sim_root);
    std::fs::create_dir_all(&dir)?;
    let _link = SourceLink::create(&dir, &config.sim_root)?;

    let mut record = TestRecord::new("unittests", CONFIGURATIONS.len());
    for (subtest, configuration) in record.subtests.iter_mut().zip(CONFIGURATIONS) {
        subtest.label = format!("unittests[{}]", configuration);

        let exe = ensure_executable(&config, configuration).await?;
        log::info!("Running unittests ...");
        let command = CommandLine::new(exe.display().to_string())
            .arg("-v")
            .arg(config.sim_verbosity.as_str())
            .arg("--version");
        let (outcome, errors) = run_subtest(&command, &dir).await?;
        subtest.elapsed_secs = outcome.elapsed_secs();
        subtest.errors = errors;

        stash_listings(&dir, configuration)?;
    }

    merge_unittest_listings(&dir)?;
    Ok(record)
}

/// Remove the coverage directory.
pub fn clean_coverage(sim_root: &Path) -> Result<()> {
    let dir = coverage_path(sim_root);
    if dir.exists() {
        log::info!("Removing coverage directory ...");
        std::fs::remove_dir_all(&dir)?;
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default()
}
