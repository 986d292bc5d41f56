//! Discovery of descriptors and the sequential suite run.

use crate::build::ensure_executable;
use crate::clean::clean_test;
use crate::command::build_command;
use crate::compare::{compare, substitute_tokens};
use crate::config::{BuildType, Compiler, HarnessConfig};
use crate::coverage::{clean_coverage, coverage_path, merge_runnable, run_unittests, SourceLink};
use crate::descriptor::TestDescriptor;
use crate::error::Result;
use crate::executor::run_subtest;
use crate::matrix::{derive_rank_count, expand};
use crate::plot::{plot_test, PlotSource};
use crate::report::TestRecord;
use crate::timers::{clean_timers_data, move_timers_data};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// What to do with each discovered descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteAction {
    /// Clean, build, run the subtests and compare.
    Run,
    /// Only clean test roots (and the coverage directory).
    Clean,
    /// Only render the reference data with each test's plot scripts.
    PlotReference,
    /// Only remove collected timer data.
    TimersClean,
}

/// All descriptors below a search root, in path order.
#[derive(Debug)]
pub struct Suite {
    base: PathBuf,
    descriptors: Vec<TestDescriptor>,
    single_test: bool,
}

impl Suite {
    /// Collect every descriptor below `search_root`.
    ///
    /// Files whose name contains `.json` are descriptors. If `search_root` is a
    /// file, it is the only descriptor and is never treated as disabled.
    pub fn discover<P: AsRef<Path>>(search_root: P) -> Result<Self> {
        let root = std::fs::canonicalize(search_root.as_ref())?;

        if root.is_file() {
            let mut descriptor = TestDescriptor::load(&root)?;
            descriptor.disabled = false;
            let base = descriptor.test_root.clone();
            return Ok(Self {
                base,
                descriptors: vec![descriptor],
                single_test: true,
            });
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().contains(".json"))
            .map(|e| e.into_path())
            .collect();
        paths.sort();
        log::debug!("Found {} descriptor(s) below '{}'.", paths.len(), root.display());

        let descriptors = paths
            .iter()
            .map(TestDescriptor::load)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            base: root,
            descriptors,
            single_test: false,
        })
    }

    pub fn descriptors(&self) -> &[TestDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn is_single_test(&self) -> bool {
        self.single_test
    }

    /// Report label of a descriptor: its directory below the search root and its name.
    pub fn label(&self, descriptor: &TestDescriptor) -> String {
        let relative = descriptor
            .test_root
            .strip_prefix(&self.base)
            .unwrap_or(&descriptor.test_root);
        let mut parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if parts.last() != Some(&descriptor.name) {
            parts.push(descriptor.name.clone());
        }
        parts.join("/")
    }

    /// Descriptions of all descriptors carrying `only_tag` (or all, if `None`).
    pub fn describe(&self, only_tag: Option<&str>) -> String {
        let total = self.descriptors.len();
        self.descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| only_tag.map_or(true, |tag| d.has_tag(tag)))
            .map(|(i, d)| d.describe(i, total))
            .collect()
    }

    /// Process every descriptor in order and return one record per processed test.
    ///
    /// The first fatal error stops the run; later descriptors are not touched.
    pub async fn run(&self, config: &HarnessConfig, action: SuiteAction) -> Result<Vec<TestRecord>> {
        let mut records = Vec::new();

        if action == SuiteAction::Clean {
            clean_coverage(&config.sim_root)?;
        }

        let mut config = config.clone();
        if action == SuiteAction::Run && (config.coverage || config.coverage_unittest) {
            if !config.compiler.is_baseline() {
                log::info!(
                    "Coverage information is generated only by {}, skipping coverage ...",
                    Compiler::BASELINE.as_str()
                );
                return Ok(records);
            }
            clean_coverage(&config.sim_root)?;
            records.push(run_unittests(&config).await?);
            if !config.coverage {
                return Ok(records);
            }
            config = config.with_build_type(BuildType::Cov);
        }

        for (index, descriptor) in self.descriptors.iter().enumerate() {
            if action == SuiteAction::Run && config.timers_all {
                for compiler in Compiler::ALL {
                    let config = config.with_compiler(compiler);
                    let mut record = self.process(&config, action, descriptor, index).await?;
                    record.append_label_suffix(&format!(" ({})", compiler.as_str()));
                    records.push(record);
                }
            } else {
                records.push(self.process(&config, action, descriptor, index).await?);
            }
        }

        Ok(records)
    }

    async fn process(
        &self,
        config: &HarnessConfig,
        action: SuiteAction,
        descriptor: &TestDescriptor,
        index: usize,
    ) -> Result<TestRecord> {
        let mut record = TestRecord::new(self.label(descriptor), descriptor.subtest_count());
        record.disabled = descriptor.disabled;

        if let Some(tag) = &config.only_tag {
            if !descriptor.has_tag(tag) {
                log::debug!(
                    "Test '{}' does not have the required tag '{}', skipping ...",
                    descriptor.name,
                    tag
                );
                record.mark_skipped();
                return Ok(record);
            }
        }

        log::info!("{}", descriptor.describe(index, self.len()).trim_end());

        if descriptor.disabled {
            log::info!("Test '{}' has been disabled, skipping ...", descriptor.name);
            return Ok(record);
        }

        match action {
            SuiteAction::TimersClean => {
                clean_timers_data(&descriptor.test_root)?;
                return Ok(record);
            }
            SuiteAction::PlotReference => {
                plot_test(descriptor, PlotSource::Reference).await?;
                return Ok(record);
            }
            SuiteAction::Clean | SuiteAction::Run => {}
        }

        clean_test(descriptor, &config.tool_name)?;
        if action == SuiteAction::Clean {
            return Ok(record);
        }

        ensure_executable(config, &descriptor.configuration).await?;

        if config.coverage {
            let _link = SourceLink::create(&descriptor.test_root, &config.sim_root)?;
            self.run_subtests(config, descriptor, &mut record).await?;
            merge_runnable(&coverage_path(&config.sim_root), &descriptor.test_root)?;
        } else {
            self.run_subtests(config, descriptor, &mut record).await?;
        }

        if config.plot {
            plot_test(descriptor, PlotSource::Output).await?;
        }

        Ok(record)
    }

    async fn run_subtests(
        &self,
        config: &HarnessConfig,
        descriptor: &TestDescriptor,
        record: &mut TestRecord,
    ) -> Result<()> {
        log::info!("Running subtests ...");
        let matrix = expand(&descriptor.parameters);
        let total = matrix.count();
        if total == 0 {
            log::warn!("Test '{}' has a parameter without values, nothing to run.", descriptor.name);
        }

        for (i, (combination, subtest)) in matrix.iter().zip(record.subtests.iter_mut()).enumerate() {
            if config.only_first && i > 0 {
                subtest.skipped = true;
                continue;
            }

            let rank_count = derive_rank_count(&combination, descriptor.np)?;
            if config.only_serial && rank_count > 1 {
                log::info!(
                    "  Skipping parameter set {} of {}: needs {} ranks.",
                    i + 1,
                    total,
                    rank_count
                );
                subtest.skipped = true;
                continue;
            }

            if config.only_first && total > 1 {
                log::info!("  Running parameter set {} of {} (only this one will be executed) ...", i + 1, total);
            } else {
                log::info!("  Running parameter set {} of {} ...", i + 1, total);
            }

            let command = build_command(config, descriptor, &combination, rank_count);
            let (outcome, errors) = run_subtest(&command, &descriptor.test_root).await?;
            subtest.elapsed_secs = outcome.elapsed_secs();
            subtest.errors = errors;

            if config.timers_enabled() {
                move_timers_data(&descriptor.test_root, config.compiler)?;
            }

            if config.comparisons_enabled() {
                let spec = substitute_tokens(descriptor.active_compare(config.fast), &combination, rank_count)?;
                subtest.errors += compare(&spec, &descriptor.test_root, config).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_descriptor(path: &Path, name: &str, tags: &[&str]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let json = serde_json::json!({
            "name": name,
            "description": format!("{} test.", name),
            "configuration": "d2q9",
            "input-file": "input.par",
            "clean": [],
            "tags": tags,
            "compare": { "comparison": [], "data": [] }
        });
        std::fs::write(path, json.to_string()).unwrap();
    }

    #[test]
    fn test_discovery_is_sorted_and_marks_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write_descriptor(&root.join("lb/poiseuille/poiseuille.json"), "poiseuille", &[]);
        write_descriptor(&root.join("elec/capacitor/capacitor.json.disabled"), "capacitor", &[]);
        write_descriptor(&root.join("lb/couette/couette.json"), "couette", &["fast"]);
        std::fs::write(root.join("lb/couette/couette.par"), "").unwrap();

        let suite = Suite::discover(root).unwrap();
        let names: Vec<&str> = suite.descriptors().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["capacitor", "couette", "poiseuille"]);
        assert!(suite.descriptors()[0].disabled);
        assert!(!suite.is_single_test());
        assert_eq!(suite.label(&suite.descriptors()[1]), "lb/couette");
    }

    #[test]
    fn test_single_file_ignores_disabled_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x/x.json.disabled");
        write_descriptor(&path, "x", &[]);

        let suite = Suite::discover(&path).unwrap();
        assert!(suite.is_single_test());
        assert_eq!(suite.len(), 1);
        assert!(!suite.descriptors()[0].disabled);
        assert_eq!(suite.label(&suite.descriptors()[0]), "x");
    }

    #[test]
    fn test_broken_descriptor_fails_discovery() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("broken.json"), "{").unwrap();
        assert!(Suite::discover(tmp.path()).is_err());
    }

    #[test]
    fn test_describe_honours_tag_filter() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(&tmp.path().join("a/a.json"), "a", &["fast"]);
        write_descriptor(&tmp.path().join("b/b.json"), "b", &[]);

        let suite = Suite::discover(tmp.path()).unwrap();
        let all = suite.describe(None);
        assert!(all.contains("01/02 a ("));
        assert!(all.contains("02/02 b ("));

        let tagged = suite.describe(Some("fast"));
        assert!(tagged.contains("01/02 a ("));
        assert!(!tagged.contains(" b ("));
    }

    #[tokio::test]
    async fn test_only_tag_skips_without_running() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(&tmp.path().join("a/a.json"), "a", &[]);
        let suite = Suite::discover(tmp.path()).unwrap();

        let config = HarnessConfig {
            sim_root: tmp.path().to_path_buf(),
            launcher: "/nonexistent/launcher".to_string(),
            only_tag: Some("fast".to_string()),
            ..HarnessConfig::default()
        };
        let records = suite.run(&config, SuiteAction::Run).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].skipped());
    }

    #[tokio::test]
    async fn test_timers_clean_action() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(&tmp.path().join("a/a.json"), "a", &[]);
        std::fs::create_dir_all(tmp.path().join("a/timers")).unwrap();
        let suite = Suite::discover(tmp.path()).unwrap();

        suite
            .run(&HarnessConfig::default(), SuiteAction::TimersClean)
            .await
            .unwrap();
        assert!(!tmp.path().join("a/timers").exists());
    }

    #[tokio::test]
    async fn test_coverage_with_other_compiler_does_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        write_descriptor(&tmp.path().join("a/a.json"), "a", &[]);
        let suite = Suite::discover(tmp.path()).unwrap();

        let config = HarnessConfig {
            compiler: Compiler::Gdc,
            coverage: true,
            ..HarnessConfig::default()
        };
        assert!(suite.run(&config, SuiteAction::Run).await.unwrap().is_empty());
    }
}
