//! Comparison of subtest output against reference data.

use crate::command::CommandLine;
use crate::config::{Compiler, HarnessConfig};
use crate::descriptor::{ComparisonKind, ComparisonSpec};
use crate::error::{HarnessError, Result};
use crate::executor::run_process;
use crate::matrix::ParameterCombination;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Directory below the test root where the simulator writes its output.
pub const OUTPUT_DIR: &str = "output";

/// Directory below the test root holding the reference datasets.
pub const REFERENCE_DIR: &str = "reference-data";

/// Dataset inside each output file that is compared.
pub const DATASET_PATH: &str = "/OutArray";

/// Token replaced by each entry of `data` when resolving files.
pub const DATA_TOKEN: &str = "%data%";

/// Token replaced by the effective rank count of the subtest.
pub const NP_TOKEN: &str = "%np%";

/// Shell-check exit code that is reported but not counted as an error.
pub const IGNORED_CHECK_CODE: i32 = 1;

/// Produce a copy of `spec` with the subtest's parameter and rank tokens filled in.
///
/// `%<key>%` becomes the parameter value. For bracketed list values,
/// `%<key>[i]%` and `%<key>[i][j]%` select single elements. `%data%` is left
/// for dataset resolution.
pub fn substitute_tokens(
    spec: &ComparisonSpec,
    combination: &ParameterCombination,
    rank_count: u32,
) -> Result<ComparisonSpec> {
    let mut out = spec.clone();
    for comparison in &mut out.comparisons {
        let mut files = comparison.files.clone();
        for (key, value) in combination.iter() {
            if value.contains('[') {
                files = substitute_indexed(&files, key, value)?;
            }
            files = files.replace(&format!("%{}%", key), value);
        }
        comparison.files = files.replace(NP_TOKEN, &rank_count.to_string());
    }
    Ok(out)
}

fn substitute_indexed(files: &str, key: &str, value: &str) -> Result<String> {
    let pattern = Regex::new(&format!(r"%{}((?:\[[0-9]+\])+)%", regex::escape(key))).map_err(|e| {
        HarnessError::InvalidPattern {
            pattern: key.to_string(),
            reason: e.to_string(),
        }
    })?;
    if !pattern.is_match(files) {
        return Ok(files.to_string());
    }

    let parsed: serde_json::Value =
        serde_json::from_str(value).map_err(|e| HarnessError::InvalidPattern {
            pattern: files.to_string(),
            reason: format!("value '{}' of '{}' is not a list: {}", value, key, e),
        })?;

    let mut failure = None;
    let replaced = pattern.replace_all(files, |caps: &regex::Captures| {
        let indices = caps[1]
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split("][")
            .filter_map(|i| i.parse::<usize>().ok());

        let mut element = &parsed;
        for i in indices {
            match element.get(i) {
                Some(e) => element = e,
                None => {
                    failure.get_or_insert_with(|| caps[0].to_string());
                    return caps[0].to_string();
                }
            }
        }
        match element {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    });

    match failure {
        Some(token) => Err(HarnessError::InvalidPattern {
            pattern: files.to_string(),
            reason: format!("token '{}' is out of range for value '{}'", token, value),
        }),
        None => Ok(replaced.into_owned()),
    }
}

/// Whether a comparison's accuracy cutoff is passed to the diff tool.
///
/// Non-baseline compilers get the cutoff unless `strict`; the baseline
/// compiler only gets it when `lax`.
pub fn applies_tolerance(compiler: Compiler, strict: bool, lax: bool) -> bool {
    (!strict && !compiler.is_baseline()) || (lax && compiler.is_baseline())
}

/// Find the single file matching `pattern` below `dir`.
///
/// Zero or several matches are fatal: reference data must be unambiguous.
pub fn resolve_single(dir: &Path, pattern: &str) -> Result<PathBuf> {
    let dir_str = dir.to_str().ok_or_else(|| HarnessError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: format!("directory '{}' is not valid UTF-8", dir.display()),
    })?;
    let search = format!("{}/{}", glob::Pattern::escape(dir_str), pattern);

    let paths = glob::glob(&search).map_err(|e| HarnessError::InvalidPattern {
        pattern: search.clone(),
        reason: e.to_string(),
    })?;

    let mut matches: Vec<PathBuf> = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => matches.push(path),
            Err(e) => log::warn!("glob error: {}", e),
        }
    }

    if matches.len() == 1 {
        Ok(matches.remove(0))
    } else {
        Err(HarnessError::DatasetResolution {
            pattern: search,
            matches: matches.len(),
        })
    }
}

/// Diff-tool invocation for one dataset pair.
pub fn diff_command(
    diff_tool: &str,
    accuracy: Option<&str>,
    expected: &Path,
    actual: &Path,
) -> CommandLine {
    let mut cmd = CommandLine::new(diff_tool);
    if let Some(acc) = accuracy {
        cmd = cmd.arg("-d").arg(acc);
    }
    cmd.arg(expected.display().to_string())
        .arg(actual.display().to_string())
        .arg(DATASET_PATH)
}

/// Run every comparison and shell check of `spec` for one subtest.
///
/// Returns the number of failed comparisons and checks. Tokens other than
/// `%data%` must already be substituted.
pub async fn compare(spec: &ComparisonSpec, test_root: &Path, config: &HarnessConfig) -> Result<u32> {
    log::info!("Comparing test result to reference data ...");
    let mut errors = 0;

    let tolerance = applies_tolerance(config.compiler, config.compare_strict, config.compare_lax);

    for comparison in &spec.comparisons {
        match comparison.kind {
            ComparisonKind::H5diff => {
                let accuracy = comparison.accuracy.as_deref().filter(|_| tolerance);
                if let Some(acc) = accuracy {
                    log::debug!("  Applying accuracy cutoff '{}' ...", acc);
                }

                for data in &spec.data {
                    let pattern = comparison.files.replace(DATA_TOKEN, data);
                    let actual = resolve_single(&test_root.join(OUTPUT_DIR), &pattern)?;
                    let expected = resolve_single(&test_root.join(REFERENCE_DIR), &pattern)?;

                    let cmd = diff_command(&config.diff_tool, accuracy, &expected, &actual);
                    let outcome = run_process(&cmd, test_root).await?;
                    if !outcome.success() {
                        errors += 1;
                        log::error!("{} returned {}.", config.diff_tool, outcome.code());
                    }
                }
            }
        }
    }

    if !spec.shell.is_empty() {
        log::info!("Running additional compare scripts ...");
    }
    for script in &spec.shell {
        let Some(cmd) = CommandLine::from_words(script) else {
            log::warn!("  Skipping empty compare script entry.");
            continue;
        };
        let outcome = run_process(&cmd.resolved_in(test_root), test_root).await?;
        match outcome.code() {
            0 => {}
            IGNORED_CHECK_CODE => {
                log::info!("  Script '{}' returned {} - ignored.", script, IGNORED_CHECK_CODE)
            }
            code => {
                errors += 1;
                log::error!("Script '{}' returned {}.", script, code);
            }
        }
    }

    if errors == 0 {
        log::info!("  No errors found.");
    }
    Ok(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Comparison;

    fn spec(files: &str) -> ComparisonSpec {
        ComparisonSpec {
            comparisons: vec![Comparison {
                kind: ComparisonKind::H5diff,
                files: files.to_string(),
                accuracy: Some("1e-5".to_string()),
            }],
            data: vec!["density-red".to_string()],
            shell: Vec::new(),
        }
    }

    fn combo(pairs: &[(&str, &str)]) -> ParameterCombination {
        ParameterCombination::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_tolerance_selection() {
        assert!(!applies_tolerance(Compiler::Dmd, false, false));
        assert!(applies_tolerance(Compiler::Gdc, false, false));
        assert!(applies_tolerance(Compiler::Ldc2, false, false));
        assert!(applies_tolerance(Compiler::Dmd, false, true));
        assert!(!applies_tolerance(Compiler::Gdc, true, false));
        assert!(applies_tolerance(Compiler::Dmd, true, true));
    }

    #[test]
    fn test_diff_command_with_and_without_accuracy() {
        let exp = Path::new("ref/a.h5");
        let act = Path::new("out/a.h5");
        assert_eq!(
            diff_command("h5diff", Some("1e-5"), exp, act).to_vec(),
            vec!["h5diff", "-d", "1e-5", "ref/a.h5", "out/a.h5", "/OutArray"]
        );
        assert_eq!(
            diff_command("h5diff", None, exp, act).to_vec(),
            vec!["h5diff", "ref/a.h5", "out/a.h5", "/OutArray"]
        );
    }

    #[test]
    fn test_substitution_replaces_parameters_and_np() {
        let base = spec("%data%-res%lb.resolution%-np%np%-*.h5");
        let out = substitute_tokens(&base, &combo(&[("lb.resolution", "20")]), 4).unwrap();
        assert_eq!(out.comparisons[0].files, "%data%-res20-np4-*.h5");
    }

    #[test]
    fn test_substitution_does_not_leak_between_subtests() {
        let base = spec("%data%-%lb.resolution%-*.h5");
        let a = substitute_tokens(&base, &combo(&[("lb.resolution", "10")]), 1).unwrap();
        let b = substitute_tokens(&base, &combo(&[("lb.resolution", "20")]), 1).unwrap();
        assert_eq!(a.comparisons[0].files, "%data%-10-*.h5");
        assert_eq!(b.comparisons[0].files, "%data%-20-*.h5");
        assert_eq!(base.comparisons[0].files, "%data%-%lb.resolution%-*.h5");

        let again = substitute_tokens(&base, &combo(&[("lb.resolution", "10")]), 1).unwrap();
        assert_eq!(again, a);
    }

    #[test]
    fn test_substitution_of_indexed_list_values() {
        let base = spec("%data%-x%parallel.nc[0]%-y%parallel.nc[1]%-*.h5");
        let out = substitute_tokens(&base, &combo(&[("parallel.nc", "[2,3]")]), 6).unwrap();
        assert_eq!(out.comparisons[0].files, "%data%-x2-y3-*.h5");

        let base = spec("%data%-%lb.walls[1][0]%.h5");
        let out = substitute_tokens(&base, &combo(&[("lb.walls", "[[1,2],[3,4]]")]), 1).unwrap();
        assert_eq!(out.comparisons[0].files, "%data%-3.h5");
    }

    #[test]
    fn test_substitution_index_out_of_range() {
        let base = spec("%data%-%parallel.nc[5]%.h5");
        let err = substitute_tokens(&base, &combo(&[("parallel.nc", "[2,3]")]), 6).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidPattern { .. }));
    }

    #[test]
    fn test_resolve_single_match() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("density-red-t00000100.h5"), "").unwrap();
        let found = resolve_single(tmp.path(), "density-red-*.h5").unwrap();
        assert!(found.ends_with("density-red-t00000100.h5"));
    }

    #[test]
    fn test_resolve_zero_or_many_matches_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve_single(tmp.path(), "density-red-*.h5").unwrap_err();
        assert!(matches!(err, HarnessError::DatasetResolution { matches: 0, .. }));

        std::fs::write(tmp.path().join("density-red-t1.h5"), "").unwrap();
        std::fs::write(tmp.path().join("density-red-t2.h5"), "").unwrap();
        let err = resolve_single(tmp.path(), "density-red-*.h5").unwrap_err();
        assert!(matches!(err, HarnessError::DatasetResolution { matches: 2, .. }));
    }
}
