//! Test descriptors: one JSON file per runnable test.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Parameter whose bracketed value list sets the number of ranks of a subtest.
pub const RANK_COUNT_PARAMETER: &str = "parallel.nc";

/// File-name marker that disables a descriptor.
pub const DISABLED_MARKER: &str = "disabled";

/// One named parameter and the values it is swept over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "parameter", alias = "key")]
    pub key: String,
    pub values: Vec<String>,
}

/// Supported comparison kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonKind {
    H5diff,
}

impl ComparisonKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "h5diff" => Some(Self::H5diff),
            _ => None,
        }
    }
}

/// A single dataset comparison rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub kind: ComparisonKind,
    /// File pattern relative to `output/` and `reference-data/`, with
    /// `%data%`, `%np%` and `%<parameter>%` tokens.
    pub files: String,
    pub accuracy: Option<String>,
}

/// Everything that is checked after a subtest has run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ComparisonSpec {
    pub comparisons: Vec<Comparison>,
    pub data: Vec<String>,
    pub shell: Vec<String>,
}

/// Extra parameters (and optionally a replacement comparison) for coverage or fast mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverrideSet {
    /// `key=value` strings, passed on as `--parameter key=value`.
    pub parameters: Vec<String>,
    pub compare: Option<ComparisonSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
}

/// A fully validated test descriptor.
#[derive(Debug, Clone, Serialize)]
pub struct TestDescriptor {
    pub name: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub configuration: String,
    pub input_file: String,
    pub np: u32,
    pub clean: Vec<String>,
    pub parameters: Vec<ParameterSpec>,
    pub compare: ComparisonSpec,
    pub coverage: Option<OverrideSet>,
    pub fast: Option<OverrideSet>,
    pub checkpoint: Option<Checkpoint>,
    pub plot: Vec<String>,
    /// Path of the descriptor file itself.
    pub file_path: PathBuf,
    /// Directory containing the descriptor; subtests run here.
    pub test_root: PathBuf,
    pub disabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawDescriptor {
    name: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
    configuration: Option<String>,
    input_file: Option<String>,
    np: Option<u32>,
    clean: Option<Vec<String>>,
    parameters: Option<Vec<ParameterSpec>>,
    compare: Option<RawCompare>,
    coverage: Option<RawOverride>,
    fast: Option<RawOverride>,
    checkpoint: Option<Checkpoint>,
    plot: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawCompare {
    comparison: Option<Vec<RawComparison>>,
    data: Option<Vec<String>>,
    shell: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawComparison {
    #[serde(rename = "type")]
    kind: Option<String>,
    files: Option<String>,
    accuracy: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawOverride {
    parameters: Option<Vec<String>>,
    compare: Option<RawCompare>,
}

impl TestDescriptor {
    /// Load and validate a descriptor file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_json(path, &content)
    }

    /// Validate descriptor JSON read from `path`.
    pub fn from_json(path: &Path, content: &str) -> Result<Self> {
        let raw: RawDescriptor =
            serde_json::from_str(content).map_err(|source| HarnessError::DescriptorParse {
                path: path.to_path_buf(),
                source,
            })?;

        let missing = |field: &'static str| HarnessError::MissingField {
            path: path.to_path_buf(),
            field,
        };

        let name = raw.name.ok_or_else(|| missing("name"))?;
        let description = raw.description.ok_or_else(|| missing("description"))?;
        let configuration = raw.configuration.ok_or_else(|| missing("configuration"))?;
        let input_file = raw.input_file.ok_or_else(|| missing("input-file"))?;
        let clean = raw.clean.ok_or_else(|| missing("clean"))?;
        let compare = raw.compare.ok_or_else(|| missing("compare"))?;
        let compare = ComparisonSpec::from_raw(compare, path)?;

        let np = match raw.np {
            None => {
                log::debug!("JSON file '{}' lacks an 'np' parameter. Set to 1 by default.", path.display());
                1
            }
            Some(0) => {
                return Err(HarnessError::InvalidField {
                    path: path.to_path_buf(),
                    field: "np",
                    reason: "rank count must be at least 1".to_string(),
                })
            }
            Some(n) => n,
        };

        let coverage = raw
            .coverage
            .map(|o| OverrideSet::from_raw(o, path, "coverage"))
            .transpose()?;
        let fast = raw
            .fast
            .map(|o| OverrideSet::from_raw(o, path, "fast"))
            .transpose()?;

        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let test_root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            name,
            description,
            tags: raw.tags.unwrap_or_default().into_iter().collect(),
            configuration,
            input_file,
            np,
            clean,
            parameters: raw.parameters.unwrap_or_default(),
            compare,
            coverage,
            fast,
            checkpoint: raw.checkpoint,
            plot: raw.plot.unwrap_or_default(),
            file_path: path.to_path_buf(),
            test_root,
            disabled: file_name.contains(DISABLED_MARKER),
        })
    }

    /// Number of subtests defined by the parameter matrix.
    pub fn subtest_count(&self) -> usize {
        self.parameters.iter().map(|p| p.values.len()).product()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// The comparison rules in effect, honouring a fast-mode replacement.
    pub fn active_compare(&self, fast: bool) -> &ComparisonSpec {
        match &self.fast {
            Some(OverrideSet {
                compare: Some(compare),
                ..
            }) if fast => compare,
            _ => &self.compare,
        }
    }

    /// Human-readable summary used by `--describe` and before each test.
    ///
    /// `index` is zero-based, `total` the number of discovered descriptors.
    pub fn describe(&self, index: usize, total: usize) -> String {
        let mut out = format!(
            "{:02}/{:02} {} ({}) [{}]:\n",
            index + 1,
            total,
            self.name,
            self.file_path.display(),
            self.configuration
        );
        out.push_str(&wrap_text(&self.description, 80, 6));
        out.push('\n');
        out
    }
}

impl ComparisonSpec {
    fn from_raw(raw: RawCompare, path: &Path) -> Result<Self> {
        let comparisons = match raw.comparison {
            Some(c) => c,
            None => {
                log::warn!("Parameter compare in '{}' does not contain any comparisons.", path.display());
                Vec::new()
            }
        };

        let comparisons = comparisons
            .into_iter()
            .map(|c| {
                let kind = c.kind.ok_or_else(|| HarnessError::MissingField {
                    path: path.to_path_buf(),
                    field: "compare.comparison.type",
                })?;
                let kind = ComparisonKind::from_str(&kind)
                    .ok_or(HarnessError::UnknownComparison(kind))?;
                let files = c.files.ok_or_else(|| HarnessError::MissingField {
                    path: path.to_path_buf(),
                    field: "compare.comparison.files",
                })?;
                let accuracy = match c.accuracy {
                    None | Some(serde_json::Value::Null) => None,
                    Some(serde_json::Value::String(s)) => Some(s),
                    Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                    Some(other) => {
                        return Err(HarnessError::InvalidField {
                            path: path.to_path_buf(),
                            field: "compare.comparison.accuracy",
                            reason: format!("expected a string or number, found {}", other),
                        })
                    }
                };
                Ok(Comparison {
                    kind,
                    files,
                    accuracy,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            comparisons,
            data: raw.data.unwrap_or_default(),
            shell: raw.shell.unwrap_or_default(),
        })
    }
}

impl OverrideSet {
    fn from_raw(raw: RawOverride, path: &Path, set: &'static str) -> Result<Self> {
        let malformed = |reason: String| HarnessError::MalformedOverride {
            path: path.to_path_buf(),
            set,
            reason,
        };

        let parameters = raw
            .parameters
            .ok_or_else(|| malformed("missing 'parameters'".to_string()))?;
        if let Some(bad) = parameters.iter().find(|p| !p.contains('=')) {
            return Err(malformed(format!("'{}' is not of the form key=value", bad)));
        }

        let compare = raw
            .compare
            .map(|c| ComparisonSpec::from_raw(c, path))
            .transpose()?;

        Ok(Self {
            parameters,
            compare,
        })
    }
}

/// Greedy word wrap with a fixed indent on every line.
fn wrap_text(text: &str, width: usize, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let mut lines: Vec<String> = Vec::new();
    let mut current = pad.clone();

    for word in text.split_whitespace() {
        let fits = current.len() == indent || current.len() + 1 + word.len() <= width;
        if !fits {
            lines.push(std::mem::replace(&mut current, pad.clone()));
        }
        if current.len() > indent {
            current.push(' ');
        }
        current.push_str(word);
    }
    if current.len() > indent {
        lines.push(current);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "name": "poiseuille-2d",
        "description": "Poiseuille flow between two walls.",
        "configuration": "d2q9",
        "input-file": "poiseuille-2d.par",
        "clean": ["output"],
        "compare": {
            "comparison": [ { "type": "h5diff", "files": "%data%-*.h5" } ],
            "data": ["density-red"]
        }
    }"#;

    fn load(json: &str) -> Result<TestDescriptor> {
        TestDescriptor::from_json(Path::new("tests/lb/poiseuille-2d/poiseuille-2d.json"), json)
    }

    #[test]
    fn test_minimal_descriptor_defaults() {
        let d = load(MINIMAL).unwrap();
        assert_eq!(d.name, "poiseuille-2d");
        assert_eq!(d.np, 1);
        assert!(d.tags.is_empty());
        assert!(d.plot.is_empty());
        assert!(d.checkpoint.is_none());
        assert!(d.coverage.is_none());
        assert!(d.fast.is_none());
        assert!(!d.disabled);
        assert_eq!(d.subtest_count(), 1);
        assert_eq!(d.test_root, PathBuf::from("tests/lb/poiseuille-2d"));
        assert_eq!(d.compare.comparisons[0].kind, ComparisonKind::H5diff);
        assert!(d.compare.shell.is_empty());
    }

    #[test]
    fn test_missing_mandatory_fields() {
        for field in ["name", "description", "configuration", "input-file", "clean", "compare"] {
            let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
            value.as_object_mut().unwrap().remove(field);
            let err = load(&value.to_string()).unwrap_err();
            match err {
                HarnessError::MissingField { field: f, .. } => assert_eq!(f, field),
                other => panic!("unexpected error for {}: {}", field, other),
            }
        }
    }

    #[test]
    fn test_broken_json_names_path() {
        let err = load("{ \"name\": ").unwrap_err();
        assert!(matches!(err, HarnessError::DescriptorParse { .. }));
        assert!(err.to_string().contains("poiseuille-2d.json"));
    }

    #[test]
    fn test_unknown_comparison_type_is_fatal() {
        let json = MINIMAL.replace("h5diff", "ncdiff");
        let err = load(&json).unwrap_err();
        assert!(matches!(err, HarnessError::UnknownComparison(ref k) if k == "ncdiff"));
    }

    #[test]
    fn test_parameter_key_alias_and_count() {
        let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        value["parameters"] = serde_json::json!([
            { "parameter": "lb.init", "values": ["a", "b", "c"] },
            { "key": "resolution", "values": ["10", "20"] }
        ]);
        let d = load(&value.to_string()).unwrap();
        assert_eq!(d.parameters[1].key, "resolution");
        assert_eq!(d.subtest_count(), 6);
    }

    #[test]
    fn test_override_without_parameters_is_fatal() {
        let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        value["fast"] = serde_json::json!({ "compare": { "comparison": [], "data": [] } });
        let err = load(&value.to_string()).unwrap_err();
        assert!(matches!(err, HarnessError::MalformedOverride { set: "fast", .. }));
    }

    #[test]
    fn test_fast_compare_replaces_base_compare() {
        let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        value["fast"] = serde_json::json!({
            "parameters": ["timestep.n=10"],
            "compare": { "comparison": [], "data": [], "shell": ["./check.sh"] }
        });
        let d = load(&value.to_string()).unwrap();
        assert_eq!(d.active_compare(true).shell, vec!["./check.sh".to_string()]);
        assert_eq!(d.active_compare(false).data, vec!["density-red".to_string()]);
    }

    #[test]
    fn test_numeric_accuracy_is_kept_as_text() {
        let json = MINIMAL.replace(
            r#""files": "%data%-*.h5""#,
            r#""files": "%data%-*.h5", "accuracy": 0.5"#,
        );
        let d = load(&json).unwrap();
        assert_eq!(d.compare.comparisons[0].accuracy.as_deref(), Some("0.5"));
    }

    #[test]
    fn test_disabled_marker_from_file_name() {
        let d = TestDescriptor::from_json(Path::new("lb/x/x.json.disabled"), MINIMAL).unwrap();
        assert!(d.disabled);
    }

    #[test]
    fn test_zero_rank_count_rejected() {
        let mut value: serde_json::Value = serde_json::from_str(MINIMAL).unwrap();
        value["np"] = serde_json::json!(0);
        assert!(matches!(
            load(&value.to_string()).unwrap_err(),
            HarnessError::InvalidField { field: "np", .. }
        ));
    }

    #[test]
    fn test_describe_wraps_description() {
        let mut d = load(MINIMAL).unwrap();
        d.description = "word ".repeat(40);
        let text = d.describe(0, 12);
        assert!(text.starts_with("01/12 poiseuille-2d ("));
        assert!(text.contains("[d2q9]:"));
        for line in text.lines().skip(1) {
            assert!(line.len() <= 80);
            assert!(line.starts_with("      word"));
        }
    }
}
