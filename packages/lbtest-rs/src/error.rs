use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort the whole suite run.
///
/// Everything in here points at a broken test artifact or environment. Failures
/// of the simulator, the diff tool or a shell check are not errors in this sense;
/// they are counted on the subtest record and the run continues.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("JSON file '{path}' seems to be broken ({source}). Please notify the test designer.")]
    DescriptorParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON file '{path}' lacks a '{field}' parameter. Please notify the test designer.")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("JSON file '{path}' has an invalid '{field}' parameter: {reason}")]
    InvalidField {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },

    #[error("Unknown comparison type '{0}'.")]
    UnknownComparison(String),

    #[error("Override set '{set}' in '{path}' is malformed: {reason}")]
    MalformedOverride {
        path: PathBuf,
        set: &'static str,
        reason: String,
    },

    #[error("Rank count parameter value '{0}' is not a bracketed list of integers.")]
    MalformedRankCount(String),

    #[error("Expected exactly one file matching '{pattern}', found {matches}.")]
    DatasetResolution { pattern: String, matches: usize },

    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build command returned {0}.")]
    BuildFailed(i32),

    #[error("Plotting script '{script}' returned {code}.")]
    PlotFailed { script: PathBuf, code: i32 },

    #[error("Coverage files '{0}' and '{1}' do not describe the same source.")]
    CoverageMismatch(PathBuf, PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_convert() {
        fn read_missing() -> Result<String> {
            Ok(std::fs::read_to_string("/nonexistent/lbtest/descriptor.json")?)
        }
        let err = read_missing().unwrap_err();
        assert!(matches!(err, HarnessError::Io(_)));
        assert!(err.to_string().starts_with("IO error: "));
    }
}
