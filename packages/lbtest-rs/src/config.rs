//! Run configuration shared by every stage of the engine.

use serde::Serialize;
use std::path::PathBuf;

/// Base name of the simulator executables (`<tool>-<configuration>-<build>-<compiler>`).
pub const DEFAULT_TOOL_NAME: &str = "dlbc";

/// Program used to launch the simulator with a number of ranks.
pub const DEFAULT_LAUNCHER: &str = "mpirun";

/// Structured-data diff tool used for dataset comparisons.
pub const DEFAULT_DIFF_TOOL: &str = "h5diff";

/// Build tool that produces simulator executables.
pub const DEFAULT_BUILD_TOOL: &str = "dub";

/// Lattice configurations the simulator can be built for.
pub const CONFIGURATIONS: &[&str] = &["d1q3", "d1q5", "d2q9", "d3q19"];

/// Environment variables consulted by the CLI.
pub const SIM_ROOT_ENV_VAR: &str = "LBTEST_SIM_ROOT";
pub const LAUNCHER_ENV_VAR: &str = "LBTEST_LAUNCHER";
pub const DIFF_TOOL_ENV_VAR: &str = "LBTEST_DIFF_TOOL";
pub const BUILD_TOOL_ENV_VAR: &str = "LBTEST_BUILD_TOOL";

/// Compilers the simulator can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compiler {
    Dmd,
    Gdc,
    Ldc2,
}

impl Compiler {
    /// The compiler whose output is held to exact accuracy by default.
    pub const BASELINE: Compiler = Compiler::Dmd;

    pub const ALL: [Compiler; 3] = [Compiler::Dmd, Compiler::Gdc, Compiler::Ldc2];

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "dmd" => Some(Self::Dmd),
            "gdc" => Some(Self::Gdc),
            "ldc2" => Some(Self::Ldc2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dmd => "dmd",
            Self::Gdc => "gdc",
            Self::Ldc2 => "ldc2",
        }
    }

    pub fn is_baseline(&self) -> bool {
        *self == Self::BASELINE
    }
}

/// Build types understood by the build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildType {
    Release,
    Cov,
    UnittestCov,
    Profile,
}

impl BuildType {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "release" => Some(Self::Release),
            "cov" => Some(Self::Cov),
            "unittest-cov" => Some(Self::UnittestCov),
            "profile" => Some(Self::Profile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Cov => "cov",
            Self::UnittestCov => "unittest-cov",
            Self::Profile => "profile",
        }
    }
}

/// Verbosity level handed to the simulator itself via `-v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimVerbosity {
    Debug,
    Information,
    Notification,
    Warning,
    Error,
    Fatal,
    Off,
}

impl SimVerbosity {
    pub const NAMES: [&'static str; 7] = [
        "Debug",
        "Information",
        "Notification",
        "Warning",
        "Error",
        "Fatal",
        "Off",
    ];

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "Debug" => Some(Self::Debug),
            "Information" => Some(Self::Information),
            "Notification" => Some(Self::Notification),
            "Warning" => Some(Self::Warning),
            "Error" => Some(Self::Error),
            "Fatal" => Some(Self::Fatal),
            "Off" => Some(Self::Off),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Information => "Information",
            Self::Notification => "Notification",
            Self::Warning => "Warning",
            Self::Error => "Error",
            Self::Fatal => "Fatal",
            Self::Off => "Off",
        }
    }
}

/// Everything a suite run needs to know, passed explicitly to each stage.
#[derive(Debug, Clone, Serialize)]
pub struct HarnessConfig {
    /// Simulator source root; executables are placed and built here.
    pub sim_root: PathBuf,
    pub tool_name: String,
    pub launcher: String,
    pub diff_tool: String,
    pub build_tool: String,
    pub compiler: Compiler,
    pub build_type: BuildType,
    pub sim_verbosity: SimVerbosity,
    pub force_build: bool,
    /// Keep non-baseline compilers at exact accuracy.
    pub compare_strict: bool,
    /// Let the baseline compiler use the accuracy cutoff too.
    pub compare_lax: bool,
    /// Skip dataset comparisons and shell checks altogether.
    pub compare_none: bool,
    pub coverage: bool,
    pub coverage_unittest: bool,
    pub fast: bool,
    pub timers: bool,
    pub timers_all: bool,
    pub only_first: bool,
    pub only_serial: bool,
    pub only_tag: Option<String>,
    pub plot: bool,
    /// Explicit time-warning threshold in seconds.
    pub warn_time: Option<f64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sim_root: PathBuf::from("."),
            tool_name: DEFAULT_TOOL_NAME.to_string(),
            launcher: DEFAULT_LAUNCHER.to_string(),
            diff_tool: DEFAULT_DIFF_TOOL.to_string(),
            build_tool: DEFAULT_BUILD_TOOL.to_string(),
            compiler: Compiler::BASELINE,
            build_type: BuildType::Release,
            sim_verbosity: SimVerbosity::Fatal,
            force_build: false,
            compare_strict: false,
            compare_lax: false,
            compare_none: false,
            coverage: false,
            coverage_unittest: false,
            fast: false,
            timers: false,
            timers_all: false,
            only_first: false,
            only_serial: false,
            only_tag: None,
            plot: false,
            warn_time: None,
        }
    }
}

impl HarnessConfig {
    /// Threshold above which a subtest's run time is flagged in the report.
    pub fn warn_threshold(&self) -> f64 {
        if let Some(t) = self.warn_time {
            return t;
        }
        if self.coverage {
            5.0
        } else if self.fast {
            30.0
        } else {
            300.0
        }
    }

    /// Whether timer output is requested from the simulator.
    pub fn timers_enabled(&self) -> bool {
        self.timers || self.timers_all
    }

    /// Whether subtests are followed by dataset comparisons.
    pub fn comparisons_enabled(&self) -> bool {
        !self.coverage && !self.compare_none
    }

    pub fn with_compiler(&self, compiler: Compiler) -> Self {
        Self {
            compiler,
            ..self.clone()
        }
    }

    pub fn with_build_type(&self, build_type: BuildType) -> Self {
        Self {
            build_type,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiler_lookup() {
        assert_eq!(Compiler::from_name("gdc"), Some(Compiler::Gdc));
        assert_eq!(Compiler::from_name("ldc2").map(|c| c.as_str()), Some("ldc2"));
        assert!(Compiler::from_name("clang").is_none());
        assert!(Compiler::Dmd.is_baseline());
        assert!(!Compiler::Ldc2.is_baseline());
    }

    #[test]
    fn test_build_type_names() {
        for name in ["release", "cov", "unittest-cov", "profile"] {
            assert_eq!(BuildType::from_name(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_sim_verbosity_names() {
        for name in SimVerbosity::NAMES {
            assert_eq!(SimVerbosity::from_name(name).unwrap().as_str(), name);
        }
    }

    #[test]
    fn test_warn_threshold_by_mode() {
        let mut config = HarnessConfig::default();
        assert_eq!(config.warn_threshold(), 300.0);
        config.fast = true;
        assert_eq!(config.warn_threshold(), 30.0);
        config.coverage = true;
        assert_eq!(config.warn_threshold(), 5.0);
        config.warn_time = Some(1.5);
        assert_eq!(config.warn_threshold(), 1.5);
    }

    #[test]
    fn test_comparisons_disabled_under_coverage() {
        let mut config = HarnessConfig::default();
        assert!(config.comparisons_enabled());
        config.coverage = true;
        assert!(!config.comparisons_enabled());
        config.coverage = false;
        config.compare_none = true;
        assert!(!config.comparisons_enabled());
    }
}
