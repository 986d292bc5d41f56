//! Construction of external-process invocations.

use crate::config::{BuildType, Compiler, HarnessConfig};
use crate::descriptor::TestDescriptor;
use crate::matrix::ParameterCombination;
use std::fmt;
use std::path::{Path, PathBuf};

/// Parameter that makes the simulator write timer output.
pub const TIMERS_PARAMETER: &str = "timers.enableIO=true";

/// A program and its argument vector. Never interpreted by a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split a whitespace-separated command string into program and arguments.
    pub fn from_words(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program).args(words))
    }

    /// The same command with a relative program path containing a separator
    /// joined onto `root`, so `./check.sh` means the script next to the descriptor.
    pub fn resolved_in(&self, root: &Path) -> Self {
        let program = Path::new(&self.program);
        if program.is_relative() && program.components().count() > 1 {
            Self {
                program: root.join(program).display().to_string(),
                args: self.args.clone(),
            }
        } else {
            self.clone()
        }
    }

    /// Prepare the process, running in `working_dir`. The program is used as given.
    pub fn to_command(&self, working_dir: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args).current_dir(working_dir);
        cmd
    }

    /// Full argument vector including the program name.
    pub fn to_vec(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// File name of a simulator executable: `<tool>-<configuration>-<build>-<compiler>`.
pub fn executable_name(
    tool_name: &str,
    configuration: &str,
    build_type: BuildType,
    compiler: Compiler,
) -> String {
    format!(
        "{}-{}-{}-{}",
        tool_name,
        configuration,
        build_type.as_str(),
        compiler.as_str()
    )
}

/// Path of the simulator executable for `configuration` under the current build selection.
pub fn executable_path(config: &HarnessConfig, configuration: &str) -> PathBuf {
    config.sim_root.join(executable_name(
        &config.tool_name,
        configuration,
        config.build_type,
        config.compiler,
    ))
}

/// Assemble the simulator invocation for one subtest.
///
/// Order: launcher and rank count, executable, input file, verbosity, the
/// combination's parameters, coverage or fast overrides, timers, checkpoint
/// resume, coverage flag.
pub fn build_command(
    config: &HarnessConfig,
    descriptor: &TestDescriptor,
    combination: &ParameterCombination,
    rank_count: u32,
) -> CommandLine {
    let exe = executable_path(config, &descriptor.configuration);

    let mut command = CommandLine::new(&config.launcher)
        .arg("-np")
        .arg(rank_count.to_string())
        .arg(exe.display().to_string())
        .arg("-p")
        .arg(&descriptor.input_file)
        .arg("-v")
        .arg(config.sim_verbosity.as_str());

    for (key, value) in combination.iter() {
        command = command.arg("--parameter").arg(format!("{}={}", key, value));
    }

    let overrides = if config.coverage {
        descriptor.coverage.as_ref()
    } else if config.fast {
        descriptor.fast.as_ref()
    } else {
        None
    };
    if let Some(set) = overrides {
        for p in &set.parameters {
            command = command.arg("--parameter").arg(p);
        }
    }

    if config.timers_enabled() {
        command = command.arg("--parameter").arg(TIMERS_PARAMETER);
    }

    if let Some(checkpoint) = &descriptor.checkpoint {
        command = command.arg("-r").arg(&checkpoint.name);
    }

    if config.coverage {
        command = command.arg("--coverage");
    }

    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Checkpoint, OverrideSet};

    fn descriptor() -> TestDescriptor {
        TestDescriptor::from_json(
            Path::new("lb/couette/couette.json"),
            r#"{
                "name": "couette",
                "description": "Couette flow.",
                "configuration": "d3q19",
                "input-file": "couette.par",
                "clean": [],
                "compare": { "comparison": [], "data": [] }
            }"#,
        )
        .unwrap()
    }

    fn config() -> HarnessConfig {
        HarnessConfig {
            sim_root: PathBuf::from("/opt/dlbc"),
            ..HarnessConfig::default()
        }
    }

    fn combination() -> ParameterCombination {
        ParameterCombination::new(vec![
            ("lb.resolution".to_string(), "20".to_string()),
            ("fluid.tau".to_string(), "0.8".to_string()),
        ])
    }

    #[test]
    fn test_executable_naming() {
        assert_eq!(
            executable_name("dlbc", "d2q9", BuildType::Release, Compiler::Gdc),
            "dlbc-d2q9-release-gdc"
        );
        assert_eq!(
            executable_path(&config(), "d1q5"),
            PathBuf::from("/opt/dlbc/dlbc-d1q5-release-dmd")
        );
    }

    #[test]
    fn test_basic_command_layout() {
        let cmd = build_command(&config(), &descriptor(), &combination(), 4);
        assert_eq!(
            cmd.to_vec(),
            vec![
                "mpirun",
                "-np",
                "4",
                "/opt/dlbc/dlbc-d3q19-release-dmd",
                "-p",
                "couette.par",
                "-v",
                "Fatal",
                "--parameter",
                "lb.resolution=20",
                "--parameter",
                "fluid.tau=0.8",
            ]
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let (c, d, m) = (config(), descriptor(), combination());
        assert_eq!(build_command(&c, &d, &m, 2), build_command(&c, &d, &m, 2));
    }

    #[test]
    fn test_fast_and_coverage_overrides_are_exclusive() {
        let mut d = descriptor();
        d.coverage = Some(OverrideSet {
            parameters: vec!["timestep.n=5".to_string()],
            compare: None,
        });
        d.fast = Some(OverrideSet {
            parameters: vec!["timestep.n=50".to_string()],
            compare: None,
        });
        let empty = ParameterCombination::default();

        let mut c = config();
        c.fast = true;
        let fast = build_command(&c, &d, &empty, 1).to_string();
        assert!(fast.ends_with("--parameter timestep.n=50"));

        c.coverage = true;
        let cov = build_command(&c, &d, &empty, 1).to_string();
        assert!(cov.contains("--parameter timestep.n=5 --coverage"));
        assert!(!cov.contains("timestep.n=50"));
    }

    #[test]
    fn test_timers_and_checkpoint() {
        let mut d = descriptor();
        d.checkpoint = Some(Checkpoint {
            name: "cp-t00000100".to_string(),
        });
        let mut c = config();
        c.timers = true;
        let cmd = build_command(&c, &d, &ParameterCombination::default(), 1).to_string();
        assert!(cmd.ends_with("--parameter timers.enableIO=true -r cp-t00000100"));
    }

    #[test]
    fn test_from_words() {
        let cmd = CommandLine::from_words("  ./compare.py  --tolerance 3 ").unwrap();
        assert_eq!(cmd.program, "./compare.py");
        assert_eq!(cmd.args, vec!["--tolerance", "3"]);
        assert!(CommandLine::from_words("   ").is_none());
    }

    #[test]
    fn test_only_shell_checks_resolve_against_test_root() {
        let root = Path::new("/suite/lb/couette");

        let launcher = CommandLine::new("tools/mpirun").arg("-np").to_command(root);
        assert_eq!(launcher.as_std().get_program(), "tools/mpirun");
        assert_eq!(launcher.as_std().get_current_dir(), Some(root));

        let check = CommandLine::from_words("./check.sh 3").unwrap().resolved_in(root);
        assert_eq!(check.program, "/suite/lb/couette/./check.sh");
        assert_eq!(check.args, vec!["3"]);

        let on_path = CommandLine::new("python3").resolved_in(root);
        assert_eq!(on_path.program, "python3");
    }
}
