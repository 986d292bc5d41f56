use crate::cli::{RunArgs, ToolArgs};
use lbtest_rs::{BuildType, Compiler, HarnessConfig, SimVerbosity, SuiteAction};
use std::path::{Path, PathBuf};

/// Resolve the simulator root to an absolute path.
///
/// Executables are passed to the launcher by path while it runs in each test
/// root, so a relative root would break.
pub fn resolve_sim_root(sim_root: &str) -> Result<PathBuf, String> {
    std::fs::canonicalize(sim_root)
        .map_err(|e| format!("Simulator root '{}' is not accessible: {}", sim_root, e))
}

/// Anchor a relative tool path containing a separator at the invoking
/// directory. Bare names are left for `PATH` lookup.
///
/// Tools run with each test root as working directory, where a relative path
/// would no longer point at the same file.
pub fn resolve_tool_program(program: &str) -> Result<String, String> {
    let path = Path::new(program);
    if path.is_absolute() || path.components().count() < 2 {
        return Ok(program.to_string());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path).display().to_string())
        .map_err(|e| format!("Cannot resolve tool '{}': {}", program, e))
}

/// Translate the run flags into the engine configuration.
pub fn build_config(args: &RunArgs) -> Result<HarnessConfig, String> {
    let compiler = Compiler::from_name(&args.compiler)
        .ok_or_else(|| format!("Unknown compiler '{}'", args.compiler))?;
    let build_type = BuildType::from_name(&args.build_type)
        .ok_or_else(|| format!("Unknown build type '{}'", args.build_type))?;
    let sim_verbosity = SimVerbosity::from_name(&args.sim_verbosity)
        .ok_or_else(|| format!("Unknown simulator verbosity '{}'", args.sim_verbosity))?;

    if let Some(t) = args.warn_time {
        if !(t > 0.0) {
            return Err(format!("Time-warning threshold must be positive, got {}", t));
        }
    }

    Ok(HarnessConfig {
        sim_root: resolve_sim_root(&args.tools.sim_root)?,
        tool_name: args.tools.tool_name.clone(),
        launcher: resolve_tool_program(&args.tools.launcher)?,
        diff_tool: resolve_tool_program(&args.tools.diff_tool)?,
        build_tool: resolve_tool_program(&args.tools.build_tool)?,
        compiler,
        build_type,
        sim_verbosity,
        force_build: args.force,
        compare_strict: args.compare_strict,
        compare_lax: args.compare_lax,
        compare_none: args.compare_none,
        coverage: args.coverage,
        coverage_unittest: args.coverage_unittest,
        fast: args.fast,
        timers: args.timers,
        timers_all: args.timers_all,
        only_first: args.only_first,
        only_serial: args.only_serial,
        only_tag: args.only_tag.clone(),
        plot: args.plot,
        warn_time: args.warn_time,
    })
}

/// The per-descriptor action selected by the "only do X" flags.
///
/// Timer cleaning wins over reference plotting, which wins over cleaning.
pub fn select_action(args: &RunArgs) -> SuiteAction {
    if args.timers_clean {
        SuiteAction::TimersClean
    } else if args.plot_reference {
        SuiteAction::PlotReference
    } else if args.clean {
        SuiteAction::Clean
    } else {
        SuiteAction::Run
    }
}

/// Tool names as configured, for diagnostics.
pub fn tool_programs(tools: &ToolArgs) -> [(&'static str, &str); 3] {
    [
        ("launcher", tools.launcher.as_str()),
        ("diff tool", tools.diff_tool.as_str()),
        ("build tool", tools.build_tool.as_str()),
    ]
}
