use clap::{Args, Parser, Subcommand};
use lbtest_rs::config::{
    SimVerbosity, BUILD_TOOL_ENV_VAR, DEFAULT_BUILD_TOOL, DEFAULT_DIFF_TOOL, DEFAULT_LAUNCHER,
    DEFAULT_TOOL_NAME, DIFF_TOOL_ENV_VAR, LAUNCHER_ENV_VAR, SIM_ROOT_ENV_VAR,
};

#[derive(Parser)]
#[command(
    name = "lbtest",
    version,
    about = "Runnable test suite driver for the DLBC lattice-Boltzmann simulator",
    long_about = "Discover test descriptors, build and run the simulator for every parameter\n\
                  combination, compare the output against reference data and report the result.\n\
                  Requires the launcher (mpirun), the diff tool (h5diff) and the build tool (dub)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Prefix log messages with their level
    #[arg(long, global = true)]
    pub log_prefix: bool,

    /// Prefix log messages with the time
    #[arg(long, global = true)]
    pub log_time: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run, describe or clean the test suite
    Run(RunArgs),
    /// Show the resolved tool paths
    Info(InfoArgs),
}

/// Locations of the simulator and the external tools.
#[derive(Args, Clone)]
pub struct ToolArgs {
    /// Simulator root; executables are built and looked up here
    #[arg(long, env = SIM_ROOT_ENV_VAR, default_value = "../..")]
    pub sim_root: String,

    /// Base name of the simulator executables
    #[arg(long, default_value = DEFAULT_TOOL_NAME)]
    pub tool_name: String,

    /// Program launching the simulator with a number of ranks
    #[arg(long, env = LAUNCHER_ENV_VAR, default_value = DEFAULT_LAUNCHER)]
    pub launcher: String,

    /// Diff tool for dataset comparisons
    #[arg(long, env = DIFF_TOOL_ENV_VAR, default_value = DEFAULT_DIFF_TOOL)]
    pub diff_tool: String,

    /// Build tool producing the simulator executables
    #[arg(long, env = BUILD_TOOL_ENV_VAR, default_value = DEFAULT_BUILD_TOOL)]
    pub build_tool: String,
}

#[derive(Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub tools: ToolArgs,

    /// Only consider descriptors below this path (or this single descriptor)
    #[arg(long, default_value = ".")]
    pub only_below: String,

    /// Compiler to build with
    #[arg(long, default_value = "dmd", value_parser = ["dmd", "gdc", "ldc2"])]
    pub compiler: String,

    /// Build type to build with
    #[arg(long, default_value = "release", value_parser = ["release", "cov", "unittest-cov", "profile"])]
    pub build_type: String,

    /// Verbosity passed on to the simulator
    #[arg(long, default_value = "Fatal", value_parser = SimVerbosity::NAMES)]
    pub sim_verbosity: String,

    /// Rebuild executables even if they exist
    #[arg(long)]
    pub force: bool,

    /// Only clean the tests
    #[arg(long)]
    pub clean: bool,

    /// Only show the test descriptions
    #[arg(long)]
    pub describe: bool,

    /// Keep non-baseline compilers at exact accuracy
    #[arg(long)]
    pub compare_strict: bool,

    /// Let the baseline compiler use the accuracy cutoff as well
    #[arg(long)]
    pub compare_lax: bool,

    /// Do not run comparisons
    #[arg(long)]
    pub compare_none: bool,

    /// Merge coverage information of unittests and runnable tests
    #[arg(long)]
    pub coverage: bool,

    /// Merge coverage information of unittests only
    #[arg(long)]
    pub coverage_unittest: bool,

    /// Run shorter versions of long tests
    #[arg(long)]
    pub fast: bool,

    /// Collect timer output of the simulator
    #[arg(long)]
    pub timers: bool,

    /// Collect timer output for every compiler
    #[arg(long)]
    pub timers_all: bool,

    /// Only remove collected timer output
    #[arg(long)]
    pub timers_clean: bool,

    /// Only run the first combination of each parameter matrix
    #[arg(long)]
    pub only_first: bool,

    /// Only run subtests that use a single rank
    #[arg(long)]
    pub only_serial: bool,

    /// Only consider tests carrying this tag
    #[arg(long)]
    pub only_tag: Option<String>,

    /// Plot the results of each test
    #[arg(long)]
    pub plot: bool,

    /// Only plot the reference data of each test
    #[arg(long)]
    pub plot_reference: bool,

    /// Time-warning threshold in seconds
    #[arg(long)]
    pub warn_time: Option<f64>,

    /// Write the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Output file for the JSON report (default: stdout)
    #[arg(short, long, requires = "json")]
    pub output: Option<String>,
}

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    pub tools: ToolArgs,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
