pub mod build;
pub mod clean;
pub mod command;
pub mod compare;
pub mod config;
pub mod coverage;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod matrix;
pub mod plot;
pub mod report;
pub mod suite;
pub mod timers;

pub use command::{build_command, CommandLine};
pub use config::{BuildType, Compiler, HarnessConfig, SimVerbosity};
pub use descriptor::TestDescriptor;
pub use error::{HarnessError, Result};
pub use matrix::{derive_rank_count, expand, ParameterCombination};
pub use report::{aggregate, Report, SubtestRecord, TestRecord};
pub use suite::{Suite, SuiteAction};
