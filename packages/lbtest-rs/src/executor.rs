use crate::command::CommandLine;
use crate::error::{HarnessError, Result};
use std::path::Path;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

/// Result of running one external process to completion.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOutcome {
    pub elapsed: Duration,
    pub status: ExitStatus,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 when the process was terminated by a signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Run `command` in `working_dir` and wait for it, without a timeout.
///
/// Output is inherited from the harness. Only a failure to start the process
/// is an error; its exit status is reported back for the caller to classify.
pub async fn run_process(command: &CommandLine, working_dir: &Path) -> Result<ProcessOutcome> {
    log::debug!("  Executing '{}' in '{}'", command, working_dir.display());

    let start_time = Instant::now();
    let status = command
        .to_command(working_dir)
        .status()
        .await
        .map_err(|source| HarnessError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    Ok(ProcessOutcome {
        elapsed: start_time.elapsed(),
        status,
    })
}

/// Run the simulator for one subtest.
///
/// Returns the outcome together with the number of errors it contributes:
/// one for a non-zero exit, zero otherwise.
pub async fn run_subtest(command: &CommandLine, working_dir: &Path) -> Result<(ProcessOutcome, u32)> {
    let outcome = run_process(command, working_dir).await?;

    let errors = if outcome.success() {
        0
    } else {
        log::error!("Simulator returned {}", outcome.code());
        1
    };
    log::info!("  Took {:.3} seconds.", outcome.elapsed_secs());

    Ok((outcome, errors))
}
