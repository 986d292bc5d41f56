use crate::command::CommandLine;
use crate::compare::{OUTPUT_DIR, REFERENCE_DIR};
use crate::descriptor::TestDescriptor;
use crate::error::{HarnessError, Result};
use crate::executor::run_process;

/// Which data set the plot scripts render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotSource {
    Output,
    Reference,
}

impl PlotSource {
    pub fn relpath(&self) -> &'static str {
        match self {
            Self::Output => OUTPUT_DIR,
            Self::Reference => REFERENCE_DIR,
        }
    }
}

/// Run every plot script of the descriptor in its test root.
///
/// Each script gets `--relpath <dir>`; a non-zero exit aborts the run.
pub async fn plot_test(descriptor: &TestDescriptor, source: PlotSource) -> Result<()> {
    if descriptor.plot.is_empty() {
        log::info!("Plotting data for test ... nothing to be done.");
        return Ok(());
    }

    log::info!("Plotting data for test ...");
    for script in &descriptor.plot {
        let path = descriptor.test_root.join(script);
        let command = CommandLine::new(path.display().to_string())
            .arg("--relpath")
            .arg(source.relpath());

        let outcome = run_process(&command, &descriptor.test_root).await?;
        if !outcome.success() {
            return Err(HarnessError::PlotFailed {
                script: path,
                code: outcome.code(),
            });
        }
    }
    log::info!("  Done!");

    Ok(())
}
