use crate::cli::RunArgs;
use crate::exit_codes;
use crate::output;
use crate::run_params;
use lbtest_rs::{aggregate, HarnessError, Suite, SuiteAction};

fn fatal(error: &HarnessError) -> i32 {
    eprintln!("FATAL ERROR: {}", error);
    exit_codes::FATAL_ERROR
}

pub async fn execute(args: RunArgs) -> i32 {
    let config = match run_params::build_config(&args) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("FATAL ERROR: {}", msg);
            return exit_codes::FATAL_ERROR;
        }
    };

    let suite = match Suite::discover(&args.only_below) {
        Ok(s) => s,
        Err(e) => return fatal(&e),
    };
    log::debug!(
        "Discovered {} test(s) below '{}'.",
        suite.len(),
        args.only_below
    );

    if args.describe {
        return match output::write_output(&suite.describe(config.only_tag.as_deref()), None) {
            Ok(()) => exit_codes::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                exit_codes::FATAL_ERROR
            }
        };
    }

    let action = run_params::select_action(&args);
    let records = match suite.run(&config, action).await {
        Ok(r) => r,
        Err(e) => return fatal(&e),
    };

    if action != SuiteAction::Run {
        log::info!("Done.");
        return exit_codes::SUCCESS;
    }

    let report = aggregate(&records, config.warn_threshold());
    if let Err(e) = output::emit_report(&report, args.json, args.output.as_deref()) {
        eprintln!("Error: {}", e);
        return exit_codes::FATAL_ERROR;
    }

    if report.passed() {
        exit_codes::SUCCESS
    } else {
        exit_codes::TEST_FAILURE
    }
}
