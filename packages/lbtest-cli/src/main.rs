use clap::Parser;
use std::io::Write;

mod cli;
mod commands;
mod exit_codes;
mod output;
mod run_params;

use cli::Cli;

fn level_tag(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "[E]",
        log::Level::Warn => "[W]",
        log::Level::Info => "[I]",
        log::Level::Debug => "[D]",
        log::Level::Trace => "[T]",
    }
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        log::LevelFilter::Warn
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    let (with_prefix, with_time) = (cli.log_prefix, cli.log_time);
    env_logger::Builder::new()
        .filter_level(log_level)
        .format(move |buf, record| {
            if with_time {
                write!(buf, "{} ", chrono::Local::now().format("%H:%M:%S"))?;
            }
            if with_prefix {
                write!(buf, "{} ", level_tag(record.level()))?;
            }
            writeln!(buf, "{}", record.args())
        })
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let exit_code = match cli.command {
        cli::Command::Run(args) => commands::run::execute(args).await,
        cli::Command::Info(args) => commands::info::execute(args),
    };

    std::process::exit(exit_code);
}
