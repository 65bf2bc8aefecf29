//! skein CLI entry point: argument parsing, logging setup and command
//! dispatch.

use clap::Parser;
use miette::Result;
use skein_cli::{cli, commands, error, logger::LogContext, ui};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let log = LogContext::from_flags(args.verbose, args.quiet, args.no_color);
    log.init();
    ui::init_colors(log.color);

    let result = match args.command {
        cli::Command::Start(start_args) => commands::start_execute(start_args, log).await,
        cli::Command::Build(build_args) => commands::build_execute(build_args, log).await,
    };

    result.map_err(error::cli_error_to_miette)
}
