//! Command-line interface definition.
//!
//! # Command Structure
//!
//! - `skein start` - Development server, or the production SSR server when
//!   `NODE_ENV=production`
//! - `skein build` - Production build of the server and client bundles

mod commands;

use clap::Parser;

pub use commands::{BuildArgs, Command, SharedArgs};

const ENVIRONMENT_HELP: &str = "\
Environment Variables:
  NODE_ENV    Build environment, 'development' by default. Set it to
              'production' for production builds
  NODE_PORT   The port number to accept connections on (default 8000)
  NODE_HOST   The hostname to accept connections on (default 127.0.0.1)
  SKEIN_HOME  Overrides the directory skein's own files are read from
  RUST_LOG    Log filter directives, applied at the default verbosity";

/// skein - builds and serves server-rendered Vue applications
#[derive(Parser, Debug)]
#[command(
    name = "skein",
    version,
    about = "Builds and serves server-rendered Vue applications",
    long_about = "skein derives a complete bundler configuration from package.json,\n\
                  NODE_* environment variables and flags, then drives the bundler and\n\
                  SSR renderer through development and production workflows.",
    after_help = ENVIRONMENT_HELP
)]
pub struct Cli {
    /// More output; repeat for more (-v info, -vv verbose, -vvv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Less output; repeat for less (-q errors only, -qq silent)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}
