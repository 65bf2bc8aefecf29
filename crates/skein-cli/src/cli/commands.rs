use std::path::PathBuf;

use clap::{Args, Subcommand};
use skein_config::{LogLevel, Mode, Options};

/// Available skein subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the development server
    ///
    /// Compiles in watch mode and serves the result with hot reload. With
    /// NODE_ENV=production, builds the server and client bundles and serves
    /// them through the SSR renderer instead.
    Start(SharedArgs),

    /// Build the production server and client bundles
    ///
    /// Always produces a production build and checks that the SSR renderer
    /// can be created from the emitted manifests.
    Build(BuildArgs),
}

/// Options accepted by every command
#[derive(Args, Debug, Clone, Default)]
pub struct SharedArgs {
    /// Recompile when files change (defaults to on in development)
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        require_equals = true
    )]
    pub watch: Option<bool>,

    /// Directory to start looking for package.json from
    #[arg(long, value_name = "DIR")]
    pub context: Option<PathBuf>,

    /// Page template (defaults to ./index.mustache, then the built-in one)
    #[arg(long, value_name = "FILE")]
    pub index_template: Option<PathBuf>,

    /// Source map style, or `false` to disable source maps
    #[arg(long, value_name = "STYLE")]
    pub devtool: Option<String>,

    /// Directory copied into the output, or `false` to skip copying
    #[arg(long, value_name = "DIR")]
    pub static_assets: Option<String>,

    /// Client entry point
    #[arg(long, value_name = "FILE")]
    pub entry_client: Option<PathBuf>,

    /// Server entry point
    #[arg(long, value_name = "FILE")]
    pub entry_server: Option<PathBuf>,
}

/// Options for `skein build`
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    #[command(flatten)]
    pub shared: SharedArgs,

    /// Output directory, relative to the project
    #[arg(long, value_name = "DIR")]
    pub output_path: Option<PathBuf>,

    /// Public URL the output is served from
    #[arg(long, value_name = "URL")]
    pub output_public_path: Option<String>,
}

impl SharedArgs {
    /// Loader options for `mode`; flags win over everything else.
    pub fn options(&self, mode: Mode, log_level: LogLevel, interactive: bool) -> Options {
        let mut options = Options::new(mode);
        options.watch = self.watch;
        options.context = self.context.clone();
        options.index_template = self.index_template.clone();
        options.devtool = self.devtool.clone();
        options.static_assets = self.static_assets.clone();
        options.entry_client = self.entry_client.clone();
        options.entry_server = self.entry_server.clone();
        options.log_level = log_level;
        options.interactive = interactive;
        options
    }
}

impl BuildArgs {
    pub fn options(&self, log_level: LogLevel, interactive: bool) -> Options {
        let mut options = self.shared.options(Mode::Build, log_level, interactive);
        options.output_path = self.output_path.clone();
        options.output_public_path = self.output_public_path.clone();
        options
    }
}
