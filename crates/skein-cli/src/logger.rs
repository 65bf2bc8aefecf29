//! Logging setup for the skein CLI.
//!
//! Verbosity is decided once, from the `-v`/`-q` counts, and carried around
//! as a [`LogContext`] value: `main` installs the subscriber from it, the
//! loader copies its level into the state, and the servers consult it before
//! printing anything.
//!
//! # Verbosity Levels
//!
//! | flags | level | skein crates |
//! |---|---|---|
//! | `-qq` | silent | off |
//! | `-q` | error | error |
//! | (none) | warn | warn, or `RUST_LOG` when set |
//! | `-v` | info | info |
//! | `-vv` | verbose | debug |
//! | `-vvv` | debug | trace, plus request logs |

use skein_config::LogLevel;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 4] = ["skein", "skein_cli", "skein_bundler", "skein_config"];

/// Verbosity and color choice for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogContext {
    pub level: LogLevel,
    pub color: bool,
}

impl Default for LogContext {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            color: false,
        }
    }
}

impl LogContext {
    pub fn from_flags(verbose: u8, quiet: u8, no_color: bool) -> Self {
        Self {
            level: LogLevel::from_counts(verbose, quiet),
            color: !no_color && should_use_colors(),
        }
    }

    /// Filter directives for the skein crates at this level.
    pub fn directives(&self) -> String {
        let level = match self.level {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Verbose => "debug",
            LogLevel::Debug => "trace",
        };
        let mut directives: Vec<String> = CRATES.iter().map(|c| format!("{c}={level}")).collect();
        if self.level == LogLevel::Debug {
            directives.push("tower_http=debug".to_string());
        }
        directives.join(",")
    }

    /// `RUST_LOG` wins at the baseline; explicit flags win over it.
    pub fn filter(&self) -> EnvFilter {
        if self.level == LogLevel::Warn {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return filter;
            }
        }
        EnvFilter::new(self.directives())
    }

    /// Install the global subscriber. Call once, before anything logs.
    pub fn init(&self) {
        let fmt_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_ansi(self.color)
            .with_writer(std::io::stderr)
            .compact();

        tracing_subscriber::registry()
            .with(self.filter())
            .with(fmt_layer)
            .init();
    }

    /// Whether status lines should be printed at all.
    pub fn announces(&self) -> bool {
        self.level > LogLevel::Silent
    }
}

/// Check if colored output should be enabled.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them, otherwise the
/// terminal decides.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
