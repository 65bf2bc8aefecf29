//! Terminal UI: status lines, a compile spinner and the compile reporter.
//!
//! Everything here writes to stderr. Colors are decided once in `main`
//! through [`init_colors`].
//!
//! ```no_run
//! use skein_cli::ui;
//!
//! ui::init_colors(true);
//! let spinner = ui::Spinner::new("Compiling...");
//! spinner.finish(&ui::compile_summary(1_200, 0));
//! ui::info("Listening on http://127.0.0.1:8000");
//! ```

mod format;
mod messages;
mod report;
mod spinner;

use std::sync::atomic::{AtomicBool, Ordering};

pub use format::compile_summary;
pub use messages::{error, info, success, warning};
pub use report::report_compiles;
pub use spinner::Spinner;

static COLOR: AtomicBool = AtomicBool::new(false);

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "CIRCLECI", "TRAVIS"]
        .iter()
        .any(|var| std::env::var_os(var).is_some())
}

/// Whether a person is watching: stderr is a terminal and this is not CI.
pub fn is_interactive() -> bool {
    console::user_attended_stderr() && !is_ci()
}

/// Enable or disable colored status output for the rest of the process.
pub fn init_colors(enabled: bool) {
    COLOR.store(enabled, Ordering::Relaxed);
    console::set_colors_enabled_stderr(enabled);
}

pub(crate) fn colored() -> bool {
    COLOR.load(Ordering::Relaxed)
}
