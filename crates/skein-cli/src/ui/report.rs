//! Interactive compile reporting.
//!
//! When a person is watching, the driver leaves warnings and errors to this
//! reporter: a spinner runs while compiling and the outcome replaces it.

use skein_bundler::DriverEvent;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{Spinner, compile_summary, error, warning};

/// Render driver events until the driver goes away.
pub async fn report_compiles(mut events: broadcast::Receiver<DriverEvent>) {
    let mut spinner: Option<Spinner> = None;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "compile reporter fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            DriverEvent::CompileStarted => {
                // A compile can start before the outcome of the previous one
                // reached us when the receiver lagged.
                if let Some(running) = &spinner {
                    running.set_message("Recompiling...");
                } else {
                    spinner = Some(Spinner::new("Compiling..."));
                }
            }
            DriverEvent::Compiled {
                duration_ms,
                warnings,
            } => {
                let summary = compile_summary(duration_ms, warnings.len());
                match spinner.take() {
                    Some(spinner) => spinner.finish(&summary),
                    None => super::success(&summary),
                }
                for message in &warnings {
                    warning(message);
                }
            }
            DriverEvent::CompileFailed { message, errors } => {
                match spinner.take() {
                    Some(spinner) => spinner.fail(&message),
                    None => error(&message),
                }
                for message in &errors {
                    error(message);
                }
            }
        }
    }
}
