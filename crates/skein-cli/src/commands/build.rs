//! `skein build`: compile the production server and client bundles and
//! check that the renderer can be created from them.
//!
//! With `--watch`, keeps recompiling on changes until Ctrl+C.

use super::session::{Session, Startup, startup};
use crate::cli::BuildArgs;
use crate::error::Result;
use crate::logger::LogContext;
use crate::serve::shutdown_signal;
use crate::ui;

pub async fn execute(args: BuildArgs, log: LogContext) -> Result<()> {
    let interactive = ui::is_interactive() && log.announces();
    let options = args.options(log.level, interactive);
    let session = Session::load(&options, log).await?;

    let output_path = session.output_path()?;
    let loader = session.renderer_loader()?;
    let (running, ready) = session.spawn(loader).await?;

    match startup(ready).await {
        Startup::Ready => {}
        Startup::Failed(failure) => {
            running.stop().await;
            return Err(failure.into());
        }
        Startup::Interrupted => {
            running.stop().await;
            return Ok(());
        }
    }

    if log.announces() {
        ui::success(&format!(
            "Built server and client bundles into {}",
            output_path.display()
        ));
    }

    if session.watch {
        if log.announces() {
            ui::info("Watching for changes (Ctrl+C to stop)");
        }
        shutdown_signal().await;
        running.stop().await;
    } else {
        running.finished().await;
    }
    Ok(())
}
