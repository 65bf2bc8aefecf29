//! `skein start`: development server, or the production SSR server when
//! `NODE_ENV=production`.
//!
//! # Process Flow
//!
//! 1. Load the state and assemble configurations
//! 2. Start the build driver (and the file watcher in watch mode)
//! 3. Wait for the first servable build
//! 4. Serve until Ctrl+C, then release the listener, watcher and driver

use std::sync::Arc;

use skein_config::Mode;
use skein_config::graph::selectors::{DEV_OUTPUT_PATH, PUBLIC_PATH};

use super::session::{Session, Startup, startup};
use crate::cli::SharedArgs;
use crate::dev::server::forward_events;
use crate::dev::{DevBundleLoader, DevServer, DevServerState};
use crate::error::Result;
use crate::logger::LogContext;
use crate::serve::{SsrServer, SsrState, shutdown_signal};
use crate::ui;

pub async fn execute(args: SharedArgs, log: LogContext) -> Result<()> {
    let interactive = ui::is_interactive() && log.announces();
    let options = args.options(Mode::Start, log.level, interactive);
    let session = Session::load(&options, log).await?;

    if session.assembly.is_production() {
        production(session).await
    } else {
        development(session).await
    }
}

async fn development(session: Session) -> Result<()> {
    let output_path = session.derivations.get(&DEV_OUTPUT_PATH)?;
    let public_path = session.derivations.get(&PUBLIC_PATH)?;
    let (host, port) = (session.host()?, session.port()?);

    let loader = DevBundleLoader::new(output_path, public_path);
    loader.clean().await?;
    let (running, ready) = session.spawn(loader).await?;

    let state = Arc::new(DevServerState::new(running.driver.register()));
    let relay = tokio::spawn(forward_events(Arc::clone(&state), running.driver.subscribe()));

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

    let served = DevServer::new(host, port, state, session.log)
        .start(shutdown_signal())
        .await;

    running.stop().await;
    relay.abort();
    served
}

async fn production(session: Session) -> Result<()> {
    let output_path = session.output_path()?;
    let (host, port) = (session.host()?, session.port()?);

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

    let state = SsrState::new(running.driver.register());
    let served = SsrServer::new(host, port, output_path, state, session.log)
        .start(shutdown_signal())
        .await;

    running.stop().await;
    served
}
