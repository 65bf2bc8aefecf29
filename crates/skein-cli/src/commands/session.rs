use std::path::PathBuf;
use std::sync::Arc;

use skein_bundler::{
    ArtifactLoader, Assembly, Driver, DriverHandle, DriverOptions, ProcessBundler,
    ProcessRendererFactory, Readiness, RendererLoader, RendererOptions, assemble,
};
use skein_config::graph::selectors::{CONTEXT, COND_WATCH, HOST, OUTPUT_PATH, PORT};
use skein_config::{Derivations, Loader, Options};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::logger::LogContext;
use crate::serve::shutdown_signal;
use crate::ui;
use crate::watcher::{WatchSession, ignore_patterns};

/// Everything derived for one invocation.
pub(crate) struct Session {
    pub derivations: Derivations,
    pub assembly: Assembly,
    pub log: LogContext,
    pub watch: bool,
    pub interactive: bool,
}

impl Session {
    pub async fn load(options: &Options, log: LogContext) -> Result<Self> {
        let loader = Loader::from_process()?;
        let state = loader.load(options).await?;
        tracing::debug!(
            mode = %state.mode,
            node_env = %state.node_env,
            context = %state.context.display(),
            "state loaded"
        );

        let derivations = Derivations::new(state);
        let assembly = assemble(&derivations)?;
        let watch = derivations.get(&COND_WATCH)?;

        Ok(Self {
            derivations,
            assembly,
            log,
            watch,
            interactive: options.interactive,
        })
    }

    pub fn host(&self) -> Result<String> {
        Ok(self.derivations.get(&HOST)?)
    }

    pub fn port(&self) -> Result<u16> {
        Ok(self.derivations.get(&PORT)?)
    }

    pub fn output_path(&self) -> Result<PathBuf> {
        Ok(self.derivations.get(&OUTPUT_PATH)?)
    }

    /// Loader producing a render engine from the production manifests.
    pub fn renderer_loader(&self) -> Result<RendererLoader> {
        Ok(RendererLoader::new(
            Arc::new(ProcessRendererFactory::from_derivations(&self.derivations)?),
            RendererOptions::from_derivations(&self.derivations)?,
        ))
    }

    /// Start the driver, the interactive reporter and, in watch mode, the
    /// file watcher.
    pub async fn spawn<L>(&self, loader: L) -> Result<(Running<L::Artifact>, Readiness)>
    where
        L: ArtifactLoader + 'static,
    {
        let bundler = Arc::new(ProcessBundler::from_derivations(&self.derivations)?);
        let options = DriverOptions {
            watch: self.watch,
            interactive: self.interactive,
        };
        let configs = self.assembly.configs().into_iter().cloned().collect();
        let (driver, ready) = Driver::spawn(bundler, loader, configs, options);

        let reporter = self
            .interactive
            .then(|| tokio::spawn(ui::report_compiles(driver.subscribe())));

        let watcher = if self.watch {
            match self.watch_session(driver.trigger()) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    driver.stop().await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok((
            Running {
                driver,
                watcher,
                reporter,
            },
            ready,
        ))
    }

    fn watch_session(&self, trigger: tokio::sync::mpsc::Sender<()>) -> Result<WatchSession> {
        let context = self.derivations.get(&CONTEXT)?;
        let patterns = ignore_patterns(&context, &self.output_path()?);
        WatchSession::start(context, patterns, trigger)
    }
}

/// A running driver with its helpers.
pub(crate) struct Running<A> {
    pub driver: DriverHandle<A>,
    watcher: Option<WatchSession>,
    reporter: Option<JoinHandle<()>>,
}

/// How waiting for the first build ended.
pub(crate) enum Startup {
    Ready,
    Failed(skein_bundler::DriverFailure),
    Interrupted,
}

/// Wait for the first servable build, or Ctrl+C.
pub(crate) async fn startup(ready: Readiness) -> Startup {
    tokio::select! {
        outcome = ready.wait() => match outcome {
            Ok(()) => Startup::Ready,
            Err(failure) => Startup::Failed(failure),
        },
        _ = shutdown_signal() => Startup::Interrupted,
    }
}

impl<A> Running<A> {
    /// Release the watcher and stop the driver; both are attempted and
    /// both are awaited.
    pub async fn stop(self) {
        let Running {
            driver,
            watcher,
            reporter,
        } = self;
        let release_watcher = async {
            if let Some(watcher) = watcher {
                watcher.stop().await;
            }
        };
        tokio::join!(release_watcher, driver.stop());
        Self::join_reporter(reporter).await;
    }

    /// Wait for a single-shot driver to finish on its own.
    pub async fn finished(self) {
        if let Some(watcher) = self.watcher {
            watcher.stop().await;
        }
        self.driver.finished().await;
        Self::join_reporter(self.reporter).await;
    }

    async fn join_reporter(reporter: Option<JoinHandle<()>>) {
        if let Some(reporter) = reporter {
            if let Err(e) = reporter.await {
                tracing::debug!("compile reporter ended abnormally: {e}");
            }
        }
    }
}
