//! Top-level runner: wires the X11 display, the event dispatcher, the mpv
//! players and the manager together and tears everything down in order.

use crate::cancel::CancelToken;
use crate::config::{Config, ConfigError};
use crate::dispatch::{self, ConnectionLost, Dispatcher};
use crate::manager::{Manager, ManagerError, Options};
use crate::mpv::MpvPlayerFactory;
use crate::resources::{Resources, TeardownError};
use crate::x11::{X11Display, X11Error};
use log::{debug, info, warn};
use std::time::Duration;

/// How long to wait for the dispatcher after the window is gone.
const DISPATCH_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Fatal errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    X11(#[from] X11Error),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error(transparent)]
    ConnectionLost(#[from] ConnectionLost<X11Error>),
    #[error("failed to start event dispatcher: {0}")]
    Thread(#[source] std::io::Error),
    #[error("event dispatcher panicked")]
    DispatcherPanicked,
    #[error(transparent)]
    Teardown(#[from] TeardownError),
}

/// Show the mosaic until the user quits, the window goes away or `cancel`
/// fires.
pub fn run(config: Config, cancel: CancelToken) -> Result<(), AppError> {
    let options = Options::from_config(&config)?;
    let mut resources = Resources::new();

    let (display, source) =
        resources.acquire("top-level window", X11Display::open, |(display, _)| {
            display.root_closer()
        })?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let dispatcher = dispatch::spawn(source, tx, cancel.clone()).map_err(AppError::Thread)?;

    let factory = MpvPlayerFactory::new(config.clone(), cancel.clone());
    let mut manager = Manager::new(display, factory, config.windows, options, cancel);
    let started = manager.start();
    if started.is_ok() {
        info!("running with {} panes", manager.panes().len());
        manager.run(&rx);
    }

    let released = manager.release();
    drop(manager);
    drop(rx);
    let closed = resources.close();
    let dispatched = join_dispatcher(dispatcher);

    started?;
    dispatched?;
    released?;
    closed?;
    Ok(())
}

fn join_dispatcher(dispatcher: Dispatcher<X11Error>) -> Result<(), AppError> {
    match dispatcher.join_timeout(DISPATCH_JOIN_TIMEOUT) {
        None => {
            warn!("event dispatcher did not stop");
            Ok(())
        }
        Some(Ok(result)) => {
            debug!("event dispatcher stopped");
            result.map_err(AppError::from)
        }
        Some(Err(_)) => Err(AppError::DispatcherPanicked),
    }
}
