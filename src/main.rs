//! Entry point for **xmosaic**.
//!
//! Loads the configuration, turns SIGINT/SIGTERM into cancellation and runs
//! the mosaic on the main thread.
//!
//! ```text
//! xmosaic [--config <path>]
//! ```

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use xmosaic::cancel::{cancel_pair, Canceller};
use xmosaic::config::Config;

/// Resolve the config directory (`$XDG_CONFIG_HOME/xmosaic`).
fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("xmosaic")
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "xmosaic", version)]
#[command(about = "Tile live video streams across an X11 window")]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/xmosaic/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Load the config from `explicit`, or from
/// `$XDG_CONFIG_HOME/xmosaic/config.json` falling back to compiled-in
/// defaults when that file does not exist.
fn load_config(explicit: Option<PathBuf>) -> Result<Config, String> {
    let path = match explicit {
        Some(path) => path,
        None => {
            let path = config_dir().join("config.json");
            if !path.exists() {
                info!("no config file at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            path
        }
    };
    let config = Config::load(&path).map_err(|e| e.to_string())?;
    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Cancel on SIGINT or SIGTERM.
fn watch_signals(canceller: Canceller) -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!("received signal {}, shutting down", signal);
                canceller.cancel();
            }
        })?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let config = match load_config(args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if config.windows.is_empty() {
        info!("no streams configured");
    }

    let (canceller, cancel) = cancel_pair();
    if let Err(e) = watch_signals(canceller) {
        error!("failed to install signal handlers: {}", e);
        return ExitCode::FAILURE;
    }

    run(config, cancel)
}

#[cfg(feature = "backend-x11")]
fn run(config: Config, cancel: xmosaic::cancel::CancelToken) -> ExitCode {
    match xmosaic::app::run(config, cancel) {
        Ok(()) => {
            info!("bye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(not(feature = "backend-x11"))]
fn run(_config: Config, _cancel: xmosaic::cancel::CancelToken) -> ExitCode {
    error!("xmosaic was built without the `backend-x11` feature");
    ExitCode::FAILURE
}
