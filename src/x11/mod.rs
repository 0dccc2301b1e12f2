//! X11 backend built on `x11rb`.
//!
//! [`X11Display`] owns the mosaic's top-level window and creates one child
//! window per pane; [`X11EventSource`] reads the same connection on the
//! dispatcher thread.

pub mod display;
pub mod events;

pub use display::X11Display;
pub use events::X11EventSource;

use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

/// Errors produced by the X11 backend.
#[derive(Debug, thiserror::Error)]
pub enum X11Error {
    #[error("cannot connect to the X server: {0}")]
    Connect(#[from] ConnectError),
    #[error("x11 connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("x11 request failed: {0}")]
    Reply(#[from] ReplyError),
    #[error("x11 request failed: {0}")]
    ReplyOrId(#[from] ReplyOrIdError),
    #[error("screen {0} does not exist")]
    NoScreen(usize),
}
