//! **xmosaic** — live video streams tiled across one X11 window.
//!
//! Every stream is played by its own mpv process embedded into a child
//! window (a *pane*).  Panes are laid out in a grid or in user supplied
//! rectangles; any pane can be toggled fullscreen with a double click or a
//! hotkey, and audio follows the pane the user interacted with last.
//!
//! # Architecture
//!
//! The crate is organised around the traits in [`traits`]:
//!
//! * [`traits::Display`] — creates, moves, raises and destroys surfaces so
//!   the manager is not coupled to a specific display server.
//! * [`traits::Player`] / [`traits::PlayerFactory`] — start and command
//!   media players so the manager is not coupled to a specific player.
//! * [`traits::EventSource`] — a blocking stream of display events read by
//!   the [`dispatch`] thread.
//!
//! [`mosaic::Mosaic`] holds the pure fullscreen/focus state machine,
//! [`manager::Manager`] executes its effects.  Concrete implementations live
//! in [`x11`] (x11rb) and [`mpv`] (mpv JSON IPC), supervised by [`player`].

pub mod cancel;
pub mod click;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod layout;
pub mod manager;
pub mod mosaic;
pub mod mpv;
pub mod player;
pub mod resources;
pub mod traits;

#[cfg(feature = "backend-x11")]
pub mod app;
#[cfg(feature = "backend-x11")]
pub mod x11;
