//! Core traits that decouple xmosaic from any specific display server or
//! media player.
//!
//! Every concrete backend (X11, mpv, a test harness, …) implements one of
//! these traits.  The [`Manager`](crate::manager::Manager) only depends on
//! these abstractions.

use crate::cancel::CancelToken;
use crate::click::Press;
use crate::command::PlayerCommand;
use crate::config::StreamConfig;
use crate::layout::Rect;
use crate::player::PlayerError;
use std::fmt;

/// Protocol-level identity of a display surface.
///
/// Allocated fresh by the display server for every surface and never reused
/// by xmosaic after the surface is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

impl SurfaceId {
    /// The "no surface" id the server reports for clicks outside any child.
    pub const NONE: SurfaceId = SurfaceId(0);
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Typed display events consumed by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    /// A surface changed geometry.
    Configure {
        surface: SurfaceId,
        width: u32,
        height: u32,
    },
    /// A pointer button was pressed.
    Button(Press),
    /// A key was pressed; carries the raw keycode.
    Key(u8),
    /// A surface was destroyed.
    Destroyed(SurfaceId),
}

/// Abstraction over a display server that hosts the mosaic.
///
/// Implementations own one root surface; every pane surface is a child of
/// it.  All calls happen on the manager's thread.
pub trait Display {
    /// The error type produced by this display.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The root surface panes are placed in.
    fn root(&self) -> SurfaceId;

    /// Current root size as `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Create and map a new child surface of the root.
    fn create_surface(&self) -> Result<SurfaceId, Self::Error>;

    /// Move and resize `surface`.
    fn configure(&self, surface: SurfaceId, rect: Rect) -> Result<(), Self::Error>;

    /// Restack `surface` above its siblings.
    fn raise(&self, surface: SurfaceId) -> Result<(), Self::Error>;

    /// Destroy `surface`.
    fn destroy_surface(&self, surface: SurfaceId) -> Result<(), Self::Error>;
}

/// A running media player bound to one surface.
///
/// Every call may block briefly while the player's control loop accepts it,
/// and fails with [`PlayerError::Cancelled`] if `cancel` fires first.
pub trait Player: Send {
    /// Hand a command to the player.
    fn send(&self, command: PlayerCommand, cancel: &CancelToken) -> Result<(), PlayerError>;

    /// Release the player.  Idempotent; later calls return `Ok(())`
    /// immediately.
    fn close(&self, cancel: &CancelToken) -> Result<(), PlayerError>;

    fn play(&self, url: &str, cancel: &CancelToken) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Play(url.to_string()), cancel)
    }

    fn stop(&self, cancel: &CancelToken) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Stop, cancel)
    }

    fn mute(&self, mute: bool, cancel: &CancelToken) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Mute(mute), cancel)
    }
}

/// Creates players.  Shared across threads during bulk pane creation.
pub trait PlayerFactory: Sync {
    type Player: Player;

    /// Start a player for `stream` rendering into `surface`.
    fn create(&self, surface: SurfaceId, stream: &StreamConfig) -> Result<Self::Player, PlayerError>;
}

/// Outcome of one read from an [`EventSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// An event the manager cares about.
    Event(DisplayEvent),
    /// An event of a class the manager does not handle.
    Ignored,
    /// The server reported a failed request.  The connection is still up.
    ProtocolError(String),
    /// The connection was torn down in an orderly way.
    Closed,
}

/// A blocking source of display events.
///
/// [`next`](EventSource::next) returns `Err` only when the connection is
/// lost.
pub trait EventSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Block until the next event arrives.
    fn next(&mut self) -> Result<Received, Self::Error>;
}
