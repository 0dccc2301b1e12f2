//! mpv backend.
//!
//! Every pane runs its own mpv process embedded into the pane's surface and
//! controlled over mpv's JSON IPC socket.

pub mod ipc;
pub mod process;

use crate::cancel::CancelToken;
use crate::config::{Config, StreamConfig};
use crate::player::{self, PlayerError, PlayerHandle};
use crate::traits::{PlayerFactory, SurfaceId};
use process::MpvLauncher;

/// Creates one supervised mpv per pane.
pub struct MpvPlayerFactory {
    config: Config,
    cancel: CancelToken,
}

impl MpvPlayerFactory {
    /// Supervisors stop on their own once `cancel` fires.
    pub fn new(config: Config, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }
}

impl PlayerFactory for MpvPlayerFactory {
    type Player = PlayerHandle;

    fn create(&self, surface: SurfaceId, stream: &StreamConfig) -> Result<PlayerHandle, PlayerError> {
        let launcher = MpvLauncher::new(
            &self.config.player.binary,
            &self.config.player.hwdec,
            surface,
            stream,
        );
        player::spawn(
            stream.id.clone(),
            launcher,
            self.config.player_settings(stream),
            self.cancel.clone(),
        )
    }
}
