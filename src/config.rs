//! Application configuration.
//!
//! The configuration is loaded from a JSON file, by default
//! `$XDG_CONFIG_HOME/xmosaic/config.json` (override with `--config <path>`).
//! Every section is optional and falls back to its compiled-in defaults;
//! unknown keys are ignored.
//!
//! # Example
//!
//! ```json
//! {
//!   "background": false,
//!   "layout": "manual",
//!   "layout_manual": [
//!     { "x": "0",   "y": "0", "w": "2/3", "h": "1" },
//!     { "x": "2/3", "y": "0", "w": "1/3", "h": "1/2" }
//!   ],
//!   "player": { "hwdec": "vaapi", "flags": ["--vo=gpu"] },
//!   "windows": [
//!     { "main": "rtsp://cam1/main", "sub": "rtsp://cam1/sub", "low_latency": true },
//!     { "id": "door", "main": "rtsp://cam2/main" }
//!   ],
//!   "click_window_ms": 400,
//!   "watchdog": { "stall_timeout_ms": 8000 }
//! }
//! ```

use crate::command::Source;
use crate::layout::NormalizedRect;
use crate::mosaic::Arrangement;
use crate::player::{PlayerSettings, RestartPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Keep non-fullscreen panes playing (muted) while one pane is
    /// fullscreen.  When `false` they are stopped.
    #[serde(default)]
    pub background: bool,

    /// How panes are arranged.
    #[serde(default)]
    pub layout: LayoutMode,

    /// Pane rectangles for [`LayoutMode::Manual`].
    #[serde(default)]
    pub layout_manual: Vec<ManualRect>,

    /// Player process settings shared by all streams.
    #[serde(default)]
    pub player: PlayerConfig,

    /// The streams, in pane order.
    #[serde(default)]
    pub windows: Vec<StreamConfig>,

    /// Double-click window in milliseconds.
    #[serde(default = "default_click_window_ms")]
    pub click_window_ms: u64,

    /// Stall detection.
    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Player process restarts.
    #[serde(default)]
    pub restart: RestartConfig,
}

fn default_click_window_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            background: false,
            layout: LayoutMode::default(),
            layout_manual: Vec::new(),
            player: PlayerConfig::default(),
            windows: Vec::new(),
            click_window_ms: default_click_window_ms(),
            watchdog: WatchdogConfig::default(),
            restart: RestartConfig::default(),
        }
    }
}

/// Layout selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    /// Near-square grid sized to the pane count.
    #[default]
    Auto,
    /// Rectangles from `layout_manual`.
    Manual,
}

/// One manual pane rectangle; every edge is a ratio string such as `"1/3"`
/// or `"0.5"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualRect {
    pub x: String,
    pub y: String,
    pub w: String,
    pub h: String,
}

/// Player process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Player executable.
    pub binary: String,
    /// Hardware decoding hint passed as `--hwdec`.
    pub hwdec: String,
    /// Flags prepended to every stream's own flags.
    pub flags: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: "mpv".into(),
            hwdec: "auto".into(),
            flags: Vec::new(),
        }
    }
}

/// One stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Stable identity.  Derived from the main URL's host when empty.
    #[serde(default, alias = "name")]
    pub id: String,
    /// Full quality URL.
    pub main: String,
    /// Preview URL.  Falls back to `main` when empty.
    #[serde(default)]
    pub sub: String,
    /// Use the player's low-latency profile.
    #[serde(default)]
    pub low_latency: bool,
    /// Extra player flags.
    #[serde(default)]
    pub flags: Vec<String>,
}

impl StreamConfig {
    /// URL to play for `source`.
    pub fn url(&self, source: Source) -> &str {
        match source {
            Source::Main if !self.main.is_empty() => &self.main,
            Source::Main => &self.sub,
            Source::Sub if !self.sub.is_empty() => &self.sub,
            Source::Sub => &self.main,
        }
    }
}

/// Lower bound for watchdog periods; anything shorter would spin the
/// supervisor.
const MIN_WATCHDOG_MS: u64 = 10;

/// Stall detection settings.  Durations are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// How often the watchdog looks for stalls.
    pub check_interval_ms: u64,
    /// How long playback may go without cache progress.
    pub stall_timeout_ms: u64,
    /// Reload low-latency streams as soon as their cache goes idle.
    pub reload_on_idle_cache: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 5_000,
            stall_timeout_ms: 10_000,
            reload_on_idle_cache: true,
        }
    }
}

/// Player restart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartConfig {
    /// Relaunches allowed after the player process dies.
    pub max_attempts: u32,
    /// Delay before the first relaunch, doubled on every further attempt.
    pub backoff_ms: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1_000,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path` and normalise it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let mut config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        config.normalize();
        Ok(config)
    }

    /// Reject settings the supervisor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("watchdog.check_interval_ms", self.watchdog.check_interval_ms),
            ("watchdog.stall_timeout_ms", self.watchdog.stall_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError(format!("{} must be positive", key)));
            }
        }
        Ok(())
    }

    /// Prepend global player flags to every stream and fill in missing ids.
    pub fn normalize(&mut self) {
        for (i, stream) in self.windows.iter_mut().enumerate() {
            let mut flags = self.player.flags.clone();
            flags.append(&mut stream.flags);
            stream.flags = flags;
            if stream.id.is_empty() {
                stream.id = hostname(&stream.main)
                    .map(str::to_string)
                    .unwrap_or_else(|| i.to_string());
            }
        }
    }

    /// Build the pane arrangement.
    pub fn arrangement(&self) -> Result<Arrangement, ConfigError> {
        match self.layout {
            LayoutMode::Auto => Ok(Arrangement::Auto),
            LayoutMode::Manual => {
                let rects = self
                    .layout_manual
                    .iter()
                    .enumerate()
                    .map(|(i, r)| {
                        NormalizedRect::parse(&r.x, &r.y, &r.w, &r.h)
                            .map_err(|e| ConfigError(format!("layout_manual[{}]: {}", i, e)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Arrangement::Manual(rects))
            }
        }
    }

    pub fn click_window(&self) -> Duration {
        Duration::from_millis(self.click_window_ms)
    }

    /// Player supervisor settings for `stream`.
    pub fn player_settings(&self, stream: &StreamConfig) -> PlayerSettings {
        PlayerSettings {
            check_interval: Duration::from_millis(
                self.watchdog.check_interval_ms.max(MIN_WATCHDOG_MS),
            ),
            stall_timeout: Duration::from_millis(
                self.watchdog.stall_timeout_ms.max(MIN_WATCHDOG_MS),
            ),
            reload_on_idle: stream.low_latency && self.watchdog.reload_on_idle_cache,
            restart: RestartPolicy {
                max_attempts: self.restart.max_attempts,
                backoff: Duration::from_millis(self.restart.backoff_ms),
            },
        }
    }
}

/// Host part of a URL such as `rtsp://user:pw@cam1:554/stream`.
fn hostname(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = match host_port.strip_prefix('[') {
        Some(v6) => v6.split(']').next()?,
        None => host_port.split(':').next()?,
    };
    (!host.is_empty()).then_some(host)
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
