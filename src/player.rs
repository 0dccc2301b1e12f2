//! Player supervisor.
//!
//! Every stream gets one supervisor thread that owns a [`Backend`] (the
//! external player process and its control connection).  The manager talks
//! to it through a [`PlayerHandle`]: commands are handed over on an
//! unbuffered channel, so a call returns once the supervisor has accepted
//! it.
//!
//! The supervisor also runs the stall [`Watchdog`] and relaunches the
//! backend according to a [`RestartPolicy`] when the player dies.

use crate::cancel::CancelToken;
use crate::command::PlayerCommand;
use crate::mpv::ipc::IpcError;
use crate::resources::TeardownError;
use crate::traits::Player;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Errors produced by players.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The player has been closed or its supervisor has stopped.
    #[error("player closed")]
    Closed,
    /// The caller's cancellation signal fired first.
    #[error("cancelled")]
    Cancelled,
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no control connection on {} after {attempts} attempts", path.display())]
    Connect { path: PathBuf, attempts: u32 },
    #[error("player exited during startup ({0})")]
    Exited(ExitStatus),
    #[error("failed to start supervisor thread: {0}")]
    Thread(#[source] std::io::Error),
    #[error(transparent)]
    Ipc(#[from] IpcError),
}

impl PlayerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PlayerError::Cancelled)
    }
}

/// Asynchronous notifications from a running player.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    /// Seconds of media buffered ahead; every update counts as progress.
    CacheTime(f64),
    /// The demuxer cache went idle (`true`) or busy again (`false`).
    CacheIdle(bool),
    /// A file finished opening (`true`), or playback started over, ended or
    /// went idle (`false`).
    Loaded(bool),
}

/// Whether `url` is a live network source the watchdog should guard.
///
/// Files and other finite sources stop producing cache progress once fully
/// buffered, so they are never treated as stalled.
pub fn is_live(url: &str) -> bool {
    const LIVE_SCHEMES: [&str; 2] = ["rtsp://", "rtsps://"];
    LIVE_SCHEMES
        .iter()
        .any(|scheme| url.get(..scheme.len()).is_some_and(|s| s.eq_ignore_ascii_case(scheme)))
}

/// Stall detection.
///
/// A live stream counts as stalled when no [`PlayerEvent::CacheTime`]
/// arrived for `timeout`.  A reload restarts the timeout, so a stall
/// produces one reload per timeout period.  With `reload_on_idle` an idle
/// cache reloads a live stream too, but only once its file has loaded.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    reload_on_idle: bool,
    last_progress: Instant,
    playing: bool,
}

impl Watchdog {
    pub fn new(timeout: Duration, reload_on_idle: bool, now: Instant) -> Self {
        Self {
            timeout,
            reload_on_idle,
            last_progress: now,
            playing: false,
        }
    }

    /// Restart the timer for a freshly (re)loaded stream.
    pub fn reset(&mut self, now: Instant) {
        self.last_progress = now;
        self.playing = false;
    }

    /// Feed an event.  `live` tells whether a live stream is loaded.
    /// Returns `true` when the stream must be reloaded.
    pub fn observe(&mut self, event: &PlayerEvent, live: bool, now: Instant) -> bool {
        match *event {
            PlayerEvent::CacheTime(_) => {
                self.last_progress = now;
                false
            }
            PlayerEvent::Loaded(playing) => {
                self.playing = playing;
                self.last_progress = now;
                false
            }
            PlayerEvent::CacheIdle(true) if live && self.playing && self.reload_on_idle => {
                self.reset(now);
                true
            }
            PlayerEvent::CacheIdle(_) => false,
        }
    }

    /// Periodic check.  Returns `true` when the stream must be reloaded.
    pub fn check(&mut self, live: bool, now: Instant) -> bool {
        if live && now.saturating_duration_since(self.last_progress) >= self.timeout {
            self.reset(now);
            return true;
        }
        false
    }
}

/// How often and how fast a dead player is relaunched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub max_attempts: u32,
    /// Delay before the first attempt; doubled for each further one.
    pub backoff: Duration,
}

impl RestartPolicy {
    /// Delay before attempt `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Supervisor settings for one stream.
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub check_interval: Duration,
    pub stall_timeout: Duration,
    pub reload_on_idle: bool,
    pub restart: RestartPolicy,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            stall_timeout: Duration::from_secs(10),
            reload_on_idle: false,
            restart: RestartPolicy::default(),
        }
    }
}

/// A running player process plus its control connection.
pub trait Backend: Send {
    fn load(&mut self, url: &str) -> Result<(), PlayerError>;

    fn stop(&mut self) -> Result<(), PlayerError>;

    fn set_mute(&mut self, mute: bool) -> Result<(), PlayerError>;

    /// Event stream.  Disconnects when the player dies.
    fn events(&self) -> Receiver<PlayerEvent>;

    /// Release the process and connection.  Idempotent.
    fn shutdown(&mut self) -> Result<(), TeardownError>;
}

/// Starts backends; called again on every restart.
pub trait Launcher: Send + 'static {
    type Backend: Backend + 'static;

    fn launch(&self) -> Result<Self::Backend, PlayerError>;
}

//  Supervisor loop

struct Supervisor<L: Launcher> {
    name: String,
    launcher: L,
    settings: PlayerSettings,
    backend: L::Backend,
    events: Receiver<PlayerEvent>,
    loaded: Option<String>,
    muted: bool,
    watchdog: Watchdog,
}

impl<L: Launcher> Supervisor<L> {
    fn new(name: String, launcher: L, settings: PlayerSettings, backend: L::Backend) -> Self {
        let watchdog = Watchdog::new(settings.stall_timeout, settings.reload_on_idle, Instant::now());
        let events = backend.events();
        Self {
            name,
            launcher,
            settings,
            backend,
            events,
            loaded: None,
            muted: false,
            watchdog,
        }
    }

    fn run(mut self, commands: Receiver<PlayerCommand>, stop: Receiver<()>, cancel: CancelToken) {
        let ticker = tick(self.settings.check_interval);
        loop {
            let events = self.events.clone();
            select! {
                recv(stop) -> _ => break,
                recv(cancel.receiver()) -> _ => break,
                recv(commands) -> cmd => match cmd {
                    Ok(cmd) => self.apply(cmd),
                    Err(_) => break,
                },
                recv(events) -> event => match event {
                    Ok(event) => self.observe(event),
                    Err(_) => {
                        if !self.relaunch(&stop, &cancel) {
                            break;
                        }
                    }
                },
                recv(ticker) -> _ => {
                    if self.watchdog.check(self.live(), Instant::now()) {
                        warn!("{}: no playback progress for {:?}", self.name, self.settings.stall_timeout);
                        self.reload();
                    }
                }
            }
        }
        debug!("{}: supervisor stopping", self.name);
        if let Err(e) = self.backend.shutdown() {
            warn!("{}: {}", self.name, e);
        }
    }

    fn apply(&mut self, cmd: PlayerCommand) {
        debug!("{}: {}", self.name, cmd);
        let result = match cmd {
            PlayerCommand::Play(url) => {
                if self.loaded.as_deref() == Some(url.as_str()) {
                    return;
                }
                self.backend.load(&url).map(|()| {
                    self.watchdog.reset(Instant::now());
                    self.loaded = Some(url);
                })
            }
            PlayerCommand::Stop => {
                if self.loaded.is_none() {
                    return;
                }
                self.backend.stop().map(|()| self.loaded = None)
            }
            PlayerCommand::Mute(mute) => {
                if self.muted == mute {
                    return;
                }
                self.backend.set_mute(mute).map(|()| self.muted = mute)
            }
        };
        if let Err(e) = result {
            warn!("{}: command failed: {}", self.name, e);
        }
    }

    /// Whether a live stream is loaded.
    fn live(&self) -> bool {
        self.loaded.as_deref().is_some_and(is_live)
    }

    fn observe(&mut self, event: PlayerEvent) {
        if let PlayerEvent::Loaded(playing) = event {
            debug!("{}: playing={}", self.name, playing);
        }
        if self.watchdog.observe(&event, self.live(), Instant::now()) {
            info!("{}: cache went idle", self.name);
            self.reload();
        }
    }

    fn reload(&mut self) {
        if let Some(url) = self.loaded.clone() {
            info!("{}: reloading {}", self.name, url);
            if let Err(e) = self.backend.load(&url) {
                warn!("{}: reload failed: {}", self.name, e);
            }
        }
    }

    /// Replace a dead backend.  Returns `false` when the supervisor should
    /// stop.
    fn relaunch(&mut self, stop: &Receiver<()>, cancel: &CancelToken) -> bool {
        if let Err(e) = self.backend.shutdown() {
            debug!("{}: {}", self.name, e);
        }
        let policy = self.settings.restart;
        for attempt in 1..=policy.max_attempts {
            let delay = policy.delay(attempt);
            warn!(
                "{}: player lost, relaunching in {:?} ({}/{})",
                self.name, delay, attempt, policy.max_attempts
            );
            select! {
                recv(stop) -> _ => return false,
                recv(cancel.receiver()) -> _ => return false,
                default(delay) => {}
            }
            match self.launcher.launch() {
                Ok(backend) => {
                    self.backend = backend;
                    self.events = self.backend.events();
                    self.restore();
                    info!("{}: player relaunched", self.name);
                    return true;
                }
                Err(e) => warn!("{}: relaunch failed: {}", self.name, e),
            }
        }
        error!("{}: player gave up after {} restarts", self.name, policy.max_attempts);
        false
    }

    fn restore(&mut self) {
        self.watchdog.reset(Instant::now());
        if self.muted {
            if let Err(e) = self.backend.set_mute(true) {
                warn!("{}: failed to restore mute: {}", self.name, e);
            }
        }
        if let Some(url) = self.loaded.clone() {
            if let Err(e) = self.backend.load(&url) {
                warn!("{}: failed to restore {}: {}", self.name, url, e);
            }
        }
    }
}

//  Handle

/// Caller-side end of a supervisor.
pub struct PlayerHandle {
    name: String,
    commands: Sender<PlayerCommand>,
    stop: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Launch a backend and start its supervisor.
///
/// The first launch happens on the calling thread so that startup failures
/// are reported here; `cancel` stops the supervisor without a
/// [`close`](Player::close).
pub fn spawn<L: Launcher>(
    name: impl Into<String>,
    launcher: L,
    settings: PlayerSettings,
    cancel: CancelToken,
) -> Result<PlayerHandle, PlayerError> {
    let name = name.into();
    let backend = launcher.launch()?;
    let supervisor = Supervisor::new(name.clone(), launcher, settings, backend);

    let (cmd_tx, cmd_rx) = bounded(0);
    let (stop_tx, stop_rx) = bounded(0);
    let (done_tx, done_rx) = bounded::<()>(0);
    let thread = thread::Builder::new()
        .name(format!("player-{}", name))
        .spawn(move || {
            supervisor.run(cmd_rx, stop_rx, cancel);
            drop(done_tx);
        })
        .map_err(PlayerError::Thread)?;

    info!("{}: player started", name);
    Ok(PlayerHandle {
        name,
        commands: cmd_tx,
        stop: Mutex::new(Some(stop_tx)),
        done: done_rx,
        thread: Mutex::new(Some(thread)),
    })
}

impl Player for PlayerHandle {
    fn send(&self, command: PlayerCommand, cancel: &CancelToken) -> Result<(), PlayerError> {
        select! {
            send(self.commands, command) -> res => res.map_err(|_| PlayerError::Closed),
            recv(self.done) -> _ => Err(PlayerError::Closed),
            recv(cancel.receiver()) -> _ => Err(PlayerError::Cancelled),
        }
    }

    fn close(&self, cancel: &CancelToken) -> Result<(), PlayerError> {
        if let Ok(mut stop) = self.stop.lock() {
            stop.take();
        }
        select! {
            recv(self.done) -> _ => {}
            recv(cancel.receiver()) -> _ => return Err(PlayerError::Cancelled),
        }
        let thread = self.thread.lock().ok().and_then(|mut t| t.take());
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!("{}: supervisor panicked", self.name);
            }
            info!("{}: player closed", self.name);
        }
        Ok(())
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        if let Ok(mut stop) = self.stop.lock() {
            stop.take();
        }
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use std::sync::Arc;

    #[derive(Default)]
    struct MockState {
        log: Vec<String>,
        launches: u32,
        /// Launches allowed before `launch` starts failing.
        launch_limit: Option<u32>,
        events: Option<Sender<PlayerEvent>>,
        /// Blocks `load` until a value arrives.
        gate: Option<Receiver<()>>,
    }

    type Shared = Arc<Mutex<MockState>>;

    struct MockBackend {
        state: Shared,
        events: Receiver<PlayerEvent>,
        closed: bool,
    }

    impl Backend for MockBackend {
        fn load(&mut self, url: &str) -> Result<(), PlayerError> {
            let gate = self.state.lock().unwrap().gate.clone();
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
            self.state.lock().unwrap().log.push(format!("load {}", url));
            Ok(())
        }

        fn stop(&mut self) -> Result<(), PlayerError> {
            self.state.lock().unwrap().log.push("stop".into());
            Ok(())
        }

        fn set_mute(&mut self, mute: bool) -> Result<(), PlayerError> {
            self.state.lock().unwrap().log.push(format!("mute {}", mute));
            Ok(())
        }

        fn events(&self) -> Receiver<PlayerEvent> {
            self.events.clone()
        }

        fn shutdown(&mut self) -> Result<(), TeardownError> {
            if !self.closed {
                self.closed = true;
                self.state.lock().unwrap().log.push("shutdown".into());
            }
            Ok(())
        }
    }

    struct MockLauncher(Shared);

    impl Launcher for MockLauncher {
        type Backend = MockBackend;

        fn launch(&self) -> Result<MockBackend, PlayerError> {
            let mut state = self.0.lock().unwrap();
            if state.launch_limit.is_some_and(|limit| state.launches >= limit) {
                return Err(PlayerError::Connect {
                    path: PathBuf::from("/tmp/none.sock"),
                    attempts: 1,
                });
            }
            state.launches += 1;
            let (tx, rx) = crossbeam_channel::unbounded();
            state.events = Some(tx);
            Ok(MockBackend {
                state: self.0.clone(),
                events: rx,
                closed: false,
            })
        }
    }

    fn fast_settings() -> PlayerSettings {
        PlayerSettings {
            check_interval: Duration::from_secs(60),
            stall_timeout: Duration::from_secs(60),
            reload_on_idle: false,
            restart: RestartPolicy {
                max_attempts: 2,
                backoff: Duration::from_millis(1),
            },
        }
    }

    fn start(settings: PlayerSettings) -> (PlayerHandle, Shared) {
        let state = Shared::default();
        let handle = spawn(
            "cam",
            MockLauncher(state.clone()),
            settings,
            CancelToken::never(),
        )
        .unwrap();
        (handle, state)
    }

    fn log(state: &Shared) -> Vec<String> {
        state.lock().unwrap().log.clone()
    }

    fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn play_same_url_twice_loads_once() {
        let (player, state) = start(fast_settings());
        let never = CancelToken::never();
        player.play("a", &never).unwrap();
        player.play("a", &never).unwrap();
        player.close(&never).unwrap();
        assert_eq!(log(&state), vec!["load a", "shutdown"]);
    }

    #[test]
    fn stop_and_mute_are_deduplicated() {
        let (player, state) = start(fast_settings());
        let never = CancelToken::never();
        player.stop(&never).unwrap();
        player.mute(false, &never).unwrap();
        player.mute(true, &never).unwrap();
        player.mute(true, &never).unwrap();
        player.play("a", &never).unwrap();
        player.stop(&never).unwrap();
        player.stop(&never).unwrap();
        player.close(&never).unwrap();
        assert_eq!(log(&state), vec!["mute true", "load a", "stop", "shutdown"]);
    }

    #[test]
    fn close_twice_cleans_up_once() {
        let (player, state) = start(fast_settings());
        let never = CancelToken::never();
        player.close(&never).unwrap();
        player.close(&never).unwrap();
        let shutdowns = log(&state).iter().filter(|l| *l == "shutdown").count();
        assert_eq!(shutdowns, 1);
    }

    #[test]
    fn send_after_close_fails() {
        let (player, _state) = start(fast_settings());
        let never = CancelToken::never();
        player.close(&never).unwrap();
        let err = player.play("a", &never).unwrap_err();
        assert!(matches!(err, PlayerError::Closed));
    }

    #[test]
    fn blocked_send_aborts_on_cancel() {
        let (gate_tx, gate_rx) = bounded(0);
        let state = Shared::default();
        state.lock().unwrap().gate = Some(gate_rx);
        let player = spawn(
            "cam",
            MockLauncher(state.clone()),
            fast_settings(),
            CancelToken::never(),
        )
        .unwrap();
        let never = CancelToken::never();
        // Accepted, then the supervisor blocks inside `load`.
        player.play("a", &never).unwrap();

        let (canceller, token) = cancel_pair();
        canceller.cancel();
        let err = player.stop(&token).unwrap_err();
        assert!(err.is_cancelled());

        gate_tx.send(()).unwrap();
        state.lock().unwrap().gate = None;
        player.close(&never).unwrap();
    }

    #[test]
    fn supervisor_exits_on_cancel() {
        let state = Shared::default();
        let (canceller, token) = cancel_pair();
        let player = spawn("cam", MockLauncher(state.clone()), fast_settings(), token).unwrap();
        canceller.cancel();
        wait_for("shutdown", || log(&state).contains(&"shutdown".to_string()));
        let never = CancelToken::never();
        assert!(matches!(player.play("a", &never), Err(PlayerError::Closed)));
        player.close(&never).unwrap();
    }

    #[test]
    fn idle_cache_forces_reload_when_enabled() {
        let settings = PlayerSettings {
            reload_on_idle: true,
            ..fast_settings()
        };
        let (player, state) = start(settings);
        let never = CancelToken::never();
        player.play("rtsp://cam/sub", &never).unwrap();
        let events = state.lock().unwrap().events.clone().unwrap();
        events.send(PlayerEvent::Loaded(true)).unwrap();
        events.send(PlayerEvent::CacheIdle(true)).unwrap();
        wait_for("reload", || log(&state).len() == 2);
        player.close(&never).unwrap();
        assert_eq!(
            log(&state),
            vec!["load rtsp://cam/sub", "load rtsp://cam/sub", "shutdown"]
        );
    }

    #[test]
    fn idle_cache_while_opening_is_ignored() {
        let settings = PlayerSettings {
            reload_on_idle: true,
            ..fast_settings()
        };
        let (player, state) = start(settings);
        let never = CancelToken::never();
        player.play("rtsp://cam/sub", &never).unwrap();
        let events = state.lock().unwrap().events.clone().unwrap();
        for _ in 0..3 {
            events.send(PlayerEvent::CacheIdle(true)).unwrap();
        }
        // Events are handled in order: only the idle after the load counts.
        events.send(PlayerEvent::Loaded(true)).unwrap();
        events.send(PlayerEvent::CacheIdle(true)).unwrap();
        wait_for("reload", || log(&state).len() == 2);
        thread::sleep(Duration::from_millis(30));
        player.close(&never).unwrap();
        assert_eq!(
            log(&state),
            vec!["load rtsp://cam/sub", "load rtsp://cam/sub", "shutdown"]
        );
    }

    #[test]
    fn stalled_stream_is_reloaded() {
        let settings = PlayerSettings {
            check_interval: Duration::from_millis(10),
            stall_timeout: Duration::from_millis(30),
            ..fast_settings()
        };
        let (player, state) = start(settings);
        let never = CancelToken::never();
        player.play("rtsp://cam/main", &never).unwrap();
        wait_for("reload", || log(&state).len() >= 2);
        player.close(&never).unwrap();
        let loads = log(&state)
            .iter()
            .filter(|l| *l == "load rtsp://cam/main")
            .count();
        assert!(loads >= 2);
    }

    #[test]
    fn buffered_file_is_never_reloaded() {
        let settings = PlayerSettings {
            check_interval: Duration::from_millis(10),
            stall_timeout: Duration::from_millis(30),
            reload_on_idle: true,
            ..fast_settings()
        };
        let (player, state) = start(settings);
        let never = CancelToken::never();
        player.play("file:///clip.mp4", &never).unwrap();
        let events = state.lock().unwrap().events.clone().unwrap();
        events.send(PlayerEvent::Loaded(true)).unwrap();
        events.send(PlayerEvent::CacheTime(30.0)).unwrap();
        events.send(PlayerEvent::CacheIdle(true)).unwrap();
        thread::sleep(Duration::from_millis(200));
        player.close(&never).unwrap();
        assert_eq!(log(&state), vec!["load file:///clip.mp4", "shutdown"]);
    }

    #[test]
    fn dead_player_is_relaunched_with_state() {
        let (player, state) = start(fast_settings());
        let never = CancelToken::never();
        player.play("a", &never).unwrap();
        player.mute(true, &never).unwrap();
        // Player process dies.
        state.lock().unwrap().events.take();
        wait_for("relaunch", || state.lock().unwrap().launches == 2);
        wait_for("restore", || log(&state).len() == 5);
        assert_eq!(
            log(&state),
            vec!["load a", "mute true", "shutdown", "mute true", "load a"]
        );
        player.close(&never).unwrap();
    }

    #[test]
    fn supervisor_gives_up_after_max_attempts() {
        let state = Shared::default();
        state.lock().unwrap().launch_limit = Some(1);
        let player = spawn(
            "cam",
            MockLauncher(state.clone()),
            fast_settings(),
            CancelToken::never(),
        )
        .unwrap();
        state.lock().unwrap().events.take();
        let never = CancelToken::never();
        wait_for("give up", || {
            matches!(player.play("a", &never), Err(PlayerError::Closed))
        });
        player.close(&never).unwrap();
        assert_eq!(state.lock().unwrap().launches, 1);
    }

    #[test]
    fn watchdog_reloads_once_per_stall() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new(Duration::from_secs(10), false, t0);
        assert!(!wd.check(true, t0 + Duration::from_secs(5)));
        assert!(wd.check(true, t0 + Duration::from_secs(10)));
        // Timer restarted by the reload.
        assert!(!wd.check(true, t0 + Duration::from_secs(15)));
        assert!(wd.check(true, t0 + Duration::from_secs(20)));
    }

    #[test]
    fn watchdog_progress_resets_timer() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new(Duration::from_secs(10), false, t0);
        assert!(!wd.observe(&PlayerEvent::CacheTime(1.5), true, t0 + Duration::from_secs(8)));
        assert!(!wd.check(true, t0 + Duration::from_secs(12)));
        assert!(wd.check(true, t0 + Duration::from_secs(18)));
    }

    #[test]
    fn watchdog_ignores_inactive_playback() {
        let t0 = Instant::now();
        let mut wd = Watchdog::new(Duration::from_secs(1), true, t0);
        assert!(!wd.check(false, t0 + Duration::from_secs(30)));
        assert!(!wd.observe(&PlayerEvent::Loaded(true), false, t0));
        assert!(!wd.observe(&PlayerEvent::CacheIdle(true), false, t0));
    }

    #[test]
    fn watchdog_idle_policy() {
        let t0 = Instant::now();
        let mut enabled = Watchdog::new(Duration::from_secs(10), true, t0);
        let mut disabled = Watchdog::new(Duration::from_secs(10), false, t0);
        assert!(!enabled.observe(&PlayerEvent::CacheIdle(true), true, t0));
        enabled.observe(&PlayerEvent::Loaded(true), true, t0);
        disabled.observe(&PlayerEvent::Loaded(true), true, t0);
        assert!(enabled.observe(&PlayerEvent::CacheIdle(true), true, t0));
        // The reload starts the stream over.
        assert!(!enabled.observe(&PlayerEvent::CacheIdle(true), true, t0));
        enabled.observe(&PlayerEvent::Loaded(true), true, t0);
        assert!(!enabled.observe(&PlayerEvent::CacheIdle(false), true, t0));
        enabled.observe(&PlayerEvent::Loaded(false), true, t0);
        assert!(!enabled.observe(&PlayerEvent::CacheIdle(true), true, t0));
        assert!(!disabled.observe(&PlayerEvent::CacheIdle(true), true, t0));
    }

    #[test]
    fn live_sources() {
        assert!(is_live("rtsp://cam1:554/main"));
        assert!(is_live("RTSPS://cam1/main"));
        assert!(!is_live("file:///clip.mp4"));
        assert!(!is_live("/srv/clip.mp4"));
        assert!(!is_live("https://example.com/clip.mp4"));
        assert!(!is_live(""));
    }

    #[test]
    fn restart_backoff_doubles() {
        let policy = RestartPolicy {
            max_attempts: 4,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(4), Duration::from_millis(800));
        // Saturates instead of overflowing.
        assert!(policy.delay(40) >= policy.delay(31));
    }
}
