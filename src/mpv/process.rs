//! mpv child process management.
//!
//! [`MpvLauncher`] spawns one mpv embedded into a surface (`--wid`) and
//! connects to its IPC socket; the resulting [`MpvBackend`] is driven by
//! the player supervisor.

use super::ipc::{IpcConnection, IpcError, CACHE_IDLE, CACHE_TIME};
use crate::config::StreamConfig;
use crate::player::{Backend, Launcher, PlayerError, PlayerEvent};
use crate::resources::TeardownError;
use crate::traits::SurfaceId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info, trace, warn};
use serde_json::Value;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Connection attempts before giving up on a fresh process.
pub const CONNECT_ATTEMPTS: u32 = 50;
/// Delay between connection attempts.
pub const CONNECT_DELAY: Duration = Duration::from_millis(100);

const OBSERVE_CACHE_IDLE: u64 = 1;
const OBSERVE_CACHE_TIME: u64 = 2;

/// A fresh, unique control socket path.
pub fn socket_path() -> PathBuf {
    std::env::temp_dir().join(format!("xmosaic-mpv-{}.sock", Uuid::new_v4()))
}

/// Starts mpv processes for one pane.
#[derive(Debug, Clone)]
pub struct MpvLauncher {
    name: String,
    binary: String,
    surface: SurfaceId,
    hwdec: String,
    low_latency: bool,
    flags: Vec<String>,
    connect_attempts: u32,
    connect_delay: Duration,
}

impl MpvLauncher {
    pub fn new(binary: &str, hwdec: &str, surface: SurfaceId, stream: &StreamConfig) -> Self {
        Self {
            name: stream.id.clone(),
            binary: binary.to_string(),
            surface,
            hwdec: hwdec.to_string(),
            low_latency: stream.low_latency,
            flags: stream.flags.clone(),
            connect_attempts: CONNECT_ATTEMPTS,
            connect_delay: CONNECT_DELAY,
        }
    }

    /// Override the connection retry budget.
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.connect_attempts = attempts;
        self.connect_delay = delay;
        self
    }

    /// Command line for a process listening on `socket`.
    pub fn args(&self, socket: &Path) -> Vec<String> {
        let mut args = vec![
            format!("--wid={}", self.surface.0),
            format!("--hwdec={}", self.hwdec),
        ];
        if self.low_latency {
            args.push("--profile=low-latency".into());
            args.push("--no-cache".into());
        }
        args.extend(
            [
                "--input-vo-keyboard=no",
                "--no-input-cursor",
                "--no-osc",
                "--force-window",
                "--idle",
                "--loop-file=inf",
            ]
            .map(String::from),
        );
        args.push(format!("--input-ipc-server={}", socket.display()));
        args.extend(self.flags.iter().cloned());
        args
    }

    fn connect(
        &self,
        child: &mut Child,
        socket: &Path,
        events: Sender<PlayerEvent>,
    ) -> Result<IpcConnection, PlayerError> {
        for attempt in 1..=self.connect_attempts {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(PlayerError::Exited(status));
            }
            match IpcConnection::connect(socket, events.clone()) {
                Ok(conn) => return Ok(conn),
                Err(IpcError::Io(e)) => {
                    trace!("{}: connect attempt {}: {}", self.name, attempt, e);
                    thread::sleep(self.connect_delay);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(PlayerError::Connect {
            path: socket.to_path_buf(),
            attempts: self.connect_attempts,
        })
    }
}

impl Launcher for MpvLauncher {
    type Backend = MpvBackend;

    fn launch(&self) -> Result<MpvBackend, PlayerError> {
        let socket = socket_path();
        let mut child = Command::new(&self.binary)
            .args(self.args(&socket))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PlayerError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;
        debug!("{}: spawned {} (pid {})", self.name, self.binary, child.id());

        if let Some(stderr) = child.stderr.take() {
            let name = self.name.clone();
            let forward = move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!("{}: {}", name, line);
                }
            };
            if let Err(e) = thread::Builder::new().name("mpv-stderr".into()).spawn(forward) {
                warn!("{}: cannot forward player log: {}", self.name, e);
            }
        }

        let (tx, rx) = unbounded();
        let conn = match self.connect(&mut child, &socket, tx) {
            Ok(conn) => conn,
            Err(e) => {
                let mut errors = TeardownError::default();
                release_process(&mut child, &socket, &mut errors);
                if let Err(t) = errors.into_result() {
                    warn!("{}: {}", self.name, t);
                }
                return Err(e);
            }
        };
        info!("{}: connected to {}", self.name, socket.display());

        let mut backend = MpvBackend {
            name: self.name.clone(),
            child,
            conn,
            socket,
            events: rx,
            closed: false,
        };
        if let Err(e) = backend.observe() {
            if let Err(t) = backend.shutdown() {
                warn!("{}: {}", self.name, t);
            }
            return Err(e);
        }
        Ok(backend)
    }
}

/// One running mpv process.
pub struct MpvBackend {
    name: String,
    child: Child,
    conn: IpcConnection,
    socket: PathBuf,
    events: Receiver<PlayerEvent>,
    closed: bool,
}

impl MpvBackend {
    fn observe(&mut self) -> Result<(), PlayerError> {
        self.conn.observe_property(OBSERVE_CACHE_IDLE, CACHE_IDLE)?;
        self.conn.observe_property(OBSERVE_CACHE_TIME, CACHE_TIME)?;
        Ok(())
    }

    fn command(&mut self, args: &[Value]) -> Result<(), PlayerError> {
        self.conn.command(args)?;
        Ok(())
    }
}

impl Backend for MpvBackend {
    fn load(&mut self, url: &str) -> Result<(), PlayerError> {
        self.command(&["loadfile".into(), url.into()])
    }

    fn stop(&mut self) -> Result<(), PlayerError> {
        self.command(&["stop".into()])
    }

    /// Muting sets the volume to 0, unmuting back to 100.
    fn set_mute(&mut self, mute: bool) -> Result<(), PlayerError> {
        let volume = if mute { 0 } else { 100 };
        self.command(&["set_property".into(), "volume".into(), volume.into()])
    }

    fn events(&self) -> Receiver<PlayerEvent> {
        self.events.clone()
    }

    fn shutdown(&mut self) -> Result<(), TeardownError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut errors = TeardownError::default();
        release_process(&mut self.child, &self.socket, &mut errors);
        if let Err(e) = self.conn.close() {
            errors.push("close control connection", e);
        }
        debug!("{}: player released", self.name);
        errors.into_result()
    }
}

/// Kill and reap `child` and remove its control socket.  Every step runs;
/// failures are added to `errors`.
fn release_process(child: &mut Child, socket: &Path, errors: &mut TeardownError) {
    if !matches!(child.try_wait(), Ok(Some(_))) {
        if let Err(e) = child.kill() {
            errors.push("kill player", e);
        }
    }
    if let Err(e) = child.wait() {
        errors.push("reap player", e);
    }
    match std::fs::remove_file(socket) {
        Err(e) if e.kind() != ErrorKind::NotFound => errors.push("remove socket", e),
        _ => {}
    }
}

impl Drop for MpvBackend {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("{}: {}", self.name, e);
        }
    }
}

//  Tests
